//! 요청 수명 주기 상태 기계
//!
//! 모든 요청은 라우팅 → (미들웨어) → 분류 → [프록시 | 동적 | 정적] → 완료 | 에러 복구
//! 순서로 처리됩니다. 에러는 `dispatch` 경계에서 단 한 번 잡혀 정제된 응답이 됩니다.

mod error;
mod error_page;
pub mod render;
pub mod static_files;

pub use error::DispatchError;
pub use error_page::default_error_page;
pub use static_files::{Located, StaticFiles};

use std::any::Any;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use bytes::Bytes;
use futures_util::FutureExt;
use hyper::body::Body;
use hyper::header::{self, HeaderValue};
use hyper::{Request, Response, StatusCode};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::context::{BodyError, RequestContext, ResourceKind, ResponseBody};
use crate::handler::{self, HandlerError, HandlerOutput, HandlerRegistry};
use crate::logging::{self, RequestLog};
use crate::middleware::{
    ChainOutcome, HeadersPlugin, Middleware, MiddlewareChain, MiddlewareError, Plugin, PluginChain,
};
use crate::proxy::{resolve_target, ProxyClient};
use crate::routing::{ResolvedRoute, RoutingTable};
use crate::security::{purify, Blacklist, PathConfinement, ProtectMiddleware, NOT_FOUND_PAGE};
use crate::settings::RouterSettings;

pub type DispatchResult = Result<Response<ResponseBody>, DispatchError>;

/// 요청 하나를 처음부터 끝까지 처리하는 디스패처
///
/// 라우팅 테이블과 차단 목록은 공유 상태이며, 나머지는 시작 시 한 번 구성됩니다.
pub struct Dispatcher {
    router: Arc<RoutingTable>,
    handlers: Arc<HandlerRegistry>,
    blacklist: Arc<Blacklist>,
    confinement: PathConfinement,
    plugins: PluginChain,
    middleware: MiddlewareChain,
    proxy: ProxyClient,
    files: StaticFiles,
    performance: bool,
}

pub struct DispatcherBuilder {
    settings: RouterSettings,
    router: Option<Arc<RoutingTable>>,
    handlers: HandlerRegistry,
    blacklist: Option<Arc<Blacklist>>,
    plugins: PluginChain,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl DispatcherBuilder {
    pub fn new(settings: &RouterSettings) -> Self {
        Self {
            settings: settings.clone(),
            router: None,
            handlers: HandlerRegistry::new(),
            blacklist: None,
            plugins: PluginChain::new(),
            middleware: Vec::new(),
        }
    }

    pub fn router(mut self, router: Arc<RoutingTable>) -> Self {
        self.router = Some(router);
        self
    }

    pub fn handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn blacklist(mut self, blacklist: Arc<Blacklist>) -> Self {
        self.blacklist = Some(blacklist);
        self
    }

    pub fn before<P: Plugin + 'static>(mut self, plugin: P) -> Self {
        self.plugins.add_before(plugin);
        self
    }

    pub fn after<P: Plugin + 'static>(mut self, plugin: P) -> Self {
        self.plugins.add_after(plugin);
        self
    }

    pub fn middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// 디스패처를 생성합니다.
    ///
    /// 성능 모드가 아니면 protect 미들웨어가 체인의 맨 앞에 설치되고,
    /// 헤더 수정 설정이 있으면 마지막 after 플러그인으로 추가됩니다.
    pub fn build(self) -> Result<Dispatcher, MiddlewareError> {
        let settings = self.settings;
        let blacklist = self.blacklist.unwrap_or_default();

        let mut middleware = MiddlewareChain::new();
        if !settings.performance {
            middleware.add(ProtectMiddleware::new(blacklist.clone()));
        }
        for entry in self.middleware {
            middleware.add_arc(entry);
        }

        let mut plugins = self.plugins;
        if !settings.headers.is_empty() {
            plugins.add_after(HeadersPlugin::new(&settings.headers)?);
        }

        let static_root = settings.static_root();
        let dynamic_root = settings.dynamic_root();
        info!(
            static_root = %static_root.display(),
            dynamic_root = %dynamic_root.display(),
            performance = settings.performance,
            middleware = middleware.len(),
            "디스패처 구성 완료"
        );

        Ok(Dispatcher {
            router: self.router.unwrap_or_default(),
            handlers: Arc::new(self.handlers),
            blacklist,
            confinement: PathConfinement::new(&static_root, dynamic_root, settings.follow_symlinks),
            plugins,
            middleware,
            proxy: ProxyClient::new(),
            files: StaticFiles::new(static_root, settings.welcome_page),
            performance: settings.performance,
        })
    }
}

impl Dispatcher {
    pub fn builder(settings: &RouterSettings) -> DispatcherBuilder {
        DispatcherBuilder::new(settings)
    }

    pub fn router(&self) -> &Arc<RoutingTable> {
        &self.router
    }

    pub fn blacklist(&self) -> &Arc<Blacklist> {
        &self.blacklist
    }

    /// 요청을 처리하여 응답을 만듭니다.
    ///
    /// `Err`는 항상 연결을 응답 없이 끊어야 한다는 뜻입니다 (`closes_connection`).
    /// 그 밖의 실패는 모두 에러 복구를 거쳐 정제된 응답으로 바뀝니다.
    pub async fn dispatch<B>(&self, req: Request<B>, peer: Option<SocketAddr>) -> DispatchResult
    where
        B: Body<Data = Bytes, Error = hyper::Error> + Send + Sync + 'static,
    {
        let mut ctx = RequestContext::new(req, peer);
        let mut log = RequestLog::start(&ctx);

        let outcome = logging::within_request(AssertUnwindSafe(self.process(&mut ctx)).catch_unwind())
            .await
            .unwrap_or_else(|panic| Err(HandlerError::Panicked(panic_message(panic)).into()));

        if let Some(log) = log.as_mut() {
            log.with_target(ctx.target.as_deref());
        }

        let result = match outcome {
            Ok(_) if ctx.is_closed() => Err(DispatchError::Closed),
            Ok(response) => Ok(response),
            Err(e) if ctx.is_closed() || e.closes_connection() => {
                if let Some(log) = log.as_mut() {
                    log.with_error(&e);
                }
                Err(e)
            }
            Err(e) => {
                if let Some(log) = log.as_mut() {
                    log.with_error(&e);
                }
                Ok(self.recover(&mut ctx, e).await)
            }
        };

        if let Some(mut log) = log {
            if let Ok(response) = &result {
                log.with_response(response.status());
            }
            log.finish();
        }
        result
    }

    async fn process(&self, ctx: &mut RequestContext) -> DispatchResult {
        // Routing
        let requested = ctx.path().to_string();
        let confined = self.confinement.confine(&requested).await;
        if confined == NOT_FOUND_PAGE && requested != NOT_FOUND_PAGE {
            ctx.set_status(StatusCode::NOT_FOUND);
        }
        let route = self.router.resolve(&confined, self.handlers.as_ref()).await?;

        // Classification
        let kind = ResourceKind::classify(&route.path);
        ctx.kind = Some(kind);
        ctx.target = Some(route.path.clone());
        debug!(request_id = %ctx.request_id, path = %confined, resource = %route.path, kind = ?kind, "요청 분류");

        // Middleware
        if kind != ResourceKind::Static {
            if let Some(response) = self.run_chain(ctx).await? {
                return Ok(response);
            }
        }

        match kind {
            ResourceKind::Proxy => self.serve_proxy(ctx, &route.path).await,
            ResourceKind::Dynamic => self.serve_dynamic(ctx, route).await,
            ResourceKind::Static => self.serve_static(ctx, &route.path).await,
        }
    }

    /// before 플러그인과 미들웨어 체인을 실행합니다.
    ///
    /// 체인이 응답을 끝냈거나 중단되면 지금까지 작성된 응답을 반환합니다.
    async fn run_chain(&self, ctx: &mut RequestContext) -> Result<Option<Response<ResponseBody>>, DispatchError> {
        self.plugins.execute_before(ctx).await?;
        if ctx.is_closed() {
            return Err(DispatchError::Closed);
        }
        if ctx.response.ended {
            return Ok(Some(ctx.take_response()));
        }

        match self.middleware.execute(ctx).await? {
            ChainOutcome::Completed if !ctx.response.ended => Ok(None),
            _ if ctx.is_closed() => Err(DispatchError::Closed),
            _ => {
                debug!(request_id = %ctx.request_id, "미들웨어가 응답을 종료함");
                Ok(Some(ctx.take_response()))
            }
        }
    }

    /// 상태를 변경하는 요청의 본문을 버퍼링합니다. 크기 제한을 넘으면 클라이언트를 차단합니다.
    ///
    /// 프록시 대상이면 multipart 본문도 그대로 전달하기 위해 모읍니다.
    async fn buffer(&self, ctx: &mut RequestContext, proxied: bool) -> Result<(), DispatchError> {
        let needed = if proxied { ctx.must_forward_body() } else { ctx.must_process_body() };
        if !needed {
            return Ok(());
        }
        match ctx.buffer_body().await {
            Ok(()) => Ok(()),
            Err(BodyError::TooLarge { limit }) => {
                warn!(request_id = %ctx.request_id, limit, "요청 본문 크기 초과");
                self.blacklist.block(ctx).await;
                Err(DispatchError::BodyTooLarge)
            }
            Err(BodyError::Read(e)) => {
                debug!(request_id = %ctx.request_id, error = %e, "요청 본문 읽기 실패");
                ctx.close();
                Err(DispatchError::Closed)
            }
        }
    }

    async fn serve_proxy(&self, ctx: &mut RequestContext, target: &str) -> DispatchResult {
        self.buffer(ctx, true).await?;
        let response = self.proxy.forward(target, ctx).await?;
        self.finish_proxied(ctx, response).await
    }

    /// 원본 응답의 상태와 헤더를 컨텍스트로 옮겨 after 플러그인을 실행합니다.
    async fn finish_proxied(
        &self,
        ctx: &mut RequestContext,
        response: Response<ResponseBody>,
    ) -> DispatchResult {
        let (parts, body) = response.into_parts();
        ctx.set_status(parts.status);
        ctx.response.headers = parts.headers;
        self.plugins.execute_after(ctx).await?;
        Ok(ctx.build_response(body))
    }

    async fn serve_dynamic(&self, ctx: &mut RequestContext, route: ResolvedRoute) -> DispatchResult {
        let Some(resource) = self.handlers.get(&route.path) else {
            debug!(request_id = %ctx.request_id, path = %route.path, "동적 핸들러 없음, 정적 파일로 처리");
            return self.serve_static(ctx, &route.path).await;
        };

        self.buffer(ctx, false).await?;

        let params = render::merge_query(route.params, ctx.query());
        let method = ctx.method.clone();
        let output = match handler::invoke(resource.as_ref(), &method, ctx, params.as_ref()).await {
            Ok(output) => output,
            Err(HandlerError::NotImplemented) => return Err(DispatchError::MethodNotAllowed(method)),
            Err(e) => return Err(e.into()),
        };
        if ctx.is_closed() {
            return Err(DispatchError::Closed);
        }

        // 핸들러가 직접 응답을 끝낸 경우
        if ctx.response.ended && matches!(output, HandlerOutput::Empty) {
            return Ok(ctx.take_response());
        }

        let body = render::render(ctx, output, self.performance).await?;
        self.plugins.execute_after(ctx).await?;
        Ok(ctx.build_response(body))
    }

    async fn serve_static(&self, ctx: &mut RequestContext, path: &str) -> DispatchResult {
        match self.files.locate(path).await {
            Located::File(file) => Ok(self.files.serve(ctx, &file).await?),
            Located::Redirect => {
                let mut location = format!("{}/", ctx.path());
                if let Some(query) = ctx.query() {
                    location.push('?');
                    location.push_str(query);
                }
                debug!(request_id = %ctx.request_id, location = %location, "디렉토리 요청 리다이렉트");
                let location = HeaderValue::from_str(&location)
                    .map_err(|_| DispatchError::NotFound(path.to_string()))?;
                ctx.set_status(StatusCode::MOVED_PERMANENTLY);
                ctx.set_header(header::LOCATION, location);
                Ok(ctx.take_response())
            }
            Located::Missing => match self.referer_target(ctx).await {
                Some(target) => {
                    info!(request_id = %ctx.request_id, upstream = %target, "referer 기준으로 원본 서버에 요청");
                    ctx.kind = Some(ResourceKind::Proxy);
                    ctx.target = Some(target.clone());
                    self.serve_proxy(ctx, &target).await
                }
                None => Err(DispatchError::NotFound(path.to_string())),
            },
        }
    }

    /// 로컬에 없는 리소스를 `Referer`가 가리키던 원본 서버 기준으로 해석합니다.
    async fn referer_target(&self, ctx: &RequestContext) -> Option<String> {
        let referer = Url::parse(ctx.header(header::REFERER)?).ok()?;
        let route = self.router.resolve(referer.path(), self.handlers.as_ref()).await.ok()?;
        resolve_target(ctx.path(), Some(&route.path))
    }

    /// 에러를 정제하고 상태 코드에 맞는 에러 페이지를 만듭니다. 절대 실패하지 않습니다.
    async fn recover(&self, ctx: &mut RequestContext, err: DispatchError) -> Response<ResponseBody> {
        let purified = purify(&err, ctx.response.status);
        if purified.status.is_server_error() {
            error!(request_id = %ctx.request_id, status = purified.status.as_u16(), error = %err, "요청 처리 실패");
        } else {
            debug!(request_id = %ctx.request_id, status = purified.status.as_u16(), error = %err, "에러 응답");
        }
        ctx.error = Some(purified);

        let page = logging::within_request(AssertUnwindSafe(self.error_page(ctx, purified)).catch_unwind())
            .await;
        match page {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!(request_id = %ctx.request_id, error = %e, "에러 페이지 생성 실패, 기본 페이지 사용");
                default_error_page(purified)
            }
            Err(panic) => {
                warn!(request_id = %ctx.request_id, panic = %panic_message(panic), "에러 페이지 패닉, 기본 페이지 사용");
                default_error_page(purified)
            }
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "알 수 없는 패닉".to_string()
    }
}
