//! 원본 서버로 요청을 전달하는 리버스 프록시
//!
//! 상대 경로는 `Referer`가 가리키던 원본 서버를 기준으로 해석하고,
//! 원본의 301/302 응답은 한 번만 투명하게 따라갑니다.

use std::io;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{self, HeaderMap, HeaderName, HeaderValue};
use hyper::{Method, Request, Response, StatusCode, Uri};
use hyper_util::client::legacy;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::context::{RequestContext, ResponseBody};
use crate::routing::is_absolute_url;
use crate::security::StatusHint;

/// 원본 서버와 클라이언트 사이에서 전달하지 않는 연결 단위 헤더
const HOP_BY_HOP_HEADERS: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("프록시 대상을 해석할 수 없습니다: {0}")]
    UnresolvedTarget(String),

    #[error("잘못된 프록시 대상 URL {target}: {source}")]
    InvalidUrl {
        target: String,
        source: url::ParseError,
    },

    #[error("지원하지 않는 스킴: {0}")]
    UnsupportedScheme(String),

    #[error("프록시 요청 생성 실패: {0}")]
    Request(#[from] hyper::http::Error),

    #[error("원본 서버 요청 실패: {0}")]
    Upstream(#[from] legacy::Error),
}

impl StatusHint for ProxyError {
    fn status_hint(&self) -> Option<u16> {
        None
    }
}

/// 프록시 대상 페이지를 절대 URL로 해석합니다.
///
/// * 이미 절대 URL이면 그대로 사용
/// * `/`로 시작하면 referer 원본의 스킴+호스트 뒤에 붙임
/// * 상대 경로면 referer 대상의 디렉토리 뒤에 붙임
///
/// `referer_target`은 `Referer` 경로를 라우팅 테이블로 다시 해석한 결과이며,
/// 절대 URL이 아니면 해석에 실패합니다.
pub fn resolve_target(target_page: &str, referer_target: Option<&str>) -> Option<String> {
    if is_absolute_url(target_page) {
        return Some(target_page.to_string());
    }

    let base = referer_target.filter(|t| is_absolute_url(t))?;
    let base = Url::parse(base).ok()?;
    base.join(target_page).ok().map(String::from)
}

#[derive(Clone)]
pub struct ProxyClient {
    client: legacy::Client<HttpConnector, Full<Bytes>>,
}

impl ProxyClient {
    pub fn new() -> Self {
        let connector = HttpConnector::new();
        let client = legacy::Client::builder(TokioExecutor::new())
            .build::<_, Full<Bytes>>(connector);

        Self { client }
    }

    /// 요청을 원본 서버로 전달하고 응답 본문을 스트리밍으로 돌려줍니다.
    ///
    /// 현재 요청의 쿼리 문자열은 대상 URL에 쿼리가 없을 때 덧붙입니다.
    /// 본문은 호출 전에 `ctx.body`에 버퍼링되어 있어야 전달됩니다.
    #[instrument(skip_all, fields(request_id = %ctx.request_id))]
    pub async fn forward(
        &self,
        target: &str,
        ctx: &RequestContext,
    ) -> Result<Response<ResponseBody>, ProxyError> {
        let mut url = Url::parse(target).map_err(|source| ProxyError::InvalidUrl {
            target: target.to_string(),
            source,
        })?;
        if url.query().is_none() {
            url.set_query(ctx.query());
        }

        let body = ctx.body.clone().unwrap_or_default();
        let mut stop = false;

        loop {
            let request = build_request(&ctx.method, &ctx.headers, &url, body.clone())?;
            info!(method = %ctx.method, upstream = %url, "원본 서버로 요청 전달");

            let response = self.client.request(request).await?;
            let status = response.status();

            if !stop && matches!(status, StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND) {
                let next = response.headers()
                    .get(header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|location| url.join(location).ok());
                if let Some(next) = next {
                    debug!(status = %status, location = %next, "원본 리다이렉트를 한 번 따라감");
                    url = next;
                    stop = true;
                    continue;
                }
            }

            if status.is_redirection() && stop {
                warn!(status = %status, "두 번째 리다이렉트는 클라이언트에게 그대로 전달");
            }
            return Ok(relay(response));
        }
    }
}

impl Default for ProxyClient {
    fn default() -> Self {
        Self::new()
    }
}

fn build_request(
    method: &Method,
    headers: &HeaderMap,
    url: &Url,
    body: Bytes,
) -> Result<Request<Full<Bytes>>, ProxyError> {
    if url.scheme() != "http" {
        return Err(ProxyError::UnsupportedScheme(url.scheme().to_string()));
    }
    let host = url.host_str()
        .ok_or_else(|| ProxyError::UnresolvedTarget(url.to_string()))?;
    let authority = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    let uri: Uri = url.as_str()
        .parse()
        .map_err(|e: hyper::http::uri::InvalidUri| ProxyError::Request(e.into()))?;

    let mut forwarded = headers.clone();
    strip_hop_by_hop(&mut forwarded);
    forwarded.remove(header::CONTENT_LENGTH);

    let host_value = HeaderValue::from_str(&authority)
        .map_err(|e| ProxyError::Request(e.into()))?;
    if forwarded.contains_key("hostname") {
        forwarded.insert(HeaderName::from_static("hostname"), host_value.clone());
    }
    forwarded.insert(header::HOST, host_value);

    let mut builder = Request::builder().method(method.clone()).uri(uri);
    if let Some(headers) = builder.headers_mut() {
        *headers = forwarded;
    }
    Ok(builder.body(Full::new(body))?)
}

fn relay(response: Response<Incoming>) -> Response<ResponseBody> {
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    let body = body
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
        .boxed_unsync();
    Response::from_parts(parts, body)
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }
}
