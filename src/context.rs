//! 요청 하나의 처리 상태를 담는 컨텍스트
//!
//! 컨텍스트는 요청을 처리하는 태스크가 단독으로 소유하며 다른 요청과 공유되지 않습니다.

use std::net::SocketAddr;
use bytes::{Bytes, BytesMut};
use http_body_util::combinators::{BoxBody, UnsyncBoxBody};
use http_body_util::{BodyExt, Empty, Full};
use hyper::body::Body;
use hyper::header::{self, HeaderName, HeaderValue};
use hyper::{HeaderMap, Method, Request, Response, StatusCode, Uri};
use uuid::Uuid;

use crate::security::{self, Purified};

/// 요청 본문 타입
pub type RequestBody = BoxBody<Bytes, hyper::Error>;
/// 응답 본문 타입 (핸들러 스트림은 `Sync`가 아닐 수 있음)
pub type ResponseBody = UnsyncBoxBody<Bytes, std::io::Error>;

/// 버퍼링할 수 있는 요청 본문의 최대 크기
pub const MAX_BODY_BYTES: usize = 1_000_000;

/// 해석된 대상 리소스의 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Static,
    Dynamic,
    Proxy,
}

impl ResourceKind {
    /// 절대 URL이면 프록시, 확장자가 없으면 동적, 나머지는 정적
    pub fn classify(path: &str) -> Self {
        if crate::routing::is_absolute_url(path) {
            ResourceKind::Proxy
        } else if crate::routing::has_extension(path) {
            ResourceKind::Static
        } else {
            ResourceKind::Dynamic
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BodyError {
    #[error("요청 본문이 {limit}바이트를 초과했습니다")]
    TooLarge { limit: usize },

    #[error("요청 본문 읽기 실패: {0}")]
    Read(#[from] hyper::Error),
}

/// 작성 중인 응답 상태
///
/// 핸들러, 플러그인, 미들웨어가 직접 수정할 수 있습니다.
#[derive(Debug, Default)]
pub struct ResponseState {
    pub status: Option<StatusCode>,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub ended: bool,
}

impl ResponseState {
    pub fn has_content_type(&self) -> bool {
        self.headers.contains_key(header::CONTENT_TYPE)
    }
}

pub struct RequestContext {
    pub request_id: String,
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub peer: Option<SocketAddr>,
    pub kind: Option<ResourceKind>,
    /// 라우팅 후의 대상 경로 (파일 경로 또는 원본 서버 URL)
    pub target: Option<String>,
    /// 버퍼링된 요청 본문
    pub body: Option<Bytes>,
    raw_body: Option<RequestBody>,
    pub response: ResponseState,
    /// 에러 페이지 핸들러에게 전달되는 정제된 에러
    pub error: Option<Purified>,
    closed: bool,
}

impl RequestContext {
    pub fn new<B>(req: Request<B>, peer: Option<SocketAddr>) -> Self
    where
        B: Body<Data = Bytes, Error = hyper::Error> + Send + Sync + 'static,
    {
        let (parts, body) = req.into_parts();
        Self {
            request_id: Uuid::new_v4().to_string(),
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            peer,
            kind: None,
            target: None,
            body: None,
            raw_body: Some(body.boxed()),
            response: ResponseState::default(),
            error: None,
            closed: false,
        }
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    pub fn header(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn client_id(&self) -> String {
        security::client_id(&self.headers, self.peer)
    }

    /// 아직 읽지 않은 원본 본문 스트림을 가져갑니다.
    ///
    /// `multipart/form-data` 요청처럼 핸들러가 직접 본문을 읽어야 할 때 사용합니다.
    pub fn take_raw_body(&mut self) -> Option<RequestBody> {
        self.raw_body.take()
    }

    /// 디스패처가 핸들러 호출 전에 본문을 버퍼링해야 하는지 확인합니다.
    ///
    /// `multipart/form-data`는 핸들러가 직접 읽도록 남겨 둡니다.
    pub fn must_process_body(&self) -> bool {
        self.must_forward_body() && !self.is_multipart()
    }

    /// 원본 서버로 전달하기 전에 본문을 버퍼링해야 하는지 확인합니다.
    ///
    /// 리다이렉트를 따라갈 때 같은 본문을 다시 보내야 하므로 multipart도 모읍니다.
    pub fn must_forward_body(&self) -> bool {
        self.body.is_none()
            && self.raw_body.is_some()
            && matches!(self.method, Method::POST | Method::PUT | Method::DELETE | Method::PATCH)
    }

    fn is_multipart(&self) -> bool {
        self.header(header::CONTENT_TYPE)
            .map_or(false, |ct| ct.trim_start().to_ascii_lowercase().starts_with("multipart/form-data"))
    }

    /// 요청 본문을 `MAX_BODY_BYTES`까지 메모리에 모읍니다.
    pub async fn buffer_body(&mut self) -> Result<(), BodyError> {
        let Some(mut body) = self.raw_body.take() else {
            return Ok(());
        };

        let mut buffer = BytesMut::new();
        while let Some(frame) = body.frame().await {
            let frame = frame?;
            if let Some(data) = frame.data_ref() {
                if buffer.len() + data.len() > MAX_BODY_BYTES {
                    return Err(BodyError::TooLarge { limit: MAX_BODY_BYTES });
                }
                buffer.extend_from_slice(data);
            }
        }

        self.body = Some(buffer.freeze());
        Ok(())
    }

    /// 본문을 UTF-8 문자열로 반환합니다 (버퍼링된 경우에만).
    pub fn body_text(&self) -> Option<&str> {
        self.body.as_deref().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// 응답 없이 연결을 끊도록 표시합니다.
    pub fn close(&mut self) {
        self.closed = true;
        self.response.ended = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.response.status = Some(status);
    }

    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.response.headers.insert(name, value);
    }

    /// 응답을 종료합니다. 이후 단계는 더 이상 응답을 만들지 않습니다.
    pub fn end(&mut self, body: impl Into<Bytes>) {
        self.response.body = Some(body.into());
        self.response.ended = true;
    }

    /// 지금까지 작성된 응답 상태로 응답을 만듭니다.
    pub fn take_response(&mut self) -> Response<ResponseBody> {
        let body = match self.response.body.take() {
            Some(bytes) => full(bytes),
            None => empty(),
        };
        self.build_response(body)
    }

    /// 응답 상태(상태 코드, 헤더)에 주어진 본문을 붙여 응답을 만듭니다.
    pub fn build_response(&mut self, body: ResponseBody) -> Response<ResponseBody> {
        let mut response = Response::new(body);
        *response.status_mut() = self.response.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = std::mem::take(&mut self.response.headers);
        response
    }
}

pub fn full(bytes: impl Into<Bytes>) -> ResponseBody {
    Full::new(bytes.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

pub fn empty() -> ResponseBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(text: impl Into<Bytes>) -> RequestBody {
        Full::new(text.into())
            .map_err(|never| -> hyper::Error { match never {} })
            .boxed()
    }

    fn context(method: Method, content_type: Option<&str>, text: &'static str) -> RequestContext {
        let mut builder = Request::builder().method(method).uri("/cars?color=red");
        if let Some(ct) = content_type {
            builder = builder.header(header::CONTENT_TYPE, ct);
        }
        let req = builder.body(body(text)).unwrap();
        RequestContext::new(req, None)
    }

    #[test]
    fn test_classify() {
        assert_eq!(ResourceKind::classify("http://example.com/a.html"), ResourceKind::Proxy);
        assert_eq!(ResourceKind::classify("/cars"), ResourceKind::Dynamic);
        assert_eq!(ResourceKind::classify("/index.html"), ResourceKind::Static);
    }

    #[test]
    fn test_must_process_body() {
        assert!(context(Method::POST, Some("application/json"), "{}").must_process_body());
        assert!(context(Method::PATCH, None, "").must_process_body());
        assert!(!context(Method::GET, None, "").must_process_body());
        assert!(!context(Method::POST, Some("multipart/form-data; boundary=x"), "").must_process_body());
        assert!(context(Method::POST, Some("multipart/form-data; boundary=x"), "").must_forward_body());
    }

    #[tokio::test]
    async fn test_buffer_body() {
        let mut ctx = context(Method::POST, None, "name=kim");
        ctx.buffer_body().await.unwrap();
        assert_eq!(ctx.body_text(), Some("name=kim"));
        assert!(!ctx.must_process_body());
    }

    #[tokio::test]
    async fn test_buffer_body_limit() {
        let big = "a".repeat(MAX_BODY_BYTES + 1);
        let req = Request::builder()
            .method(Method::PUT)
            .uri("/upload")
            .body(body(big))
            .unwrap();
        let mut ctx = RequestContext::new(req, None);
        assert!(matches!(ctx.buffer_body().await, Err(BodyError::TooLarge { .. })));
    }
}
