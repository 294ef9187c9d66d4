use hyper::{Method, StatusCode};

use crate::handler::HandlerError;
use crate::middleware::MiddlewareError;
use crate::proxy::ProxyError;
use crate::routing::RoutingError;
use crate::security::StatusHint;

/// 요청 처리 중 발생하는 모든 실패
///
/// `Closed`와 `BodyTooLarge`를 제외한 모든 에러는 에러 복구 단계에서
/// 정제된 상태 코드 응답으로 바뀝니다.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("라우팅 실패: {0}")]
    Routing(#[from] RoutingError),

    #[error("허용되지 않은 메서드: {0}")]
    MethodNotAllowed(Method),

    #[error("리소스를 찾을 수 없습니다: {0}")]
    NotFound(String),

    #[error("요청 본문이 너무 큽니다")]
    BodyTooLarge,

    #[error("프록시 실패: {0}")]
    UpstreamProxy(#[from] ProxyError),

    #[error("핸들러 실패: {0}")]
    Handler(#[from] HandlerError),

    #[error("미들웨어 실패: {0}")]
    Middleware(#[from] MiddlewareError),

    #[error("정적 파일 읽기 실패: {0}")]
    Io(#[from] std::io::Error),

    /// 연결이 응답 없이 종료되어야 함
    #[error("연결 종료")]
    Closed,
}

impl DispatchError {
    /// 응답을 만들지 않고 연결을 끊어야 하는 에러인지 확인합니다.
    pub fn closes_connection(&self) -> bool {
        matches!(self, DispatchError::Closed | DispatchError::BodyTooLarge)
    }
}

impl StatusHint for DispatchError {
    fn status_hint(&self) -> Option<u16> {
        match self {
            DispatchError::Routing(_) => Some(StatusCode::BAD_REQUEST.as_u16()),
            DispatchError::MethodNotAllowed(_) => Some(StatusCode::METHOD_NOT_ALLOWED.as_u16()),
            DispatchError::NotFound(_) => Some(StatusCode::NOT_FOUND.as_u16()),
            DispatchError::BodyTooLarge => Some(StatusCode::PAYLOAD_TOO_LARGE.as_u16()),
            DispatchError::UpstreamProxy(e) => e.status_hint(),
            DispatchError::Handler(e) => e.status_hint(),
            DispatchError::Middleware(e) => e.status_hint(),
            DispatchError::Io(_) | DispatchError::Closed => None,
        }
    }
}
