use hyper::StatusCode;

use crate::security::StatusHint;

#[derive(Debug, thiserror::Error)]
pub enum MiddlewareError {
    #[error("설정 오류: {0}")]
    Config(String),

    #[error("미들웨어 {middleware} 실행 실패: {message}")]
    Execution {
        middleware: String,
        message: String,
    },

    /// 요청을 특정 상태 코드로 거절
    #[error("미들웨어 {middleware}가 요청을 거절했습니다: {status}")]
    Rejected {
        middleware: String,
        status: StatusCode,
    },
}

impl StatusHint for MiddlewareError {
    fn status_hint(&self) -> Option<u16> {
        match self {
            MiddlewareError::Rejected { status, .. } => Some(status.as_u16()),
            _ => None,
        }
    }
}
