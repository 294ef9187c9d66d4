use hyper::StatusCode;

use crate::security::StatusHint;

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("메서드가 구현되지 않았습니다")]
    NotImplemented,

    #[error("핸들러가 상태 {0}로 실패했습니다")]
    Status(StatusCode),

    #[error("핸들러 실행 실패: {0}")]
    Failed(String),

    #[error("핸들러 패닉: {0}")]
    Panicked(String),

    #[error("출력 직렬화 실패: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        HandlerError::Failed(message.into())
    }
}

impl StatusHint for HandlerError {
    fn status_hint(&self) -> Option<u16> {
        match self {
            HandlerError::NotImplemented => Some(StatusCode::METHOD_NOT_ALLOWED.as_u16()),
            HandlerError::Status(status) => Some(status.as_u16()),
            HandlerError::Failed(message) => message.status_hint(),
            _ => None,
        }
    }
}
