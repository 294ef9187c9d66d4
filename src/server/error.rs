use crate::routing::RoutingError;
use crate::settings::SettingsError;
use crate::tls::TlsError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O 오류: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS 오류: {0}")]
    Tls(#[from] TlsError),

    #[error("설정 오류: {0}")]
    Settings(#[from] SettingsError),

    #[error("라우팅 규칙 오류: {0}")]
    Routing(#[from] RoutingError),

    #[error("디스패처 구성 오류: {0}")]
    Middleware(#[from] crate::middleware::MiddlewareError),
}
