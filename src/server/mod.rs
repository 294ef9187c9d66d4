//! TCP/TLS 연결 수락과 hyper 연결 서비스

pub mod error;
pub mod handler;
pub mod listener;

pub use error::Error;
pub use handler::ConnectionHandler;
pub use listener::ServerListener;

pub type Result<T> = std::result::Result<T, Error>;
