use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use hyper_util::rt::TokioIo;
use tracing::{debug, error, info};

use super::handler::ConnectionHandler;
use super::{Error, Result};
use crate::settings::ServerSettings;
use crate::tls::TlsConfig;

pub struct ServerListener {
    http_listener: TcpListener,
    https_config: Option<TlsConfig>,
}

impl ServerListener {
    pub async fn new(settings: &ServerSettings) -> Result<Self> {
        let addr = settings.http_addr();
        let http_listener = TcpListener::bind(addr).await.map_err(|e| {
            error!(error = %e, addr = %addr, "HTTP 포트 바인딩 실패");
            e
        })?;

        info!(addr = %addr, "HTTP 리스너 시작");

        let https_config = match (settings.https_enabled, &settings.tls_cert_path, &settings.tls_key_path) {
            (true, Some(cert), Some(key)) => Some(TlsConfig::new(cert, key, settings.https_addr()).await?),
            (true, _, _) => {
                return Err(Error::Settings(crate::settings::SettingsError::InvalidConfig(
                    "HTTPS가 활성화되었지만 인증서 또는 키 경로가 없습니다".to_string(),
                )))
            }
            _ => None,
        };

        Ok(Self {
            http_listener,
            https_config,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.http_listener.local_addr()?)
    }

    pub async fn run(self, handler: ConnectionHandler) -> Result<()> {
        loop {
            tokio::select! {
                result = self.http_listener.accept() => {
                    match result {
                        Ok((stream, peer)) => serve_http(handler.clone(), stream, peer),
                        Err(e) => error!(error = %e, "HTTP 연결 수락 실패"),
                    }
                }

                result = async {
                    match &self.https_config {
                        Some(config) => config.listener.accept().await,
                        None => std::future::pending().await,
                    }
                } => {
                    match (result, &self.https_config) {
                        (Ok((stream, peer)), Some(config)) => {
                            let handler = handler.clone();
                            let acceptor = config.acceptor.clone();
                            tokio::spawn(async move {
                                match acceptor.accept(stream).await {
                                    Ok(tls_stream) => {
                                        let io = TokioIo::new(tls_stream);
                                        if let Err(e) = handler.handle_connection(io, peer).await {
                                            debug!(error = %e, "HTTPS 연결 처리 종료");
                                        }
                                    }
                                    Err(e) => error!(error = %e, peer = %peer, "TLS 핸드셰이크 실패"),
                                }
                            });
                        }
                        (Ok(_), None) => {}
                        (Err(e), _) => error!(error = %e, "HTTPS 연결 수락 실패"),
                    }
                }
            }
        }
    }
}

fn serve_http(handler: ConnectionHandler, stream: TcpStream, peer: SocketAddr) {
    tokio::spawn(async move {
        let io = TokioIo::new(stream);
        if let Err(e) = handler.handle_connection(io, peer).await {
            debug!(error = %e, "HTTP 연결 처리 종료");
        }
    });
}
