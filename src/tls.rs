//! HTTPS 리스너용 인증서 로딩

use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_rustls::rustls::{self, Certificate, PrivateKey};
use tokio_rustls::TlsAcceptor;
use tracing::{error, info};

#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("인증서 파일 {path} 읽기 실패: {source}")]
    File {
        path: String,
        source: std::io::Error,
    },

    #[error("{0}에서 인증서를 찾을 수 없습니다")]
    NoCertificate(String),

    #[error("{0}에서 PKCS#8 개인키를 찾을 수 없습니다")]
    NoPrivateKey(String),

    #[error("TLS 설정 실패: {0}")]
    Config(#[from] rustls::Error),

    #[error("HTTPS 포트 바인딩 실패: {0}")]
    Bind(std::io::Error),
}

/// HTTPS 리스너와 TLS 핸드셰이크 수락기
pub struct TlsConfig {
    pub acceptor: TlsAcceptor,
    pub listener: TcpListener,
}

impl TlsConfig {
    pub async fn new(cert_path: &str, key_path: &str, addr: SocketAddr) -> Result<Self, TlsError> {
        let server_config = load_server_config(cert_path, key_path)?;
        let acceptor = TlsAcceptor::from(Arc::new(server_config));

        let listener = TcpListener::bind(addr).await.map_err(|e| {
            error!(error = %e, addr = %addr, "HTTPS 포트 바인딩 실패");
            TlsError::Bind(e)
        })?;

        info!(addr = %addr, "HTTPS 리스너 시작");
        Ok(Self { acceptor, listener })
    }
}

/// PEM 인증서 체인과 첫 번째 PKCS#8 개인키로 서버 설정을 만듭니다.
pub fn load_server_config(cert_path: &str, key_path: &str) -> Result<rustls::ServerConfig, TlsError> {
    let certs: Vec<Certificate> = rustls_pemfile::certs(&mut open(cert_path)?)
        .map_err(|source| file_error(cert_path, source))?
        .into_iter()
        .map(Certificate)
        .collect();
    if certs.is_empty() {
        return Err(TlsError::NoCertificate(cert_path.to_string()));
    }

    let key = rustls_pemfile::pkcs8_private_keys(&mut open(key_path)?)
        .map_err(|source| file_error(key_path, source))?
        .into_iter()
        .next()
        .ok_or_else(|| TlsError::NoPrivateKey(key_path.to_string()))?;

    let config = rustls::ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(certs, PrivateKey(key))?;

    Ok(config)
}

fn open(path: &str) -> Result<BufReader<File>, TlsError> {
    File::open(Path::new(path))
        .map(BufReader::new)
        .map_err(|source| file_error(path, source))
}

fn file_error(path: &str, source: std::io::Error) -> TlsError {
    TlsError::File {
        path: path.to_string(),
        source,
    }
}
