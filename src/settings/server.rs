use std::env;
use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use serde::Deserialize;

use super::SettingsError;

/// 리스너 설정
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    /// 바인딩할 주소 (기본값: 0.0.0.0)
    pub bind_address: IpAddr,

    /// HTTP 포트 (기본값: 8080)
    pub http_port: u16,

    pub https_enabled: bool,

    /// HTTPS 포트 (기본값: 443)
    pub https_port: u16,

    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            http_port: 8080,
            https_enabled: false,
            https_port: 443,
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

/// 환경 변수를 읽어 파싱합니다. 변수가 없으면 `default`의 값을 사용합니다.
pub fn parse_env_var<T, F>(name: &str, default: F) -> Result<T, SettingsError>
where
    T: FromStr,
    T::Err: Display,
    F: FnOnce() -> T,
{
    let value = match env::var(name) {
        Ok(value) => value,
        Err(env::VarError::NotPresent) => return Ok(default()),
        Err(e) => return Err(invalid_env(name, "", e)),
    };
    value.parse().map_err(|e| invalid_env(name, &value, e))
}

fn invalid_env(name: &str, value: &str, reason: impl Display) -> SettingsError {
    SettingsError::EnvVarInvalid {
        var_name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

impl ServerSettings {
    pub fn from_env() -> Result<Self, SettingsError> {
        let defaults = Self::default();
        let settings = Self {
            bind_address: parse_env_var("WEBGATE_BIND_ADDRESS", || defaults.bind_address)?,
            http_port: parse_env_var("WEBGATE_HTTP_PORT", || defaults.http_port)?,
            https_enabled: parse_env_var("WEBGATE_HTTPS_ENABLED", || defaults.https_enabled)?,
            https_port: parse_env_var("WEBGATE_HTTPS_PORT", || defaults.https_port)?,
            tls_cert_path: env::var("WEBGATE_TLS_CERT").ok(),
            tls_key_path: env::var("WEBGATE_TLS_KEY").ok(),
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.http_port)
    }

    pub fn https_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.https_port)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.http_port == 0 {
            return Err(SettingsError::InvalidConfig("HTTP 포트는 0이 될 수 없습니다".to_string()));
        }
        if !self.https_enabled {
            return Ok(());
        }

        // HTTPS는 인증서와 키가 모두 있어야 함
        if self.tls_cert_path.is_none() {
            return Err(SettingsError::EnvVarMissing { var_name: "WEBGATE_TLS_CERT".to_string() });
        }
        if self.tls_key_path.is_none() {
            return Err(SettingsError::EnvVarMissing { var_name: "WEBGATE_TLS_KEY".to_string() });
        }
        if self.https_port == 0 || self.https_port == self.http_port {
            return Err(SettingsError::InvalidConfig(format!(
                "HTTPS 포트 {}는 0이 아니고 HTTP 포트와 달라야 합니다",
                self.https_port
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_conflict() {
        let settings = ServerSettings {
            https_enabled: true,
            https_port: 8080,
            tls_cert_path: Some("cert.pem".to_string()),
            tls_key_path: Some("key.pem".to_string()),
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(SettingsError::InvalidConfig(_))));
    }

    #[test]
    fn test_addresses() {
        let settings: ServerSettings = toml::from_str(r#"
            bind_address = "127.0.0.1"
            https_port = 8443
        "#).unwrap();
        assert_eq!(settings.http_addr(), "127.0.0.1:8080".parse().unwrap());
        assert_eq!(settings.https_addr(), "127.0.0.1:8443".parse().unwrap());
    }
}
