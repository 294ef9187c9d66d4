use std::env;
use std::path::{Path, PathBuf};
use serde::Deserialize;
use tracing::{debug, info};

mod error;
pub mod logging;
mod router;
mod server;
pub mod watcher;

pub use error::SettingsError;
pub use logging::{LogFormat, LogOutput, LogSettings};
pub use router::{RouteRules, RouterSettings};
pub use server::{parse_env_var, ServerSettings};

pub type Result<T> = std::result::Result<T, SettingsError>;

/// 설정 파일 경로를 지정하는 환경 변수
pub const CONFIG_FILE_ENV: &str = "WEBGATE_CONFIG_FILE";

/// 전체 설정. TOML의 `[server]`, `[logging]`, `[router]` 테이블에 대응하며 모두 생략 가능합니다.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LogSettings,
    pub router: RouterSettings,
}

impl Settings {
    /// `WEBGATE_CONFIG_FILE`이 있으면 TOML 파일에서, 없으면 환경 변수에서 로드합니다.
    pub async fn load() -> Result<Self> {
        let settings = match Self::config_path() {
            Some(path) => Self::from_toml_file(path).await?,
            None => Self::from_env()?,
        };
        Ok(settings)
    }

    pub fn config_path() -> Option<PathBuf> {
        env::var_os(CONFIG_FILE_ENV).map(PathBuf::from)
    }

    pub async fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!(file = %path.display(), "설정 파일 로드");

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SettingsError::FileError {
                path: path.display().to_string(),
                source,
            })?;
        let settings: Self = toml::from_str(&content)?;
        settings.validate()?;

        info!(file = %path.display(), rules = settings.router.rules.len(), "설정 파일 로드 완료");
        Ok(settings)
    }

    pub fn from_env() -> Result<Self> {
        let settings = Self {
            server: ServerSettings::from_env()?,
            logging: LogSettings::from_env()?,
            router: RouterSettings::from_env()?,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.router.validate()
    }
}
