use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("환경 변수 누락: {var_name}")]
    EnvVarMissing { var_name: String },

    #[error("환경 변수 {var_name} 값 '{value}' 오류: {reason}")]
    EnvVarInvalid {
        var_name: String,
        value: String,
        reason: String,
    },

    #[error("설정 파일 {path} 읽기 실패: {source}")]
    FileError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("설정 파싱 오류: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("잘못된 설정: {0}")]
    InvalidConfig(String),

    #[error("설정 파일 감시 오류: {0}")]
    WatchError(String),
}
