use std::str::FromStr;
use serde::{de, Deserialize, Deserializer};
use tracing::Level;

use super::{server::parse_env_var, SettingsError};

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("text") {
            Ok(Self::Text)
        } else if s.eq_ignore_ascii_case("json") {
            Ok(Self::Json)
        } else {
            Err(format!("잘못된 로그 형식: {}", s))
        }
    }
}

/// 로그 출력 대상
///
/// `none`은 로거를 설치하지 않습니다. 다른 코드는 바뀌지 않습니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LogOutput {
    #[default]
    Stdout,
    File(String),
    Null,
}

impl FromStr for LogOutput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" => Err("빈 로그 출력 대상".to_string()),
            "stdout" => Ok(Self::Stdout),
            "none" | "null" => Ok(Self::Null),
            _ => Ok(Self::File(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for LogOutput {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?.parse().map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub format: LogFormat,
    #[serde(deserialize_with = "level_from_toml")]
    pub level: Level,
    pub output: LogOutput,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            level: Level::INFO,
            output: LogOutput::Stdout,
        }
    }
}

impl LogSettings {
    pub fn from_env() -> Result<Self, SettingsError> {
        let defaults = Self::default();
        Ok(Self {
            format: parse_env_var("WEBGATE_LOG_FORMAT", || defaults.format)?,
            level: parse_env_var("WEBGATE_LOG_LEVEL", || defaults.level)?,
            output: parse_env_var("WEBGATE_LOG_OUTPUT", || defaults.output)?,
        })
    }
}

// 잘못된 레벨은 조용히 기본값으로 바꾸지 않고 설정 오류로 취급
fn level_from_toml<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Level, D::Error> {
    let raw = String::deserialize(deserializer)?;
    raw.parse()
        .map_err(|_| de::Error::custom(format!("유효하지 않은 로그 레벨: {}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_table_uses_defaults() {
        let settings: LogSettings = toml::from_str(r#"level = "WARN""#).unwrap();
        assert_eq!(settings.level, Level::WARN);
        assert_eq!(settings.format, LogFormat::Text);
        assert_eq!(settings.output, LogOutput::Stdout);
    }

    #[test]
    fn test_invalid_level_rejected() {
        assert!(toml::from_str::<LogSettings>(r#"level = "loud""#).is_err());
    }

    #[test]
    fn test_output_parsing() {
        assert_eq!("NONE".parse::<LogOutput>(), Ok(LogOutput::Null));
        assert_eq!("/var/log/webgate.log".parse::<LogOutput>(), Ok(LogOutput::File("/var/log/webgate.log".into())));
        assert!("".parse::<LogOutput>().is_err());
    }
}
