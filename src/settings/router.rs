use std::env;
use std::fmt;
use std::path::PathBuf;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use super::{server::parse_env_var, SettingsError};
use crate::middleware::headers::HeaderModification;
use crate::routing::is_absolute_url;

/// 설정 파일에 적힌 순서를 유지하는 라우트 규칙 목록 (패턴 -> 대상)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteRules(pub Vec<(String, String)>);

impl RouteRules {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(p, t)| (p.as_str(), t.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for RouteRules {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RulesVisitor;

        impl<'de> Visitor<'de> for RulesVisitor {
            type Value = RouteRules;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("패턴 문자열 -> 대상 문자열 테이블")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut rules = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((pattern, target)) = map.next_entry::<String, String>()? {
                    rules.push((pattern, target));
                }
                Ok(RouteRules(rules))
            }
        }

        deserializer.deserialize_map(RulesVisitor)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RouterSettings {
    /// 정적/동적 폴더의 기준 디렉토리
    #[serde(default = "default_root")]
    pub root: PathBuf,

    #[serde(default = "default_static_folder")]
    pub static_folder: String,

    #[serde(default = "default_dynamic_folder")]
    pub dynamic_folder: String,

    /// 디렉토리 요청 시 제공할 파일
    #[serde(default = "default_welcome_page")]
    pub welcome_page: String,

    /// 처리량 우선 모드: protect 미들웨어와 기본 Content-Type을 생략
    #[serde(default)]
    pub performance: bool,

    /// 루트 밖을 가리키는 심볼릭 링크 허용 여부
    #[serde(default)]
    pub follow_symlinks: bool,

    #[serde(default)]
    pub rules: RouteRules,

    /// 동적/프록시 응답 헤더 수정
    #[serde(default)]
    pub headers: HeaderModification,
}

fn default_root() -> PathBuf { PathBuf::from(".") }
fn default_static_folder() -> String { "public".to_string() }
fn default_dynamic_folder() -> String { "app".to_string() }
fn default_welcome_page() -> String { "index.html".to_string() }

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            root: default_root(),
            static_folder: default_static_folder(),
            dynamic_folder: default_dynamic_folder(),
            welcome_page: default_welcome_page(),
            performance: false,
            follow_symlinks: false,
            rules: RouteRules::default(),
            headers: HeaderModification::default(),
        }
    }
}

impl RouterSettings {
    pub fn from_env() -> Result<Self, SettingsError> {
        let defaults = Self::default();
        let settings = Self {
            root: env::var("WEBGATE_ROOT").map(PathBuf::from).unwrap_or(defaults.root),
            static_folder: env::var("WEBGATE_STATIC_FOLDER").unwrap_or(defaults.static_folder),
            dynamic_folder: env::var("WEBGATE_DYNAMIC_FOLDER").unwrap_or(defaults.dynamic_folder),
            welcome_page: env::var("WEBGATE_WELCOME_PAGE").unwrap_or(defaults.welcome_page),
            performance: parse_env_var::<bool, _>("WEBGATE_PERFORMANCE", || false)?,
            follow_symlinks: parse_env_var::<bool, _>("WEBGATE_FOLLOW_SYMLINKS", || false)?,
            rules: RouteRules::default(),
            headers: HeaderModification::default(),
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.static_folder.is_empty() || self.dynamic_folder.is_empty() {
            return Err(SettingsError::InvalidConfig(
                "static_folder와 dynamic_folder는 비어 있을 수 없습니다".to_string(),
            ));
        }
        if self.welcome_page.is_empty() || self.welcome_page.contains('/') {
            return Err(SettingsError::InvalidConfig(format!(
                "잘못된 welcome_page: {}",
                self.welcome_page
            )));
        }
        for (pattern, _) in self.rules.iter() {
            if !pattern.starts_with('/') && !pattern.starts_with("(/") {
                return Err(SettingsError::InvalidConfig(format!(
                    "라우트 패턴은 '/'로 시작해야 합니다: {}",
                    pattern
                )));
            }
        }
        Ok(())
    }

    pub fn static_root(&self) -> PathBuf {
        self.root.join(&self.static_folder)
    }

    pub fn dynamic_root(&self) -> PathBuf {
        self.root.join(&self.dynamic_folder)
    }

    /// 라우팅 테이블에 올릴 규칙 목록
    ///
    /// 대상이 절대 URL도 아니고 '/'로 시작하지도 않으면 '/'를 붙이고,
    /// 사용자가 '/'를 정의하지 않았다면 기본 규칙 `"/" = "/index.html"`을 마지막에 추가합니다.
    pub fn rules(&self) -> Vec<(String, String)> {
        let mut rules: Vec<(String, String)> = self.rules.iter()
            .map(|(pattern, target)| (pattern.to_string(), normalize_target(target)))
            .collect();

        if !rules.iter().any(|(pattern, _)| pattern == "/") {
            rules.push(("/".to_string(), format!("/{}", self.welcome_page)));
        }
        rules
    }
}

fn normalize_target(target: &str) -> String {
    if target.is_empty() || target.starts_with('/') || is_absolute_url(target) {
        target.to_string()
    } else {
        format!("/{}", target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rules_keep_document_order() {
        let settings: RouterSettings = toml::from_str(r#"
            [rules]
            "/zeta" = "z.html"
            "/alpha(/:id)" = ""
            "/governance(/*)" = "http://example.com"
        "#).unwrap();

        assert_eq!(settings.rules(), vec![
            ("/zeta".to_string(), "/z.html".to_string()),
            ("/alpha(/:id)".to_string(), "".to_string()),
            ("/governance(/*)".to_string(), "http://example.com".to_string()),
            ("/".to_string(), "/index.html".to_string()),
        ]);
    }

    #[test]
    fn test_user_root_rule_replaces_default() {
        let settings: RouterSettings = toml::from_str(r#"
            [rules]
            "/" = "/home.html"
        "#).unwrap();

        assert_eq!(settings.rules(), vec![("/".to_string(), "/home.html".to_string())]);
    }

    #[test]
    fn test_validate_rejects_nested_welcome_page() {
        let settings = RouterSettings {
            welcome_page: "a/index.html".to_string(),
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }
}
