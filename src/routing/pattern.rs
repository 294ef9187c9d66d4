use std::collections::HashMap;
use std::hash::Hash;
use percent_encoding::percent_decode_str;
use regex_lite as regex;
use crate::routing::error::RoutingError;

/// 와일드카드 나머지 경로가 저장되는 파라미터 키
pub const WILDCARD_KEY: &str = "_";

/// 컴파일된 경로 패턴입니다.
///
/// 지원하는 문법:
/// * 리터럴 세그먼트 (`/cars`)
/// * 이름 있는 파라미터 (`:id`) - 점(`.`)을 포함한 값도 통째로 캡처합니다
/// * 끝에 오는 와일드카드 하나 (`*`, 키 `_`로 캡처)
/// * 선택 그룹 (`(/:id)`, `(/*)`)
///
/// ```
/// use webgate::routing::PathPattern;
///
/// let pattern = PathPattern::parse("/hosts(/:ip)").unwrap();
/// let captures = pattern.captures("/hosts/17.223.37.12").unwrap();
/// assert_eq!(captures.get("ip").map(String::as_str), Some("17.223.37.12"));
/// ```
#[derive(Debug, Clone)]
pub struct PathPattern {
    pub source: String,
    regex: regex::Regex,
    names: Vec<String>,
    literal: String,
}

impl PathPattern {
    /// 패턴 문자열을 정규식으로 컴파일합니다.
    pub fn parse(pattern: &str) -> Result<Self, RoutingError> {
        let invalid = |reason: &str| RoutingError::InvalidPathPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        if !pattern.starts_with('/') && !pattern.starts_with("(/") {
            return Err(invalid("패턴은 '/'로 시작해야 합니다"));
        }

        let mut expr = String::from("^");
        let mut names: Vec<String> = Vec::new();
        let mut literal = String::new();
        let mut literal_done = false;
        let mut depth = 0usize;
        let mut wildcard_seen = false;

        let mut chars = pattern.chars().peekable();
        while let Some(c) = chars.next() {
            // 와일드카드 뒤에는 그룹 닫기만 올 수 있음
            if wildcard_seen && c != ')' {
                return Err(invalid("와일드카드는 마지막 세그먼트여야 합니다"));
            }

            match c {
                '(' => {
                    depth += 1;
                    expr.push_str("(?:");
                }
                ')' => {
                    if depth == 0 {
                        return Err(invalid("짝이 맞지 않는 ')'"));
                    }
                    depth -= 1;
                    expr.push_str(")?");
                }
                ':' if chars.peek().map_or(false, |n| is_name_char(*n)) => {
                    let mut name = String::new();
                    while let Some(n) = chars.peek().copied().filter(|n| is_name_char(*n)) {
                        name.push(n);
                        chars.next();
                    }
                    if names.contains(&name) {
                        return Err(invalid("중복된 파라미터 이름"));
                    }
                    // 파라미터 값은 '/'를 제외한 모든 문자 (IP, database.user 등)
                    expr.push_str("([^/]+)");
                    names.push(name);
                    if depth == 0 {
                        literal_done = true;
                    }
                }
                '*' => {
                    wildcard_seen = true;
                    expr.push_str("(.*)");
                    names.push(WILDCARD_KEY.to_string());
                    if depth == 0 {
                        literal_done = true;
                    }
                }
                other => {
                    expr.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4])));
                    if depth == 0 && !literal_done {
                        literal.push(other);
                    }
                }
            }
        }

        if depth != 0 {
            return Err(invalid("닫히지 않은 '('"));
        }
        expr.push('$');

        let regex = regex::Regex::new(&expr).map_err(|e| invalid(&e.to_string()))?;
        if literal.is_empty() {
            literal.push('/');
        }

        Ok(Self {
            source: pattern.to_string(),
            regex,
            names,
            literal,
        })
    }

    /// 파라미터가 없는 리터럴 경로 그대로를 매칭하는 패턴을 만듭니다.
    pub fn exact(path: &str) -> Result<Self, RoutingError> {
        let expr = format!("^{}$", regex::escape(path));
        let regex = regex::Regex::new(&expr).map_err(|e| RoutingError::InvalidPathPattern {
            pattern: path.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            source: path.to_string(),
            regex,
            names: Vec::new(),
            literal: path.to_string(),
        })
    }

    /// 패턴에서 파라미터 세그먼트와 선택 그룹을 제외한 리터럴 경로
    /// (`/cars(/:id)` -> `/cars`)
    pub fn literal(&self) -> &str {
        &self.literal
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// 경로를 매칭하고 캡처된 값을 디코딩하여 반환합니다.
    ///
    /// 빈 캡처는 키 자체를 만들지 않습니다. 매칭되지 않으면 `None`.
    pub fn captures(&self, path: &str) -> Option<HashMap<String, String>> {
        let raw = self.raw_captures(path)?;
        Some(raw.into_iter().map(|(name, value)| (name.to_string(), decode(value))).collect())
    }

    /// 디코딩하지 않은 원래 캡처 값을 패턴 순서대로 반환합니다.
    ///
    /// 인코딩된 `%3F`, `%2F` 같은 값을 다른 경로에 이어 붙일 때 사용합니다.
    pub fn raw_captures<'p>(&self, path: &'p str) -> Option<Vec<(&str, &'p str)>> {
        let caps = self.regex.captures(path)?;
        let values = self.names.iter()
            .enumerate()
            .filter_map(|(i, name)| {
                caps.get(i + 1)
                    .map(|m| m.as_str())
                    .filter(|v| !v.is_empty())
                    .map(|v| (name.as_str(), v))
            })
            .collect();
        Some(values)
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

pub(crate) fn decode(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}

impl PartialEq for PathPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for PathPattern {}

impl Hash for PathPattern {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.source.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_invalid_patterns() {
        for pattern in ["cars", "/a/*/b", "/a(/:id", "/a)/b", "/:id/:id", "/*/*"] {
            assert!(PathPattern::parse(pattern).is_err(), "패턴 '{}'은 실패해야 함", pattern);
        }
    }

    #[test]
    fn test_optional_param() {
        let pattern = PathPattern::parse("/bikes(/:id)").unwrap();
        assert_eq!(pattern.captures("/bikes").unwrap().len(), 0);
        assert_eq!(pattern.captures("/bikes/33").unwrap()["id"], "33");
        assert!(pattern.captures("/bikes/33/wheels").is_none());
        assert!(pattern.captures("/bikesx").is_none());
    }

    #[test]
    fn test_dotted_param_values_are_not_split() {
        let pattern = PathPattern::parse("/db/:name/:host").unwrap();
        let caps = pattern.captures("/db/database.user/17.223.37.12").unwrap();
        assert_eq!(caps["name"], "database.user");
        assert_eq!(caps["host"], "17.223.37.12");
    }

    #[test]
    fn test_wildcard_capture() {
        let pattern = PathPattern::parse("/governance(/*)").unwrap();
        assert_eq!(pattern.captures("/governance/car/test/").unwrap()[WILDCARD_KEY], "car/test/");
        // 빈 나머지 경로는 키를 만들지 않음
        assert!(pattern.captures("/governance/").unwrap().is_empty());
        assert!(pattern.captures("/governance").unwrap().is_empty());
    }

    #[test]
    fn test_captures_are_percent_decoded() {
        let pattern = PathPattern::parse("/files/:name").unwrap();
        assert_eq!(pattern.captures("/files/my%20file").unwrap()["name"], "my file");
    }

    #[test]
    fn test_literal_reconstruction() {
        assert_eq!(PathPattern::parse("/cars(/:id)").unwrap().literal(), "/cars");
        assert_eq!(PathPattern::parse("/").unwrap().literal(), "/");
        assert_eq!(PathPattern::parse("/rest/*").unwrap().literal(), "/rest/");
        assert_eq!(PathPattern::parse("/users/:id/posts").unwrap().literal(), "/users/");
    }

    #[test]
    fn test_exact_pattern_escapes_metacharacters() {
        let pattern = PathPattern::exact("/types/a.b(c)").unwrap();
        assert!(pattern.is_match("/types/a.b(c)"));
        assert!(!pattern.is_match("/types/aXb(c)"));
    }
}
