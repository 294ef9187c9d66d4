use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::routing::pattern::decode;
use crate::routing::{PathPattern, RoutingError, WILDCARD_KEY};

/// 이 개수 이상의 세그먼트를 가진 경로는 매칭 전에 거부됩니다.
pub const MAX_SEGMENTS: usize = 20;

/// 경로 파라미터 (이름 -> 디코딩된 값)
pub type Params = HashMap<String, String>;

/// 라우트 해석 결과입니다.
///
/// `params`는 이름 있는 캡처가 하나도 없으면 `None`입니다.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRoute {
    pub path: String,
    pub params: Option<Params>,
}

impl ResolvedRoute {
    fn unresolved(path: &str) -> Self {
        Self {
            path: path.to_string(),
            params: None,
        }
    }
}

/// 자동 라우팅 탐색에서 동적 핸들러의 존재 여부를 확인하는 협력자
pub trait ResourceProbe: Send + Sync {
    fn exists(&self, path: &str) -> bool;
}

/// 컴파일된 패턴과 대상 템플릿의 쌍입니다. 테이블에 올라간 뒤에는 변경되지 않습니다.
#[derive(Debug)]
pub struct RouteRule {
    pub pattern: PathPattern,
    pub target: String,
    defaults: Option<Params>,
}

impl RouteRule {
    /// 빈 대상은 패턴의 리터럴 경로로 대체됩니다.
    pub fn new(pattern: &str, target: &str) -> Result<Self, RoutingError> {
        let pattern = PathPattern::parse(pattern)?;
        let target = if target.is_empty() {
            pattern.literal().to_string()
        } else {
            target.to_string()
        };
        Ok(Self {
            pattern,
            target,
            defaults: None,
        })
    }

    fn discovered(path: &str, route: &ResolvedRoute) -> Result<Self, RoutingError> {
        Ok(Self {
            pattern: PathPattern::exact(path)?,
            target: route.path.clone(),
            defaults: route.params.clone(),
        })
    }

    fn resolve(&self, path: &str) -> Option<ResolvedRoute> {
        let raw = self.pattern.raw_captures(path)?;
        let mut captures: Params = raw.iter()
            .map(|(name, value)| (name.to_string(), decode(value)))
            .collect();

        // 대상 경로에는 인코딩된 나머지를 그대로 붙이고 디코딩된 값은 파라미터에만 둠
        let rest = raw.iter().find(|(name, _)| *name == WILDCARD_KEY).map(|(_, value)| *value);
        if let Some(rest) = rest {
            let mut main = self.target.trim_end_matches('*').to_string();
            if !main.ends_with('/') {
                main.push('/');
            }
            let sub = rest.strip_prefix('/').unwrap_or(rest);
            return Some(ResolvedRoute {
                path: format!("{}{}", main, sub),
                params: Some(captures),
            });
        }

        if let Some(defaults) = &self.defaults {
            for (key, value) in defaults {
                captures.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }

        Some(ResolvedRoute {
            path: self.target.clone(),
            params: if captures.is_empty() { None } else { Some(captures) },
        })
    }
}

#[derive(Default)]
struct TableState {
    // 삽입 순서가 매칭 우선순위
    order: Vec<String>,
    rules: HashMap<String, Arc<RouteRule>>,
    // 자동 탐색 결과. 정확한 경로로만 조회하므로 순차 매칭에 참여하지 않음
    discovered: HashMap<String, Arc<RouteRule>>,
}

/// 라우팅 테이블을 관리하는 구조체입니다.
///
/// ```
/// use webgate::routing::{RoutingTable, ResourceProbe};
///
/// struct NoHandlers;
/// impl ResourceProbe for NoHandlers {
///     fn exists(&self, _path: &str) -> bool { false }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let table = RoutingTable::new();
/// table.load([("/bikes(/:id)", "/other/")]).await.unwrap();
///
/// let route = table.resolve("/bikes/33", &NoHandlers).await.unwrap();
/// assert_eq!(route.path, "/other/");
/// assert_eq!(route.params.unwrap()["id"], "33");
/// # }
/// ```
#[derive(Default)]
pub struct RoutingTable {
    state: RwLock<TableState>,
}

impl RoutingTable {
    /// 새로운 라우팅 테이블을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 규칙을 컴파일하여 테이블에 반영합니다.
    ///
    /// 같은 패턴 문자열의 기존 항목은 새 규칙으로 교체되고(순서 유지),
    /// 새 패턴은 뒤에 추가됩니다. 하나라도 컴파일에 실패하면 아무것도 반영하지 않습니다.
    pub async fn load<I, K, V>(&self, rules: I) -> Result<(), RoutingError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let compiled = rules.into_iter()
            .map(|(pattern, target)| {
                RouteRule::new(pattern.as_ref(), target.as_ref())
                    .map(|rule| (pattern.as_ref().to_string(), Arc::new(rule)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut state = self.state.write().await;
        for (source, rule) in compiled {
            debug!(pattern = %source, destination = %rule.target, "라우트 규칙 로드");
            if state.rules.insert(source.clone(), rule).is_none() {
                state.order.push(source);
            }
        }
        info!(rules = state.order.len(), "라우팅 테이블 갱신 완료");
        Ok(())
    }

    /// 현재 테이블의 패턴 문자열을 우선순위 순서로 반환합니다. 자동 탐색 결과는 포함하지 않습니다.
    pub async fn patterns(&self) -> Vec<String> {
        self.state.read().await.order.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// 자동 탐색으로 등록된 경로의 수
    pub async fn discovered_len(&self) -> usize {
        self.state.read().await.discovered.len()
    }

    /// 경로를 실제 대상 경로와 REST 파라미터로 해석합니다.
    ///
    /// 1. 삽입 순서대로 규칙을 매칭하고 첫 매칭을 사용합니다.
    /// 2. 매칭이 없으면 자동 라우팅 탐색을 시도합니다.
    /// 3. 그래도 없으면 원래 경로를 `params: None`으로 반환합니다.
    pub async fn resolve(
        &self,
        path: &str,
        probe: &dyn ResourceProbe,
    ) -> Result<ResolvedRoute, RoutingError> {
        check_depth(path)?;

        {
            let state = self.state.read().await;

            // 탐색으로 등록된 규칙은 앞선 어떤 규칙과도 매칭되지 않았던 경로이므로 바로 사용
            if let Some(rule) = state.discovered.get(path) {
                if let Some(route) = rule.resolve(path) {
                    return Ok(route);
                }
            }

            for source in &state.order {
                let Some(rule) = state.rules.get(source) else { continue };
                if let Some(route) = rule.resolve(path) {
                    debug!(path = %path, pattern = %source, destination = %route.path, "라우트 매칭");
                    return Ok(route);
                }
            }
        }

        self.discover(path, probe).await
    }

    /// 경로를 뒤에서부터 한 세그먼트씩 잘라가며 동적 핸들러를 찾습니다.
    /// 찾은 지점 이후의 세그먼트는 `p0, p1, ...` 파라미터가 됩니다.
    async fn discover(
        &self,
        path: &str,
        probe: &dyn ResourceProbe,
    ) -> Result<ResolvedRoute, RoutingError> {
        if path == "/" || has_extension(path) {
            return Ok(ResolvedRoute::unresolved(path));
        }

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        for cut in (1..=segments.len()).rev() {
            let prefix = format!("/{}", segments[..cut].join("/"));
            if !probe.exists(&prefix) {
                continue;
            }

            let params: Params = segments[cut..].iter()
                .enumerate()
                .map(|(i, segment)| {
                    (format!("p{}", i), decode(segment))
                })
                .collect();
            let route = ResolvedRoute {
                path: prefix,
                params: if params.is_empty() { None } else { Some(params) },
            };

            self.register(path, &route).await?;
            return Ok(route);
        }

        Ok(ResolvedRoute::unresolved(path))
    }

    /// 탐색 결과를 영구 규칙으로 등록합니다. 같은 경로가 이미 있으면 무시합니다.
    async fn register(&self, path: &str, route: &ResolvedRoute) -> Result<(), RoutingError> {
        let rule = Arc::new(RouteRule::discovered(path, route)?);
        let mut state = self.state.write().await;
        if state.discovered.contains_key(path) {
            return Ok(());
        }
        state.discovered.insert(path.to_string(), rule);
        info!(path = %path, destination = %route.path, "자동 라우트 등록");
        Ok(())
    }
}

fn check_depth(path: &str) -> Result<(), RoutingError> {
    let segments = path.split('/').filter(|s| !s.is_empty()).count();
    if segments >= MAX_SEGMENTS {
        warn!(path = %path, segments, "세그먼트가 너무 많은 경로 거부");
        return Err(RoutingError::TooManySegments {
            path: path.to_string(),
            segments,
            limit: MAX_SEGMENTS,
        });
    }
    Ok(())
}

/// 마지막 세그먼트에 확장자(`.`)가 있는지 확인합니다.
pub fn has_extension(path: &str) -> bool {
    path.rsplit('/')
        .next()
        .map_or(false, |last| last.contains('.'))
}

/// 다른 서버를 가리키는 절대 URL인지 확인합니다.
pub fn is_absolute_url(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_extension_checks_last_segment_only() {
        assert!(has_extension("/index.html"));
        assert!(has_extension("/a.b/style.css"));
        assert!(!has_extension("/a.b/cars"));
        assert!(!has_extension("/cars/"));
    }

    #[test]
    fn test_check_depth() {
        let ok = "/a".repeat(MAX_SEGMENTS - 1);
        let too_deep = "/a".repeat(MAX_SEGMENTS);
        assert!(check_depth(&ok).is_ok());
        assert!(matches!(
            check_depth(&too_deep),
            Err(RoutingError::TooManySegments { segments: MAX_SEGMENTS, .. })
        ));
    }

    #[test]
    fn test_wildcard_template_star_is_stripped() {
        let rule = RouteRule::new("/rest/*", "/services/*").unwrap();
        let route = rule.resolve("/rest/users/1").unwrap();
        assert_eq!(route.path, "/services/users/1");
    }

    #[test]
    fn test_wildcard_rest_stays_encoded_in_path() {
        let rule = RouteRule::new("/governance(/*)", "http://origin.test").unwrap();
        let route = rule.resolve("/governance/echo%3Fadmin=1%23top").unwrap();
        assert_eq!(route.path, "http://origin.test/echo%3Fadmin=1%23top");
        assert_eq!(route.params.unwrap()[WILDCARD_KEY], "echo?admin=1#top");

        let route = RouteRule::new("/files/*", "/docs/*").unwrap().resolve("/files/100%2525.txt").unwrap();
        assert_eq!(route.path, "/docs/100%2525.txt");
        assert_eq!(route.params.unwrap()[WILDCARD_KEY], "100%25.txt");
    }

    #[test]
    fn test_empty_target_uses_pattern_literal() {
        let rule = RouteRule::new("/cars(/:id)", "").unwrap();
        assert_eq!(rule.target, "/cars");
    }
}
