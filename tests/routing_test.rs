use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use webgate::routing::*;

// 테스트용 핸들러 존재 확인기. 호출 횟수를 센다.
struct CountingProbe {
    handlers: HashSet<&'static str>,
    calls: AtomicUsize,
}

impl CountingProbe {
    fn new(handlers: &[&'static str]) -> Self {
        Self {
            handlers: handlers.iter().copied().collect(),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ResourceProbe for CountingProbe {
    fn exists(&self, path: &str) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.handlers.contains(path)
    }
}

fn params(pairs: &[(&str, &str)]) -> Params {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

#[tokio::test]
async fn test_root_rule_has_null_params() {
    let table = RoutingTable::new();
    table.load([("/", "/index.html")]).await.unwrap();

    let route = table.resolve("/", &CountingProbe::new(&[])).await.unwrap();
    assert_eq!(route, ResolvedRoute { path: "/index.html".to_string(), params: None });
}

#[tokio::test]
async fn test_literal_path_has_null_params() {
    let table = RoutingTable::new();
    table.load([("/about", "/about.html"), ("/cars(/:id)", "/cars")]).await.unwrap();
    let probe = CountingProbe::new(&[]);

    assert_eq!(table.resolve("/about", &probe).await.unwrap().params, None);
    // 선택 그룹이 비어 있으면 캡처도 없음
    assert_eq!(table.resolve("/cars", &probe).await.unwrap().params, None);
}

#[tokio::test]
async fn test_named_param() {
    let table = RoutingTable::new();
    table.load([("/bikes(/:id)", "/other/")]).await.unwrap();

    let route = table.resolve("/bikes/33", &CountingProbe::new(&[])).await.unwrap();
    assert_eq!(route.path, "/other/");
    assert_eq!(route.params, Some(params(&[("id", "33")])));
}

#[tokio::test]
async fn test_dotted_param_is_captured_whole() {
    let table = RoutingTable::new();
    table.load([
        ("/hosts/:ip", "/hosts"),
        ("/settings/:key", "/settings"),
    ]).await.unwrap();
    let probe = CountingProbe::new(&[]);

    let route = table.resolve("/hosts/17.223.37.12", &probe).await.unwrap();
    assert_eq!(route.params, Some(params(&[("ip", "17.223.37.12")])));

    let route = table.resolve("/settings/database.user", &probe).await.unwrap();
    assert_eq!(route.params, Some(params(&[("key", "database.user")])));
}

#[tokio::test]
async fn test_wildcard_to_absolute_origin() {
    let table = RoutingTable::new();
    table.load([("/governance(/*)", "http://example.com")]).await.unwrap();

    let route = table.resolve("/governance/car/test/", &CountingProbe::new(&[])).await.unwrap();
    assert_eq!(route.path, "http://example.com/car/test/");
    assert_eq!(route.params, Some(params(&[("_", "car/test/")])));
}

#[tokio::test]
async fn test_matching_is_anchored() {
    let table = RoutingTable::new();
    table.load([("/cars", "/vehicles")]).await.unwrap();
    let probe = CountingProbe::new(&[]);

    assert_eq!(table.resolve("/cars/extra.html", &probe).await.unwrap().path, "/cars/extra.html");
    assert_eq!(table.resolve("/my/cars", &probe).await.unwrap().path, "/my/cars");
}

#[tokio::test]
async fn test_first_rule_in_insertion_order_wins() {
    let table = RoutingTable::new();
    table.load([("/a/:id", "/first"), ("/a/*", "/second")]).await.unwrap();

    let route = table.resolve("/a/1", &CountingProbe::new(&[])).await.unwrap();
    assert_eq!(route.path, "/first");
}

#[tokio::test]
async fn test_reload_replaces_same_pattern_and_appends_new() {
    let table = RoutingTable::new();
    table.load([("/a", "/one"), ("/b", "/two")]).await.unwrap();
    table.load([("/b", "/three"), ("/c", "/four")]).await.unwrap();

    assert_eq!(table.patterns().await, vec!["/a", "/b", "/c"]);
    let route = table.resolve("/b", &CountingProbe::new(&[])).await.unwrap();
    assert_eq!(route.path, "/three");
}

#[tokio::test]
async fn test_invalid_rule_leaves_table_untouched() {
    let table = RoutingTable::new();
    table.load([("/a", "/one")]).await.unwrap();

    let result = table.load([("/b", "/two"), ("broken", "/x")]).await;
    assert!(matches!(result, Err(RoutingError::InvalidPathPattern { .. })));
    assert_eq!(table.patterns().await, vec!["/a"]);
}

#[tokio::test]
async fn test_too_many_segments_rejected_before_matching() {
    let table = RoutingTable::new();
    table.load([("/*", "/catch")]).await.unwrap();
    let probe = CountingProbe::new(&[]);

    let deep = "/x".repeat(MAX_SEGMENTS);
    let result = table.resolve(&deep, &probe).await;
    assert!(matches!(result, Err(RoutingError::TooManySegments { .. })));
    assert_eq!(probe.calls(), 0);

    let shallow = "/x".repeat(MAX_SEGMENTS - 1);
    assert!(table.resolve(&shallow, &probe).await.is_ok());
}

#[tokio::test]
async fn test_discovery_assigns_positional_params() {
    let table = RoutingTable::new();
    let probe = CountingProbe::new(&["/api/users"]);

    let route = table.resolve("/api/users/7/posts", &probe).await.unwrap();
    assert_eq!(route.path, "/api/users");
    assert_eq!(route.params, Some(params(&[("p0", "7"), ("p1", "posts")])));
}

#[tokio::test]
async fn test_discovery_is_idempotent_and_memoized() {
    let table = Arc::new(RoutingTable::new());
    let probe = CountingProbe::new(&["/shop"]);

    let first = table.resolve("/shop/42", &probe).await.unwrap();
    let probes_after_first = probe.calls();
    assert!(probes_after_first > 0);

    let second = table.resolve("/shop/42", &probe).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(probe.calls(), probes_after_first, "두 번째 해석은 탐색을 다시 하지 않아야 함");
    assert_eq!(table.discovered_len().await, 1);
}

#[tokio::test]
async fn test_discovered_paths_stay_out_of_ordered_rules() {
    let table = RoutingTable::new();
    table.load([("/bikes(/:id)", "/other/")]).await.unwrap();
    let probe = CountingProbe::new(&["/cars"]);

    for id in 0..50 {
        let route = table.resolve(&format!("/cars/{}", id), &probe).await.unwrap();
        assert_eq!(route.path, "/cars");
    }

    assert_eq!(table.patterns().await, vec!["/bikes(/:id)"]);
    assert_eq!(table.len().await, 1);
    assert_eq!(table.discovered_len().await, 50);

    // 탐색 결과는 이후에 로드된 규칙의 순서에 영향을 주지 않음
    table.load([("/trucks", "/t.html")]).await.unwrap();
    assert_eq!(table.patterns().await, vec!["/bikes(/:id)", "/trucks"]);
    let route = table.resolve("/cars/7", &probe).await.unwrap();
    assert_eq!(route.params, Some(params(&[("p0", "7")])));
}

#[tokio::test]
async fn test_undiscoverable_path_is_returned_unresolved() {
    let table = RoutingTable::new();
    let probe = CountingProbe::new(&[]);

    let route = table.resolve("/nowhere/at/all", &probe).await.unwrap();
    assert_eq!(route, ResolvedRoute { path: "/nowhere/at/all".to_string(), params: None });
    assert!(table.is_empty().await);

    // 확장자가 있으면 탐색하지 않음
    let before = probe.calls();
    table.resolve("/style.css", &probe).await.unwrap();
    assert_eq!(probe.calls(), before);
}
