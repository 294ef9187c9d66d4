use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::Handler;
use crate::routing::ResourceProbe;

/// 정규화된 리소스 경로 -> 핸들러
///
/// 시작 시 한 번 구성되고 이후에는 읽기 전용으로 공유됩니다.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Handler + 'static,
    {
        self.register_arc(path, Arc::new(handler))
    }

    pub fn register_arc(&mut self, path: &str, handler: Arc<dyn Handler>) -> &mut Self {
        let path = normalize(path);
        debug!(path = %path, "동적 핸들러 등록");
        self.handlers.insert(path, handler);
        self
    }

    pub fn get(&self, path: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(&normalize(path)).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.handlers.contains_key(&normalize(path))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl ResourceProbe for HandlerRegistry {
    fn exists(&self, path: &str) -> bool {
        self.contains(path)
    }
}

/// 선행 '/'를 보장하고 끝의 '/'는 제거합니다 (루트 제외).
fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
