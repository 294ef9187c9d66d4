use std::collections::HashMap;
use async_trait::async_trait;
use hyper::header::{HeaderName, HeaderValue};
use hyper::HeaderMap;
use serde::Deserialize;

use super::{MiddlewareError, Plugin};
use crate::context::RequestContext;

/// 응답 헤더 수정 설정
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct HeaderModification {
    /// 추가할 헤더 (기존 값 유지)
    #[serde(default)]
    pub add: HashMap<String, String>,

    /// 삭제할 헤더
    #[serde(default)]
    pub remove: Vec<String>,

    /// 덮어쓸 헤더
    #[serde(default)]
    pub set: HashMap<String, String>,
}

impl HeaderModification {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty() && self.set.is_empty()
    }
}

/// 동적/프록시 응답의 헤더를 수정하는 after 플러그인
#[derive(Debug)]
pub struct HeadersPlugin {
    add: Vec<(HeaderName, HeaderValue)>,
    remove: Vec<HeaderName>,
    set: Vec<(HeaderName, HeaderValue)>,
}

impl HeadersPlugin {
    /// 헤더 이름과 값을 미리 검증합니다.
    pub fn new(config: &HeaderModification) -> Result<Self, MiddlewareError> {
        Ok(Self {
            add: parse_pairs(&config.add)?,
            remove: config.remove.iter()
                .map(|name| parse_name(name))
                .collect::<Result<_, _>>()?,
            set: parse_pairs(&config.set)?,
        })
    }

    fn apply(&self, headers: &mut HeaderMap) {
        for name in &self.remove {
            headers.remove(name);
        }
        for (name, value) in &self.set {
            headers.insert(name.clone(), value.clone());
        }
        for (name, value) in &self.add {
            headers.append(name.clone(), value.clone());
        }
    }
}

#[async_trait]
impl Plugin for HeadersPlugin {
    fn name(&self) -> &str {
        "headers"
    }

    async fn run(&self, ctx: &mut RequestContext) -> Result<(), MiddlewareError> {
        self.apply(&mut ctx.response.headers);
        Ok(())
    }
}

fn parse_name(name: &str) -> Result<HeaderName, MiddlewareError> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| MiddlewareError::Config(format!("잘못된 헤더 이름 {}: {}", name, e)))
}

fn parse_pairs(map: &HashMap<String, String>) -> Result<Vec<(HeaderName, HeaderValue)>, MiddlewareError> {
    map.iter()
        .map(|(name, value)| {
            let value = HeaderValue::from_str(value)
                .map_err(|e| MiddlewareError::Config(format!("잘못된 헤더 값 {}: {}", name, e)))?;
            Ok((parse_name(name)?, value))
        })
        .collect()
}
