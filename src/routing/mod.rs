//! 경로 패턴 기반 라우팅을 위한 핵심 기능을 제공하는 모듈입니다.
//!
//! 설정된 규칙을 삽입 순서대로 매칭하고, 매칭이 없으면 동적 핸들러
//! 계층을 따라 자동 라우팅을 탐색합니다.

mod error;
mod pattern;
mod table;

pub use error::RoutingError;
pub use pattern::{PathPattern, WILDCARD_KEY};
pub use table::{
    has_extension, is_absolute_url, Params, ResolvedRoute, ResourceProbe, RouteRule,
    RoutingTable, MAX_SEGMENTS,
};
