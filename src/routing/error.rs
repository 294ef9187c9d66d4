use std::fmt;

/// 라우팅 관련 에러를 표현하는 열거형입니다.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutingError {
    /// 세그먼트가 너무 많은 경로 (매칭 전에 거부됨)
    TooManySegments {
        path: String,
        segments: usize,
        limit: usize,
    },
    /// 잘못된 경로 패턴
    InvalidPathPattern {
        pattern: String,
        reason: String,
    },
}

impl fmt::Display for RoutingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingError::TooManySegments { path, segments, limit } =>
                write!(f, "경로 세그먼트 초과 {}: {}개 (최대 {}개 미만)", path, segments, limit),
            RoutingError::InvalidPathPattern { pattern, reason } =>
                write!(f, "잘못된 경로 패턴: {} ({})", pattern, reason),
        }
    }
}

impl std::error::Error for RoutingError {}
