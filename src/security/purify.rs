use std::net::SocketAddr;
use hyper::{HeaderMap, StatusCode};

/// 로그에 남기면 안 되는 헤더 목록
const CRITICAL_HEADERS: [&str; 5] = [
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
];

/// 에러가 스스로 전달하는 HTTP 상태 코드 힌트
///
/// 정수로 해석 가능한 값을 가진 에러만 `Some`을 반환합니다.
pub trait StatusHint {
    fn status_hint(&self) -> Option<u16>;
}

impl StatusHint for str {
    fn status_hint(&self) -> Option<u16> {
        self.trim().parse().ok()
    }
}

impl StatusHint for String {
    fn status_hint(&self) -> Option<u16> {
        self.as_str().status_hint()
    }
}

impl StatusHint for u16 {
    fn status_hint(&self) -> Option<u16> {
        Some(*self)
    }
}

/// 클라이언트에게 보여줘도 안전한 에러 정보
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Purified {
    pub status: StatusCode,
    /// 상태 코드의 표준 사유 문구
    pub message: &'static str,
}

impl Purified {
    pub fn from_status(status: StatusCode) -> Self {
        Self {
            status,
            message: status.canonical_reason().unwrap_or("Unknown Error"),
        }
    }
}

/// 임의의 실패를 안전한 상태 코드와 사유 문구로 변환합니다.
///
/// 우선순위:
/// 1. 핸들러가 이미 설정한 400 이상의 응답 상태
/// 2. 에러가 전달하는 400~599 범위의 정수
/// 3. 500
///
/// 원래 에러 메시지는 결과에 절대 포함되지 않습니다.
pub fn purify<E>(error: &E, response_status: Option<StatusCode>) -> Purified
where
    E: StatusHint + ?Sized,
{
    if let Some(status) = response_status.filter(|s| s.as_u16() >= 400) {
        return Purified::from_status(status);
    }

    let status = error.status_hint()
        .filter(|code| (400..=599).contains(code))
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    Purified::from_status(status)
}

/// 요청 로그에서 제외해야 하는 헤더인지 확인합니다.
pub fn is_critical_header(name: &str) -> bool {
    CRITICAL_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// 클라이언트 식별자를 계산합니다.
///
/// `X-Forwarded-For`의 첫 번째 주소를 우선하고, 없으면 연결의 피어 주소를 사용합니다.
pub fn client_id(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers.get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    #[test]
    fn test_handler_status_wins() {
        let purified = purify("database password is hunter2", Some(StatusCode::NOT_FOUND));
        assert_eq!(purified.status, StatusCode::NOT_FOUND);
        assert_eq!(purified.message, "Not Found");
    }

    #[test]
    fn test_success_status_is_ignored() {
        let purified = purify("403", Some(StatusCode::OK));
        assert_eq!(purified.status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_integer_hint_outside_error_range_defaults_to_500() {
        assert_eq!(purify("200", None).status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(purify("/etc/passwd", None).status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(purify(&701u16, None).status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_message_is_reason_phrase_only() {
        let purified = purify("ENOENT: /srv/app/secret.rs", None);
        assert_eq!(purified.message, "Internal Server Error");
    }

    #[test]
    fn test_critical_headers() {
        assert!(is_critical_header("Authorization"));
        assert!(is_critical_header("cookie"));
        assert!(!is_critical_header("content-type"));
    }

    #[test]
    fn test_client_id_prefers_forwarded_for() {
        let peer: SocketAddr = "10.0.0.9:5123".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_id(&headers, Some(peer)), "10.0.0.9");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_id(&headers, Some(peer)), "203.0.113.7");
        assert_eq!(client_id(&HeaderMap::new(), None), "unknown");
    }
}
