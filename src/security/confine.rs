use std::path::{Path, PathBuf};
use percent_encoding::percent_decode_str;
use tracing::warn;

/// 격리 위반 시 원래 경로 대신 사용되는 논리 페이지
pub const NOT_FOUND_PAGE: &str = "/404.html";

/// 요청 경로가 정적 루트 또는 동적 루트 밖으로 나가지 못하게 막습니다.
///
/// `..` 를 이용한 상위 이동은 문자열 단계에서, 심볼릭 링크를 통한 탈출은
/// 실제 경로(canonicalize) 단계에서 검사합니다.
#[derive(Debug, Clone)]
pub struct PathConfinement {
    roots: Vec<PathBuf>,
    follow_symlinks: bool,
}

impl PathConfinement {
    pub fn new(
        static_root: impl Into<PathBuf>,
        dynamic_root: impl Into<PathBuf>,
        follow_symlinks: bool,
    ) -> Self {
        Self {
            roots: vec![static_root.into(), dynamic_root.into()],
            follow_symlinks,
        }
    }

    /// 안전한 경로는 정규화하여 반환하고, 위반이면 `NOT_FOUND_PAGE`를 반환합니다.
    pub async fn confine(&self, requested: &str) -> String {
        let Some(normalized) = normalize(requested) else {
            warn!(path = %requested, "루트 밖으로 향하는 경로 차단");
            return NOT_FOUND_PAGE.to_string();
        };

        if !self.follow_symlinks {
            let relative = decode(normalized.trim_start_matches('/'));
            for root in &self.roots {
                if escapes(root, &relative).await {
                    warn!(path = %requested, root = %root.display(), "심볼릭 링크를 통한 루트 탈출 차단");
                    return NOT_FOUND_PAGE.to_string();
                }
            }
        }

        normalized
    }
}

/// 루트 아래의 실제 파일(또는 `.html` 대체 파일)이 루트 밖을 가리키는지 확인합니다.
async fn escapes(root: &Path, relative: &str) -> bool {
    let Ok(real_root) = tokio::fs::canonicalize(root).await else {
        return false;
    };

    let candidates = [
        root.join(relative),
        root.join(format!("{}.html", relative.trim_end_matches('/'))),
    ];
    for candidate in candidates {
        if let Ok(real) = tokio::fs::canonicalize(&candidate).await {
            if !real.starts_with(&real_root) {
                return true;
            }
        }
    }
    false
}

/// `.`과 빈 세그먼트를 제거하고 `..`을 해석합니다. 루트 위로 올라가면 `None`.
///
/// 세그먼트는 인코딩된 그대로 유지하되, 판단은 디코딩된 값으로 합니다.
fn normalize(requested: &str) -> Option<String> {
    let mut stack: Vec<&str> = Vec::new();
    for segment in requested.split('/') {
        let decoded = decode(segment);
        if decoded.contains('\0') || decoded.contains('/') || decoded.contains('\\') {
            return None;
        }
        match decoded.as_str() {
            "" | "." => {}
            ".." => {
                stack.pop()?;
            }
            _ => stack.push(segment),
        }
    }

    let mut normalized = format!("/{}", stack.join("/"));
    if requested.ends_with('/') && !stack.is_empty() {
        normalized.push('/');
    }
    Some(normalized)
}

fn decode(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}
