use std::future::Future;
use std::path::Path;
use std::time::Instant;
use hyper::StatusCode;
use tracing::{error, info, span, warn, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::context::RequestContext;
use crate::security::is_critical_header;
use crate::settings::{LogFormat, LogOutput, LogSettings};

/// 요청 로그에 남길 필요가 없는 헤더
const NOISE_HEADERS: [&str; 3] = ["accept", "accept-language", "accept-encoding"];

/// `critical` 레벨 로그. `error` 레벨에 `critical = true` 필드를 붙여 기록합니다.
#[macro_export]
macro_rules! critical {
    ($($arg:tt)+) => {
        ::tracing::error!(critical = true, $($arg)+)
    };
}

/// 로깅을 초기화합니다.
///
/// 파일 출력일 때 반환되는 가드는 프로세스가 끝날 때까지 유지해야 합니다.
/// `LogOutput::Null`이면 아무 구독자도 설치하지 않습니다.
pub fn init_logging(settings: &LogSettings) -> Option<WorkerGuard> {
    let (writer, guard) = match &settings.output {
        LogOutput::Null => return None,
        LogOutput::Stdout => (BoxMakeWriter::new(std::io::stdout), None),
        LogOutput::File(path) => {
            let path = Path::new(path);
            let directory = path.parent().unwrap_or_else(|| Path::new("."));
            let file_name = path.file_name()
                .map(|name| name.to_os_string())
                .unwrap_or_else(|| "webgate.log".into());
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
    };

    let mut filter = EnvFilter::from_default_env()
        .add_directive(LevelFilter::from_level(settings.level).into());
    if let Ok(directive) = format!("webgate={}", settings.level.as_str().to_lowercase()).parse() {
        filter = filter.add_directive(directive);
    }

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_writer(writer)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let result = match settings.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    if let Err(e) = result {
        eprintln!("로깅 초기화 실패: {}", e);
    }

    install_panic_hook();
    guard
}

tokio::task_local! {
    static IN_REQUEST: ();
}

/// 요청 처리 구간을 표시합니다. 이 구간의 패닉은 디스패처가 복구합니다.
pub async fn within_request<F: Future>(future: F) -> F::Output {
    IN_REQUEST.scope((), future).await
}

/// 현재 태스크가 요청을 처리하는 중인지 확인합니다.
pub fn in_request() -> bool {
    IN_REQUEST.try_with(|_| ()).is_ok()
}

/// 예기치 않은 패닉을 기록합니다. 프로세스는 계속 실행됩니다.
///
/// 요청 밖의 패닉만 critical입니다. 요청 안의 패닉은 에러 복구가 500으로 처리합니다.
fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let location = info.location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_default();
        if in_request() {
            error!(location = %location, panic = %info, "요청 처리 중 패닉");
        } else {
            critical!(location = %location, panic = %info, "처리되지 않은 패닉");
        }
    }));
}

/// 요청 하나의 접근 로그
#[derive(Debug)]
pub struct RequestLog {
    pub request_id: String,
    pub method: String,
    pub path: String,
    pub client: String,
    pub headers: Vec<(String, String)>,
    pub status_code: Option<u16>,
    pub target: Option<String>,
    pub error: Option<String>,
    started: Instant,
}

impl RequestLog {
    /// 구독자가 요청 로그를 받지 않으면 `None`을 반환합니다.
    pub fn start(ctx: &RequestContext) -> Option<Self> {
        if !tracing::enabled!(Level::INFO) {
            return None;
        }

        let headers = ctx.headers.iter()
            .filter(|(name, _)| {
                !is_critical_header(name.as_str()) && !NOISE_HEADERS.contains(&name.as_str())
            })
            .map(|(name, value)| {
                (name.to_string(), value.to_str().unwrap_or("<binary>").to_string())
            })
            .collect();

        Some(Self {
            request_id: ctx.request_id.clone(),
            method: ctx.method.to_string(),
            path: ctx.path().to_string(),
            client: ctx.client_id(),
            headers,
            status_code: None,
            target: None,
            error: None,
            started: Instant::now(),
        })
    }

    pub fn with_target(&mut self, target: Option<&str>) {
        self.target = target.map(str::to_string);
    }

    pub fn with_response(&mut self, status: StatusCode) {
        self.status_code = Some(status.as_u16());
    }

    pub fn with_error(&mut self, error: impl std::fmt::Display) {
        self.error = Some(error.to_string());
    }

    /// 처리 시간을 계산하여 로그를 남깁니다.
    pub fn finish(self) {
        let duration_ms = self.started.elapsed().as_millis() as u64;
        log_request(&self, duration_ms);
    }
}

/// 응답 상태로 접근 로그 레벨을 정합니다. 응답 없이 끊긴 연결은 WARN입니다.
fn level_for(status: Option<u16>) -> Level {
    match status {
        Some(code) if code >= 500 => Level::ERROR,
        Some(code) if code >= 400 => Level::WARN,
        None => Level::WARN,
        Some(_) => Level::INFO,
    }
}

fn log_request(log: &RequestLog, duration_ms: u64) {
    let level = level_for(log.status_code);

    let span = span!(
        Level::INFO,
        "request",
        request_id = %log.request_id,
        method = %log.method,
        path = %log.path,
        client = %log.client,
        duration_ms = duration_ms
    );
    let _enter = span.enter();

    match level {
        Level::ERROR => error!(
            status = ?log.status_code,
            resource = ?log.target,
            error = ?log.error,
            "요청 처리 실패"
        ),
        Level::WARN if log.status_code.is_none() => warn!(
            resource = ?log.target,
            error = ?log.error,
            "응답 없이 연결 종료"
        ),
        Level::WARN => warn!(
            status = ?log.status_code,
            resource = ?log.target,
            error = ?log.error,
            headers = ?log.headers,
            "요청 완료 (에러 응답)"
        ),
        _ => info!(
            status = ?log.status_code,
            resource = ?log.target,
            headers = ?log.headers,
            "요청 완료"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_follows_status() {
        assert_eq!(level_for(Some(200)), Level::INFO);
        assert_eq!(level_for(Some(301)), Level::INFO);
        assert_eq!(level_for(Some(404)), Level::WARN);
        assert_eq!(level_for(Some(405)), Level::WARN);
        assert_eq!(level_for(Some(500)), Level::ERROR);
        assert_eq!(level_for(None), Level::WARN);
    }

    #[tokio::test]
    async fn test_request_scope() {
        assert!(!in_request());
        assert!(within_request(async { in_request() }).await);
        assert!(!in_request());
    }
}
