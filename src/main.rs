use std::env;
use std::sync::Arc;
use tracing::{error, info, warn};

use webgate::dispatch::Dispatcher;
use webgate::handler::HandlerRegistry;
use webgate::logging::init_logging;
use webgate::routing::RoutingTable;
use webgate::server::{ConnectionHandler, ServerListener};
use webgate::settings::{self, Settings};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = match Settings::load().await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("설정 로드 실패: {}", e);
            std::process::exit(1);
        }
    };

    // 파일 로그의 버퍼는 가드가 살아 있는 동안 기록됨
    let _guard = init_logging(&settings.logging);

    let router = Arc::new(RoutingTable::new());
    router.load(settings.router.rules()).await?;

    let handlers = HandlerRegistry::new();
    if handlers.is_empty() {
        warn!("등록된 동적 핸들러가 없습니다. 정적 파일과 프록시 규칙만 처리합니다");
    }

    let dispatcher = Dispatcher::builder(&settings.router)
        .router(router.clone())
        .handlers(handlers)
        .build()?;

    let watch = env::var("WEBGATE_WATCH_CONFIG").map_or(false, |v| v == "true");
    if watch {
        match Settings::config_path() {
            Some(path) => {
                if let Err(e) = settings::watcher::spawn_rule_reloader(path, router.clone()) {
                    error!(error = %e, "라우트 규칙 감시 시작 실패");
                }
            }
            None => warn!("WEBGATE_WATCH_CONFIG가 설정되었지만 {}가 없습니다", settings::CONFIG_FILE_ENV),
        }
    }

    let listener = ServerListener::new(&settings.server).await?;
    info!(
        http_port = settings.server.http_port,
        https = settings.server.https_enabled,
        rules = router.len().await,
        "webgate 시작"
    );

    listener.run(ConnectionHandler::new(Arc::new(dispatcher))).await?;
    Ok(())
}
