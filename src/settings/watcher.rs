//! 설정 파일의 라우트 규칙 핫 리로드

use std::path::{Path, PathBuf};
use std::sync::Arc;
use notify::event::{EventKind, ModifyKind};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::routing::RoutingTable;
use crate::settings::{Result, Settings, error::SettingsError};

/// 감시 중인 설정 파일에 일어난 일
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChange {
    Written,
    Removed,
}

impl FileChange {
    fn classify(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) | EventKind::Modify(ModifyKind::Data(_)) => Some(Self::Written),
            // 편집기가 임시 파일을 rename으로 덮어쓰는 경우
            EventKind::Modify(ModifyKind::Name(_)) | EventKind::Modify(ModifyKind::Any) => Some(Self::Written),
            EventKind::Remove(_) => Some(Self::Removed),
            _ => None,
        }
    }
}

/// 설정 파일 하나를 감시합니다.
///
/// 파일을 직접 감시하면 rename 방식 저장 후 추적이 끊기므로 상위 디렉토리를 감시하고
/// 파일 이름으로 걸러냅니다. 반환된 감시자가 drop되면 채널도 닫힙니다.
pub struct RuleFileWatcher {
    _watcher: RecommendedWatcher,
    changes: mpsc::Receiver<FileChange>,
}

impl RuleFileWatcher {
    pub fn start(file: &Path) -> Result<Self> {
        let dir = match file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let name = file.file_name().map(|n| n.to_os_string());
        let (tx, changes) = mpsc::channel(16);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    error!(error = %e, "설정 파일 감시 오류");
                    return;
                }
            };
            let Some(change) = FileChange::classify(&event.kind) else { return };
            let ours = event.paths.iter().any(|p| p.file_name() == name.as_deref());
            if ours {
                debug!(?change, "설정 파일 변경 감지");
                // 이미 대기 중인 변경이 있으면 한 번의 리로드로 충분
                let _ = tx.try_send(change);
            }
        })
        .map_err(|e| SettingsError::WatchError(e.to_string()))?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| SettingsError::WatchError(e.to_string()))?;

        Ok(Self { _watcher: watcher, changes })
    }

    pub async fn next_change(&mut self) -> Option<FileChange> {
        self.changes.recv().await
    }
}

/// 설정 파일의 라우트 규칙을 다시 읽어 테이블에 반영합니다.
///
/// 같은 패턴은 교체되고 새 패턴은 추가됩니다. 반영된 규칙 수를 반환합니다.
pub async fn reload_rules(path: &Path, table: &RoutingTable) -> Result<usize> {
    let settings = Settings::from_toml_file(path).await?;
    let rules = settings.router.rules();
    table.load(rules.iter().map(|(p, t)| (p.as_str(), t.as_str())))
        .await
        .map_err(|e| SettingsError::InvalidConfig(e.to_string()))?;
    Ok(rules.len())
}

/// 설정 파일이 바뀔 때마다 라우트 규칙을 다시 로드하는 태스크를 시작합니다.
pub fn spawn_rule_reloader(path: PathBuf, table: Arc<RoutingTable>) -> Result<JoinHandle<()>> {
    let mut watcher = RuleFileWatcher::start(&path)?;
    info!(file = %path.display(), "라우트 규칙 감시 시작");

    Ok(tokio::spawn(async move {
        while let Some(change) = watcher.next_change().await {
            if change == FileChange::Removed {
                warn!(file = %path.display(), "설정 파일 삭제됨, 기존 규칙 유지");
                continue;
            }
            match reload_rules(&path, &table).await {
                Ok(count) => info!(rules = count, "라우트 규칙 다시 로드"),
                Err(e) => error!(error = %e, "라우트 규칙 다시 로드 실패"),
            }
        }
    }))
}
