use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::context::RequestContext;
use crate::middleware::{Middleware, MiddlewareError, Next};

/// 차단 목록 전체가 초기화되는 주기
pub const CLEAR_WINDOW: Duration = Duration::from_secs(10 * 60);

struct BlacklistState {
    clients: HashSet<String>,
    last_cleared: Instant,
}

/// 차단된 클라이언트 목록
///
/// 항목별 만료 없이, 마지막 초기화 이후 `CLEAR_WINDOW`가 지나면 목록 전체를 비웁니다.
pub struct Blacklist {
    state: RwLock<BlacklistState>,
}

impl Blacklist {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(BlacklistState {
                clients: HashSet::new(),
                last_cleared: Instant::now(),
            }),
        }
    }

    /// 요청한 클라이언트를 차단 목록에 추가하고 연결을 끊습니다.
    pub async fn block(&self, ctx: &mut RequestContext) {
        let client = ctx.client_id();
        warn!(request_id = %ctx.request_id, client = %client, "클라이언트 차단");
        self.state.write().await.clients.insert(client);
        ctx.close();
    }

    /// 클라이언트가 차단되었는지 확인합니다.
    ///
    /// 초기화 주기가 지났으면 먼저 목록 전체를 비웁니다.
    pub async fn is_blocked(&self, client: &str) -> bool {
        let mut state = self.state.write().await;
        if state.last_cleared.elapsed() > CLEAR_WINDOW {
            if !state.clients.is_empty() {
                info!(cleared = state.clients.len(), "차단 목록 초기화");
            }
            state.clients.clear();
            state.last_cleared = Instant::now();
        }
        state.clients.contains(client)
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.clients.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for Blacklist {
    fn default() -> Self {
        Self::new()
    }
}

/// 차단된 클라이언트의 요청을 응답 없이 끊는 미들웨어
pub struct ProtectMiddleware {
    blacklist: Arc<Blacklist>,
}

impl ProtectMiddleware {
    pub fn new(blacklist: Arc<Blacklist>) -> Self {
        Self { blacklist }
    }
}

#[async_trait]
impl Middleware for ProtectMiddleware {
    fn name(&self) -> &str {
        "protect"
    }

    async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<(), MiddlewareError> {
        let client = ctx.client_id();
        if self.blacklist.is_blocked(&client).await {
            warn!(request_id = %ctx.request_id, client = %client, "차단된 클라이언트 요청 거부");
            ctx.close();
            return Ok(());
        }
        next.run(ctx).await
    }
}
