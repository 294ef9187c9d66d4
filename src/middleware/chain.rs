use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::{Middleware, MiddlewareError, Plugin};
use crate::context::RequestContext;

/// 연속 전달 체인의 실행 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainOutcome {
    /// 모든 미들웨어가 `next`를 호출하여 끝까지 도달함
    Completed,
    /// 어떤 미들웨어가 `next`를 호출하지 않음
    Halted,
}

/// 다음 미들웨어로 진행하는 커서
pub struct Next<'a> {
    rest: &'a [Arc<dyn Middleware>],
    completed: &'a AtomicBool,
}

impl<'a> Next<'a> {
    /// 남은 첫 번째 미들웨어를 실행합니다. 남은 것이 없으면 아무것도 하지 않습니다.
    pub async fn run(self, ctx: &mut RequestContext) -> Result<(), MiddlewareError> {
        match self.rest.split_first() {
            Some((current, rest)) => {
                debug!(middleware = current.name(), "미들웨어 실행");
                let next = Next {
                    rest,
                    completed: self.completed,
                };
                current.handle(ctx, next).await
            }
            None => {
                self.completed.store(true, Ordering::Release);
                Ok(())
            }
        }
    }
}

#[derive(Default, Clone)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<M: Middleware + 'static>(&mut self, middleware: M) {
        self.middlewares.push(Arc::new(middleware));
    }

    pub fn add_arc(&mut self, middleware: Arc<dyn Middleware>) {
        self.middlewares.push(middleware);
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// 체인을 처음부터 실행합니다. 에러는 즉시 체인을 중단하고 호출자에게 전파됩니다.
    pub async fn execute(&self, ctx: &mut RequestContext) -> Result<ChainOutcome, MiddlewareError> {
        let completed = AtomicBool::new(false);
        Next {
            rest: &self.middlewares,
            completed: &completed,
        }
        .run(ctx)
        .await?;

        if completed.load(Ordering::Acquire) {
            Ok(ChainOutcome::Completed)
        } else {
            debug!("미들웨어 체인 중단됨");
            Ok(ChainOutcome::Halted)
        }
    }
}

/// before/after 플러그인 목록
///
/// 플러그인은 등록 순서대로 하나씩 완료될 때까지 기다린 뒤 다음을 실행합니다.
#[derive(Default, Clone)]
pub struct PluginChain {
    before: Vec<Arc<dyn Plugin>>,
    after: Vec<Arc<dyn Plugin>>,
}

impl PluginChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_before<P: Plugin + 'static>(&mut self, plugin: P) {
        self.before.push(Arc::new(plugin));
    }

    pub fn add_after<P: Plugin + 'static>(&mut self, plugin: P) {
        self.after.push(Arc::new(plugin));
    }

    pub async fn execute_before(&self, ctx: &mut RequestContext) -> Result<(), MiddlewareError> {
        run_sequential(&self.before, ctx, "before").await
    }

    pub async fn execute_after(&self, ctx: &mut RequestContext) -> Result<(), MiddlewareError> {
        run_sequential(&self.after, ctx, "after").await
    }
}

async fn run_sequential(
    plugins: &[Arc<dyn Plugin>],
    ctx: &mut RequestContext,
    stage: &str,
) -> Result<(), MiddlewareError> {
    for plugin in plugins {
        // 앞선 플러그인이 응답을 끝냈으면 나머지는 건너뜀
        if ctx.response.ended {
            debug!(stage, plugin = plugin.name(), "응답 종료로 플러그인 건너뜀");
            break;
        }
        debug!(stage, plugin = plugin.name(), "플러그인 실행");
        plugin.run(ctx).await?;
    }
    Ok(())
}
