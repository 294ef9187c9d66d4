use async_trait::async_trait;

use super::{MiddlewareError, Next};
use crate::context::RequestContext;

/// 순차 목록 방식의 요청 처리 함수
///
/// 앞선 플러그인이 응답을 종료하면 뒤의 플러그인은 실행되지 않습니다.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// 플러그인의 고유 이름을 반환합니다.
    fn name(&self) -> &str;

    async fn run(&self, ctx: &mut RequestContext) -> Result<(), MiddlewareError>;
}

/// 연속 전달 방식의 미들웨어
///
/// `next.run(ctx)`를 호출하면 다음 미들웨어로 진행하고, 호출하지 않으면 체인이 멈춥니다.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// 미들웨어의 고유 이름을 반환합니다.
    fn name(&self) -> &str;

    async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<(), MiddlewareError>;
}
