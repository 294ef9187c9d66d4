//! 동적 핸들러 계약과 레지스트리
//!
//! 핸들러는 HTTP 메서드별 함수(`get`, `post`, `put`, `delete`, `patch`)를 구현하며,
//! 구현하지 않은 메서드는 "허용되지 않은 메서드"로 처리됩니다.

mod error;
mod output;
mod registry;

pub use error::HandlerError;
pub use output::{ByteStream, HandlerOutput};
pub use registry::HandlerRegistry;

use async_trait::async_trait;
use hyper::Method;

use crate::context::RequestContext;
use crate::routing::Params;

pub type HandlerResult = Result<HandlerOutput, HandlerError>;

/// 라우팅 가능한 경로에 등록되는 동적 리소스
///
/// 각 메서드는 컨텍스트를 통해 응답 상태와 헤더를 직접 수정할 수 있습니다.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn get(&self, _ctx: &mut RequestContext, _params: Option<&Params>) -> HandlerResult {
        Err(HandlerError::NotImplemented)
    }

    async fn post(&self, _ctx: &mut RequestContext, _params: Option<&Params>) -> HandlerResult {
        Err(HandlerError::NotImplemented)
    }

    async fn put(&self, _ctx: &mut RequestContext, _params: Option<&Params>) -> HandlerResult {
        Err(HandlerError::NotImplemented)
    }

    async fn delete(&self, _ctx: &mut RequestContext, _params: Option<&Params>) -> HandlerResult {
        Err(HandlerError::NotImplemented)
    }

    async fn patch(&self, _ctx: &mut RequestContext, _params: Option<&Params>) -> HandlerResult {
        Err(HandlerError::NotImplemented)
    }
}

/// HTTP 메서드에 맞는 핸들러 함수를 호출합니다.
pub async fn invoke(
    handler: &dyn Handler,
    method: &Method,
    ctx: &mut RequestContext,
    params: Option<&Params>,
) -> HandlerResult {
    match *method {
        Method::GET => handler.get(ctx, params).await,
        Method::POST => handler.post(ctx, params).await,
        Method::PUT => handler.put(ctx, params).await,
        Method::DELETE => handler.delete(ctx, params).await,
        Method::PATCH => handler.patch(ctx, params).await,
        _ => Err(HandlerError::NotImplemented),
    }
}
