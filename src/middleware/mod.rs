//! 요청 처리 함수들의 순차 실행 체인
//!
//! 두 가지 호출 규약을 함께 지원합니다.
//! * 순차 목록 방식 (`Plugin`): before/after 목록을 등록 순서대로 하나씩 실행
//! * 연속 전달 방식 (`Middleware`): 각 함수가 `Next`를 호출해야 다음으로 진행

pub mod chain;
pub mod error;
pub mod headers;
pub mod traits;

pub use chain::{ChainOutcome, MiddlewareChain, Next, PluginChain};
pub use error::MiddlewareError;
pub use headers::HeadersPlugin;
pub use traits::{Middleware, Plugin};
