//! webgate는 패턴 라우팅, 동적 핸들러, 정적 파일, 리버스 프록시를 하나의
//! 요청 처리 흐름으로 묶는 경량 HTTP 디스패처입니다.
//!
//! # 주요 기능
//!
//! - `:name`, `*`, `( … )` 패턴 기반 라우팅과 동적 핸들러 자동 탐색
//! - 경로 격리, 클라이언트 차단, 에러 정제
//! - before/after 플러그인과 연속 전달 미들웨어 체인
//! - `Referer` 기준 상대 경로 프록시
//!
//! # 예제
//!
//! ```no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use webgate::context::RequestContext;
//! use webgate::dispatch::Dispatcher;
//! use webgate::handler::{Handler, HandlerRegistry, HandlerResult};
//! use webgate::routing::{Params, RoutingTable};
//! use webgate::settings::RouterSettings;
//!
//! struct Cars;
//!
//! #[async_trait]
//! impl Handler for Cars {
//!     async fn get(&self, _ctx: &mut RequestContext, params: Option<&Params>) -> HandlerResult {
//!         let id = params.and_then(|p| p.get("id")).cloned().unwrap_or_default();
//!         Ok(format!("car {}", id).into())
//!     }
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = RouterSettings::default();
//! let router = Arc::new(RoutingTable::new());
//! router.load([("/cars(/:id)", "/cars")]).await?;
//!
//! let mut handlers = HandlerRegistry::new();
//! handlers.register("/cars", Cars);
//!
//! let dispatcher = Dispatcher::builder(&settings)
//!     .router(router)
//!     .handlers(handlers)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod dispatch;
pub mod handler;
pub mod logging;
pub mod middleware;
pub mod proxy;
pub mod routing;
pub mod security;
pub mod server;
pub mod settings;
pub mod tls;
