//! 경로 격리, 클라이언트 차단, 에러 정제를 담당하는 보안 모듈

mod blacklist;
mod confine;
mod purify;

pub use blacklist::{Blacklist, ProtectMiddleware, CLEAR_WINDOW};
pub use confine::{PathConfinement, NOT_FOUND_PAGE};
pub use purify::{client_id, is_critical_header, purify, Purified, StatusHint};
