//! Redis 模块
//!
//! 共享状态客户端（计数器、缓存、会话哈希）与 Pub/Sub 分发器。

pub mod distributor;
pub mod error;
pub mod shared_state;

// 重新导出
pub use distributor::*;
pub use error::*;
pub use shared_state::*;
