//! 实时聊天系统核心领域模型
//!
//! 包含消息、会话、封禁记录等核心实体，租户键空间，
//! 以及广播事件和仓储接口定义。

pub mod errors;
pub mod events;
pub mod message;
pub mod moderation;
pub mod repositories;
pub mod roles;
pub mod session;
pub mod settings;
pub mod tenant;

// 重新导出常用类型
pub use errors::*;
pub use events::*;
pub use message::*;
pub use moderation::*;
pub use repositories::*;
pub use roles::*;
pub use session::*;
pub use settings::*;
pub use tenant::*;
