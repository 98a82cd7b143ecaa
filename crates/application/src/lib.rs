//! 应用层服务
//!
//! 内容过滤、审核账本、消息接收管道、会话登记、缓存层，
//! 以及共享状态客户端与分发器两个注入接缝。

pub mod cache;
pub mod chat_service;
pub mod clock;
pub mod content_filter;
pub mod distributor;
pub mod local_distributor;
pub mod memory_repos;
pub mod moderation;
pub mod presence;
pub mod shared_state;

pub use cache::CacheLayer;
pub use chat_service::{ChatParams, ChatService, ChatServiceDependencies};
pub use clock::{Clock, ManualClock, SystemClock};
pub use content_filter::{ContentFilter, FilterMode, FilterOutcome, PLACEHOLDER};
pub use distributor::{DistributeError, Distributor, EventStream};
pub use local_distributor::LocalDistributor;
pub use memory_repos::{
    MemoryBanRepository, MemoryFilterPatternRepository, MemoryMessageRepository,
    MemorySettingsRepository,
};
pub use moderation::{
    ModerationLedger, ModerationParams, RateQuota, SenderIdentity, Verdict, ViolationOutcome,
};
pub use presence::SessionRegistry;
pub use shared_state::{MemorySharedState, SharedStateClient, SharedStateError, SharedStateResult};
