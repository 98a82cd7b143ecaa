//! 集成测试装配：全内存的服务组合

use application::{
    CacheLayer, ChatParams, ChatService, ChatServiceDependencies, Clock, LocalDistributor,
    ManualClock, MemoryBanRepository, MemoryFilterPatternRepository, MemoryMessageRepository,
    MemorySettingsRepository, MemorySharedState, ModerationLedger, ModerationParams, RateQuota,
    SenderIdentity, SessionRegistry,
};
use chrono::Utc;
use domain::{TenantId, TenantKeyspace};
use std::sync::Arc;
use std::time::Duration;

pub struct Harness {
    pub service: ChatService,
    pub distributor: Arc<LocalDistributor>,
    pub clock: Arc<ManualClock>,
}

/// 限流窗口故意设得很短（200ms），窗口滚动测试用真实睡眠
pub const TEST_RATE_LIMIT: u32 = 3;
pub const TEST_RATE_WINDOW: Duration = Duration::from_millis(200);

pub fn harness() -> Harness {
    let state = Arc::new(MemorySharedState::new());
    let distributor = Arc::new(LocalDistributor::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let cache = CacheLayer::new(
        Arc::clone(&state) as Arc<dyn application::SharedStateClient>,
        Duration::from_secs(300),
    );

    let bans = Arc::new(MemoryBanRepository::new());
    let ledger = Arc::new(ModerationLedger::new(
        Arc::clone(&state) as _,
        cache.clone(),
        bans,
        Arc::clone(&clock) as Arc<dyn Clock>,
        ModerationParams {
            violation_threshold: 3,
            violation_ttl: Duration::from_secs(3600),
            autoban_duration: Duration::from_secs(86_400),
        },
    ));

    let sessions = Arc::new(SessionRegistry::new(
        Arc::clone(&state) as _,
        Arc::clone(&distributor) as _,
        Arc::clone(&clock) as Arc<dyn Clock>,
        Duration::from_secs(300),
    ));

    let service = ChatService::new(ChatServiceDependencies {
        messages: Arc::new(MemoryMessageRepository::new()),
        patterns: Arc::new(MemoryFilterPatternRepository::new()),
        settings: Arc::new(MemorySettingsRepository::new()),
        ledger,
        sessions,
        distributor: Arc::clone(&distributor) as _,
        cache,
        clock: Arc::clone(&clock) as Arc<dyn Clock>,
        params: ChatParams {
            max_message_len: 500,
            history_limit: 50,
            default_quota: RateQuota {
                limit: TEST_RATE_LIMIT,
                window: TEST_RATE_WINDOW,
            },
        },
    });

    Harness {
        service,
        distributor,
        clock,
    }
}

pub fn keyspace(slug: &str) -> TenantKeyspace {
    TenantKeyspace::new(TenantId::new(slug).unwrap())
}

pub fn sender(nick: &str, addr: &str) -> SenderIdentity {
    SenderIdentity {
        nick: nick.to_string(),
        addr: addr.to_string(),
    }
}
