//! 主应用程序入口
//!
//! 装配 PostgreSQL、Redis、审核账本、会话登记与聊天服务，
//! 运行迁移后启动 Axum 服务。

use application::{
    CacheLayer, ChatParams, ChatService, ChatServiceDependencies, Clock, Distributor,
    ModerationLedger, ModerationParams, RateQuota, SessionRegistry, SharedStateClient, SystemClock,
};
use config::AppConfig;
use infrastructure::{
    create_pg_pool, PgBanRepository, PgFilterPatternRepository, PgMessageRepository,
    PgSettingsRepository, RedisDistributor, RedisSharedState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState, JwtService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::load()?;
    tracing::info!(
        database = cfg.database.url.split('@').next_back().unwrap_or("unknown"),
        "加载配置完成"
    );

    // PostgreSQL 连接池与迁移
    let pool = create_pg_pool(&cfg.database.url, cfg.database.max_connections).await?;
    sqlx::migrate!("../../migrations").run(&pool).await?;

    // 共享状态与分发器（同一个 Redis 实例，多租户靠键空间隔离）
    let shared_state: Arc<dyn SharedStateClient> =
        Arc::new(RedisSharedState::connect(&cfg.redis.url).await?);
    let distributor: Arc<dyn Distributor> =
        Arc::new(RedisDistributor::connect(&cfg.redis.url).await?);

    let cache = CacheLayer::new(
        Arc::clone(&shared_state),
        Duration::from_secs(cfg.moderation.cache_ttl_secs),
    );
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let ledger = Arc::new(ModerationLedger::new(
        Arc::clone(&shared_state),
        cache.clone(),
        Arc::new(PgBanRepository::new(pool.clone())),
        Arc::clone(&clock),
        ModerationParams {
            violation_threshold: cfg.moderation.violation_threshold,
            violation_ttl: Duration::from_secs(cfg.moderation.violation_ttl_secs),
            autoban_duration: Duration::from_secs(cfg.moderation.autoban_duration_secs),
        },
    ));

    let sessions = Arc::new(SessionRegistry::new(
        Arc::clone(&shared_state),
        Arc::clone(&distributor),
        Arc::clone(&clock),
        Duration::from_secs(cfg.chat.session_ttl_secs),
    ));

    let chat_service = Arc::new(ChatService::new(ChatServiceDependencies {
        messages: Arc::new(PgMessageRepository::new(pool.clone())),
        patterns: Arc::new(PgFilterPatternRepository::new(pool.clone())),
        settings: Arc::new(PgSettingsRepository::new(pool)),
        ledger,
        sessions,
        distributor: Arc::clone(&distributor),
        cache,
        clock,
        params: ChatParams {
            max_message_len: cfg.chat.max_message_len,
            history_limit: cfg.chat.history_limit,
            default_quota: RateQuota {
                limit: cfg.moderation.rate_limit,
                window: Duration::from_secs(cfg.moderation.rate_window_secs),
            },
        },
    }));

    let jwt_service = Arc::new(JwtService::new(&cfg.auth));

    let state = AppState::new(
        chat_service,
        distributor,
        jwt_service,
        web_api::StreamParams {
            keepalive: Duration::from_secs(cfg.stream.keepalive_secs),
            lifetime: Duration::from_secs(cfg.stream.lifetime_secs),
        },
    );

    let app = router(state);
    let listener =
        tokio::net::TcpListener::bind((cfg.server.host.as_str(), cfg.server.port)).await?;

    tracing::info!(
        "聊天服务器启动在 http://{}:{}",
        cfg.server.host,
        cfg.server.port
    );
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
