//! 路由集成测试装配：内存后端 + oneshot 请求

use application::{
    CacheLayer, ChatParams, ChatService, ChatServiceDependencies, Clock, LocalDistributor,
    MemoryBanRepository, MemoryFilterPatternRepository, MemoryMessageRepository,
    MemorySettingsRepository, MemorySharedState, ModerationLedger, ModerationParams, RateQuota,
    SessionRegistry, SystemClock,
};
use axum::body::Body;
use axum::extract::connect_info::ConnectInfo;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use config::AuthConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use web_api::{router, AppState, JwtService, StreamParams};

pub struct TestApp {
    pub app: Router,
    pub jwt: Arc<JwtService>,
    pub distributor: Arc<LocalDistributor>,
}

pub fn test_app() -> TestApp {
    let state = Arc::new(MemorySharedState::new());
    let distributor = Arc::new(LocalDistributor::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cache = CacheLayer::new(Arc::clone(&state) as _, Duration::from_secs(300));

    let ledger = Arc::new(ModerationLedger::new(
        Arc::clone(&state) as _,
        cache.clone(),
        Arc::new(MemoryBanRepository::new()),
        Arc::clone(&clock),
        ModerationParams {
            violation_threshold: 3,
            violation_ttl: Duration::from_secs(3600),
            autoban_duration: Duration::from_secs(86_400),
        },
    ));

    let sessions = Arc::new(SessionRegistry::new(
        Arc::clone(&state) as _,
        Arc::clone(&distributor) as _,
        Arc::clone(&clock),
        Duration::from_secs(300),
    ));

    let chat_service = Arc::new(ChatService::new(ChatServiceDependencies {
        messages: Arc::new(MemoryMessageRepository::new()),
        patterns: Arc::new(MemoryFilterPatternRepository::new()),
        settings: Arc::new(MemorySettingsRepository::new()),
        ledger,
        sessions,
        distributor: Arc::clone(&distributor) as _,
        cache,
        clock,
        params: ChatParams {
            max_message_len: 500,
            history_limit: 50,
            default_quota: RateQuota {
                limit: 3,
                window: Duration::from_secs(60),
            },
        },
    }));

    let jwt = Arc::new(JwtService::new(&AuthConfig {
        jwt_secret: "0123456789abcdef0123456789abcdef".into(),
    }));

    let app_state = AppState::new(
        chat_service,
        Arc::clone(&distributor) as _,
        Arc::clone(&jwt),
        StreamParams {
            keepalive: Duration::from_secs(20),
            lifetime: Duration::from_secs(55),
        },
    );

    TestApp {
        app: router(app_state),
        jwt,
        distributor,
    }
}

impl TestApp {
    /// 发送请求；测试里手动注入对端地址扩展
    pub async fn request(&self, request: Request<Body>) -> Response {
        let mut request = request;
        let addr: SocketAddr = "1.2.3.4:55555".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        self.app.clone().oneshot(request).await.unwrap()
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> Response {
        self.request(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.request(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }
}

pub async fn json_body(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(response.status(), expected);
}
