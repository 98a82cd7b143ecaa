//! 路由层端到端：发消息、历史、拒绝类别、管理端鉴权

mod support;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use application::Distributor;
use domain::Role;
use support::{assert_status, json_body, test_app};

#[tokio::test]
async fn health_endpoint_responds() {
    let app = test_app();
    let response = app.get("/health").await;
    assert_status(&response, StatusCode::OK);
}

#[tokio::test]
async fn post_and_read_back_history() {
    let app = test_app();

    let response = app
        .post_json(
            "/api/v1/radio-one/messages",
            serde_json::json!({ "nick": "alice", "body": "hello world" }),
        )
        .await;
    assert_status(&response, StatusCode::OK);
    let message = json_body(response).await;
    assert_eq!(message["body"], "hello world");
    assert_eq!(message["sender"], "alice");

    let response = app.get("/api/v1/radio-one/messages").await;
    assert_status(&response, StatusCode::OK);
    let history = json_body(response).await;
    assert_eq!(history["messages"].as_array().unwrap().len(), 1);

    // 另一个租户的历史是空的
    let response = app.get("/api/v1/radio-two/messages").await;
    let history = json_body(response).await;
    assert!(history["messages"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn invalid_tenant_slug_is_rejected() {
    let app = test_app();
    let response = app
        .post_json(
            "/api/v1/Radio%20One/messages",
            serde_json::json!({ "nick": "alice", "body": "hi" }),
        )
        .await;
    assert_status(&response, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rate_limited_response_carries_category_and_retry_hint() {
    let app = test_app();

    for _ in 0..3 {
        let response = app
            .post_json(
                "/api/v1/radio-one/messages",
                serde_json::json!({ "nick": "alice", "body": "spam" }),
            )
            .await;
        assert_status(&response, StatusCode::OK);
    }

    let response = app
        .post_json(
            "/api/v1/radio-one/messages",
            serde_json::json!({ "nick": "alice", "body": "spam" }),
        )
        .await;
    assert_status(&response, StatusCode::TOO_MANY_REQUESTS);
    let body = json_body(response).await;
    assert_eq!(body["code"], "RATE_LIMITED");
    assert_eq!(body["category"], "rate-limited");
    assert!(body["retry_after_secs"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn admin_ban_flow_via_http() {
    let app = test_app();
    let token = app
        .jwt
        .issue("mod-1", Role::Moderator, "radio-one", chrono::Duration::hours(1))
        .unwrap();

    // 未携带 token 的管理端请求被拒绝
    let response = app
        .post_json(
            "/api/v1/radio-one/admin/bans",
            serde_json::json!({
                "subject": { "kind": "nickname", "value": "troll" },
                "reason": "abuse"
            }),
        )
        .await;
    assert_status(&response, StatusCode::UNAUTHORIZED);

    // 携带版主 token 封禁
    let response = app
        .request(
            Request::builder()
                .method("POST")
                .uri("/api/v1/radio-one/admin/bans")
                .header("content-type", "application/json")
                .header("authorization", format!("Bearer {}", token))
                .body(Body::from(
                    serde_json::json!({
                        "subject": { "kind": "nickname", "value": "troll" },
                        "reason": "abuse"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await;
    assert_status(&response, StatusCode::OK);

    // 被封禁昵称发消息得到 BANNED 类别
    let response = app
        .post_json(
            "/api/v1/radio-one/messages",
            serde_json::json!({ "nick": "troll", "body": "hi" }),
        )
        .await;
    assert_status(&response, StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["code"], "BANNED");
    assert_eq!(body["category"], "banned");

    // 版主没有清空权限
    let response = app
        .request(
            Request::builder()
                .method("POST")
                .uri("/api/v1/radio-one/admin/clear")
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_status(&response, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn private_message_to_offline_recipient_is_distinguishable() {
    let app = test_app();
    let response = app
        .post_json(
            "/api/v1/radio-one/messages/private",
            serde_json::json!({ "nick": "alice", "recipient": "ghost", "body": "hi" }),
        )
        .await;
    assert_status(&response, StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["category"], "recipient-unreachable");
}

#[tokio::test]
async fn session_register_and_heartbeat() {
    let app = test_app();

    let response = app
        .post_json(
            "/api/v1/radio-one/sessions",
            serde_json::json!({ "nick": "dj" }),
        )
        .await;
    assert_status(&response, StatusCode::OK);
    let session = json_body(response).await;
    let token = session["token"].as_str().unwrap().to_string();

    let response = app
        .post_json(
            "/api/v1/radio-one/sessions/heartbeat",
            serde_json::json!({ "nick": "dj", "token": token }),
        )
        .await;
    assert_status(&response, StatusCode::OK);

    // 登记后收件人可达
    let response = app
        .post_json(
            "/api/v1/radio-one/messages/private",
            serde_json::json!({ "nick": "alice", "recipient": "dj", "body": "request" }),
        )
        .await;
    assert_status(&response, StatusCode::OK);
}

#[tokio::test]
async fn posted_message_reaches_subscribed_stream() {
    let app = test_app();
    let ks = domain::TenantKeyspace::new(domain::TenantId::new("radio-one").unwrap());

    let mut stream = app
        .distributor
        .subscribe(&ks, &[domain::ChannelKind::PublicMessages])
        .await
        .unwrap();

    let response = app
        .post_json(
            "/api/v1/radio-one/messages",
            serde_json::json!({ "nick": "alice", "body": "live" }),
        )
        .await;
    assert_status(&response, StatusCode::OK);

    match stream.recv().await {
        Some(domain::ChatEvent::MessagePosted { message }) => assert_eq!(message.body, "live"),
        other => panic!("expected MessagePosted, got {:?}", other),
    }
}
