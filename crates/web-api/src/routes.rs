//! 接收端路由
//!
//! 发消息、历史、会话登记与心跳，外加流式升级入口。
//! 管理端路由在 admin_routes。

use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use application::SenderIdentity;
use domain::{ChatMessage, PrivateMessage, Session, TenantId, TenantKeyspace};

use crate::admin_routes::admin_routes;
use crate::error::ApiError;
use crate::state::AppState;
use crate::stream::stream_handler;

#[derive(Debug, Deserialize)]
struct PostMessagePayload {
    nick: String,
    body: String,
    reply_to: Option<Uuid>,
    attachment_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostPrivatePayload {
    nick: String,
    recipient: String,
    body: String,
    attachment_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<u32>,
    before: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct RegisterSessionPayload {
    nick: String,
}

#[derive(Debug, Deserialize)]
struct HeartbeatPayload {
    nick: String,
    token: Uuid,
}

#[derive(Debug, Serialize)]
struct HistoryResponse {
    messages: Vec<ChatMessage>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1/{tenant}", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/messages", post(post_message).get(list_history))
        .route("/messages/private", post(post_private_message))
        .route("/sessions", post(register_session))
        .route("/sessions/heartbeat", post(heartbeat))
        .route("/stream", get(stream_handler))
        .merge(admin_routes())
}

async fn health() -> &'static str {
    "ok"
}

fn parse_tenant(raw: String) -> Result<TenantKeyspace, ApiError> {
    let tenant = TenantId::new(raw)?;
    Ok(TenantKeyspace::new(tenant))
}

/// 发送方地址：优先第一跳 X-Forwarded-For，否则对端地址
fn client_addr(headers: &HeaderMap, addr: &SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| addr.ip().to_string())
}

async fn post_message(
    Path(tenant): Path<String>,
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(payload): Json<PostMessagePayload>,
) -> Result<Json<ChatMessage>, ApiError> {
    let keyspace = parse_tenant(tenant)?;
    let sender = SenderIdentity {
        nick: payload.nick,
        addr: client_addr(&headers, &addr),
    };
    let message = state
        .chat_service
        .post_public_message(
            &keyspace,
            &sender,
            &payload.body,
            payload.reply_to,
            payload.attachment_id,
        )
        .await?;
    Ok(Json(message))
}

async fn post_private_message(
    Path(tenant): Path<String>,
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(payload): Json<PostPrivatePayload>,
) -> Result<Json<PrivateMessage>, ApiError> {
    let keyspace = parse_tenant(tenant)?;
    let sender = SenderIdentity {
        nick: payload.nick,
        addr: client_addr(&headers, &addr),
    };
    let message = state
        .chat_service
        .post_private_message(
            &keyspace,
            &sender,
            &payload.recipient,
            &payload.body,
            payload.attachment_id,
        )
        .await?;
    Ok(Json(message))
}

async fn list_history(
    Path(tenant): Path<String>,
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let keyspace = parse_tenant(tenant)?;
    let messages = state
        .chat_service
        .list_history(&keyspace, query.limit, query.before)
        .await?;
    Ok(Json(HistoryResponse { messages }))
}

async fn register_session(
    Path(tenant): Path<String>,
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(payload): Json<RegisterSessionPayload>,
) -> Result<Json<Session>, ApiError> {
    let keyspace = parse_tenant(tenant)?;
    let session = state
        .chat_service
        .sessions()
        .register(&keyspace, &payload.nick, &client_addr(&headers, &addr))
        .await?;
    Ok(Json(session))
}

async fn heartbeat(
    Path(tenant): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<HeartbeatPayload>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let keyspace = parse_tenant(tenant)?;
    state
        .chat_service
        .sessions()
        .heartbeat(&keyspace, &payload.nick, payload.token)
        .await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
