//! 管理端路由
//!
//! 封禁管理、清空、删除消息、拒绝列表与租户设置。
//! 不在热路径上；每个端点按角色权限表鉴权。

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use domain::{
    BanRecord, BanSubject, ChatMessage, FilterPattern, Permission, TenantId, TenantKeyspace,
    TenantSettings,
};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct BanPayload {
    subject: BanSubject,
    reason: String,
    /// 秒；空表示永久
    duration_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct UnbanPayload {
    subject: BanSubject,
}

#[derive(Debug, Serialize)]
struct UnbanResponse {
    removed: bool,
}

#[derive(Debug, Deserialize)]
struct AdminHistoryQuery {
    limit: Option<u32>,
    before: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct PatternPayload {
    pattern: String,
    #[serde(default)]
    is_regex: bool,
}

#[derive(Debug, Serialize)]
struct SweepResponse {
    removed: u64,
}

#[derive(Debug, Serialize)]
struct ClearResponse {
    cleared: u64,
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/bans", get(list_bans).post(issue_ban))
        .route("/admin/unban", post(unban))
        .route("/admin/bans/sweep", post(sweep_bans))
        .route("/admin/messages", get(list_messages))
        .route("/admin/messages/{id}", delete(delete_message))
        .route("/admin/clear", post(clear_chat))
        .route("/admin/patterns", get(list_patterns).post(add_pattern))
        .route("/admin/patterns/{id}", delete(remove_pattern))
        .route("/admin/settings", get(get_settings).put(put_settings))
}

fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    tenant: String,
    permission: Permission,
) -> Result<(TenantKeyspace, String), ApiError> {
    let tenant = TenantId::new(tenant)?;
    let claims = state.jwt_service.authorize(headers, &tenant, permission)?;
    Ok((TenantKeyspace::new(tenant), claims.actor))
}

async fn list_bans(
    Path(tenant): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<BanRecord>>, ApiError> {
    let (keyspace, _) = authorize(&state, &headers, tenant, Permission::ListBans)?;
    let bans = state.chat_service.ledger().list_bans(&keyspace).await?;
    Ok(Json(bans))
}

async fn issue_ban(
    Path(tenant): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<BanPayload>,
) -> Result<Json<BanRecord>, ApiError> {
    let (keyspace, actor) = authorize(&state, &headers, tenant, Permission::BanSubject)?;
    let record = state
        .chat_service
        .ledger()
        .issue_ban(
            &keyspace,
            payload.subject,
            &payload.reason,
            &actor,
            payload.duration_secs.map(std::time::Duration::from_secs),
        )
        .await?;
    Ok(Json(record))
}

async fn unban(
    Path(tenant): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<UnbanPayload>,
) -> Result<Json<UnbanResponse>, ApiError> {
    let (keyspace, _) = authorize(&state, &headers, tenant, Permission::UnbanSubject)?;
    let removed = state
        .chat_service
        .ledger()
        .unban(&keyspace, &payload.subject)
        .await?;
    Ok(Json(UnbanResponse { removed }))
}

async fn sweep_bans(
    Path(tenant): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SweepResponse>, ApiError> {
    let (keyspace, _) = authorize(&state, &headers, tenant, Permission::UnbanSubject)?;
    let removed = state.chat_service.ledger().sweep_expired(&keyspace).await?;
    Ok(Json(SweepResponse { removed }))
}

async fn list_messages(
    Path(tenant): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AdminHistoryQuery>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    let (keyspace, _) = authorize(&state, &headers, tenant, Permission::ListMessages)?;
    let messages = state
        .chat_service
        .list_history(&keyspace, query.limit, query.before)
        .await?;
    Ok(Json(messages))
}

async fn delete_message(
    Path((tenant, id)): Path<(String, Uuid)>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (keyspace, _) = authorize(&state, &headers, tenant, Permission::DeleteMessage)?;
    state.chat_service.delete_message(&keyspace, id).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

async fn clear_chat(
    Path(tenant): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ClearResponse>, ApiError> {
    let (keyspace, actor) = authorize(&state, &headers, tenant, Permission::ClearChat)?;
    let cleared = state.chat_service.clear_chat(&keyspace).await?;
    tracing::info!(tenant = %keyspace.tenant(), actor, cleared, "管理端清空聊天");
    Ok(Json(ClearResponse { cleared }))
}

async fn list_patterns(
    Path(tenant): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<FilterPattern>>, ApiError> {
    let (keyspace, _) = authorize(&state, &headers, tenant, Permission::EditFilterPatterns)?;
    let patterns = state.chat_service.list_patterns(&keyspace).await?;
    Ok(Json(patterns))
}

async fn add_pattern(
    Path(tenant): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<PatternPayload>,
) -> Result<Json<FilterPattern>, ApiError> {
    let (keyspace, _) = authorize(&state, &headers, tenant, Permission::EditFilterPatterns)?;
    let pattern = state
        .chat_service
        .add_pattern(&keyspace, payload.pattern, payload.is_regex)
        .await?;
    Ok(Json(pattern))
}

async fn remove_pattern(
    Path((tenant, id)): Path<(String, Uuid)>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (keyspace, _) = authorize(&state, &headers, tenant, Permission::EditFilterPatterns)?;
    let removed = state.chat_service.remove_pattern(&keyspace, id).await?;
    if !removed {
        return Err(ApiError::not_found("pattern not found"));
    }
    Ok(Json(serde_json::json!({ "removed": true })))
}

async fn get_settings(
    Path(tenant): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TenantSettings>, ApiError> {
    let (keyspace, _) = authorize(&state, &headers, tenant, Permission::EditSettings)?;
    let settings = state.chat_service.effective_settings(&keyspace).await?;
    Ok(Json(settings))
}

async fn put_settings(
    Path(tenant): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<TenantSettings>,
) -> Result<Json<TenantSettings>, ApiError> {
    let (keyspace, _) = authorize(&state, &headers, tenant, Permission::EditSettings)?;
    state
        .chat_service
        .update_settings(&keyspace, &payload)
        .await?;
    Ok(Json(payload))
}
