use crate::errors::{DomainError, DomainResult};
use crate::tenant::TenantId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 聊天消息实体
///
/// 创建后除软删除标记外不可变。`reply_to` 与 `attachment_id`
/// 是软指针，指向的行可能已被删除或从未存在，读取时容忍缺失。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub tenant: TenantId,
    pub sender: String,
    pub body: String,
    pub reply_to: Option<Uuid>,
    pub attachment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing, default)] // 删除标记不暴露给客户端，反序列化按未删除处理
    pub is_deleted: bool,
}

impl ChatMessage {
    pub fn new(
        tenant: TenantId,
        sender: impl Into<String>,
        body: impl Into<String>,
        reply_to: Option<Uuid>,
        attachment_id: Option<String>,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let sender = sender.into();
        let body = body.into();
        if sender.trim().is_empty() {
            return Err(DomainError::validation("sender", "must not be empty"));
        }
        if body.is_empty() && attachment_id.is_none() {
            return Err(DomainError::validation(
                "body",
                "empty body requires an attachment",
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            tenant,
            sender,
            body,
            reply_to,
            attachment_id,
            created_at,
            is_deleted: false,
        })
    }

    pub fn mark_deleted(&mut self) {
        self.is_deleted = true;
    }

    pub fn is_visible(&self) -> bool {
        !self.is_deleted
    }
}

/// 私信
///
/// 不落库，仅经由代理广播后被网关按收件人过滤。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateMessage {
    pub id: Uuid,
    pub tenant: TenantId,
    pub sender: String,
    pub recipient: String,
    pub body: String,
    pub attachment_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant() -> TenantId {
        TenantId::new("radio-one").unwrap()
    }

    #[test]
    fn empty_body_requires_attachment() {
        let err = ChatMessage::new(tenant(), "alice", "", None, None, Utc::now());
        assert!(err.is_err());

        let ok = ChatMessage::new(
            tenant(),
            "alice",
            "",
            None,
            Some("photo-17".into()),
            Utc::now(),
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn soft_delete_flips_visibility() {
        let mut msg = ChatMessage::new(tenant(), "alice", "hi", None, None, Utc::now()).unwrap();
        assert!(msg.is_visible());
        msg.mark_deleted();
        assert!(!msg.is_visible());
    }
}
