//! 消息仓储的 PostgreSQL 实现

use crate::db::DbPool;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{ChatMessage, MessageRepository, RepositoryError, RepositoryResult, TenantId};
use sqlx::FromRow;
use uuid::Uuid;

/// 数据库消息行
#[derive(Debug, Clone, FromRow)]
struct DbMessage {
    pub id: Uuid,
    pub tenant_id: String,
    pub sender: String,
    pub body: String,
    pub reply_to: Option<Uuid>,
    pub attachment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_deleted: bool,
}

impl DbMessage {
    fn into_domain(self) -> RepositoryResult<ChatMessage> {
        let tenant = TenantId::new(self.tenant_id)
            .map_err(|e| RepositoryError::storage(format!("corrupt tenant_id column: {}", e)))?;
        Ok(ChatMessage {
            id: self.id,
            tenant,
            sender: self.sender,
            body: self.body,
            reply_to: self.reply_to,
            attachment_id: self.attachment_id,
            created_at: self.created_at,
            is_deleted: self.is_deleted,
        })
    }
}

fn storage_err(err: sqlx::Error) -> RepositoryError {
    RepositoryError::storage(err.to_string())
}

pub struct PgMessageRepository {
    pool: DbPool,
}

impl PgMessageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn append(&self, message: &ChatMessage) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO messages (id, tenant_id, sender, body, reply_to, attachment_id, created_at, is_deleted)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(message.id)
        .bind(message.tenant.as_str())
        .bind(&message.sender)
        .bind(&message.body)
        .bind(message.reply_to)
        .bind(&message.attachment_id)
        .bind(message.created_at)
        .bind(message.is_deleted)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn find(&self, tenant: &TenantId, id: Uuid) -> RepositoryResult<Option<ChatMessage>> {
        let row = sqlx::query_as::<_, DbMessage>(
            r#"
            SELECT id, tenant_id, sender, body, reply_to, attachment_id, created_at, is_deleted
            FROM messages
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.map(DbMessage::into_domain).transpose()
    }

    async fn soft_delete(&self, tenant: &TenantId, id: Uuid) -> RepositoryResult<()> {
        let result = sqlx::query(
            "UPDATE messages SET is_deleted = TRUE WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant.as_str())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn clear_all(&self, tenant: &TenantId) -> RepositoryResult<u64> {
        // 单条 UPDATE 本身就是一个事务
        let result = sqlx::query(
            "UPDATE messages SET is_deleted = TRUE WHERE tenant_id = $1 AND is_deleted = FALSE",
        )
        .bind(tenant.as_str())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(result.rows_affected())
    }

    async fn recent_history(
        &self,
        tenant: &TenantId,
        limit: u32,
        before: Option<Uuid>,
    ) -> RepositoryResult<Vec<ChatMessage>> {
        // 锚点分页：以 (created_at, id) 定位，并发追加不影响结果
        let rows = sqlx::query_as::<_, DbMessage>(
            r#"
            SELECT id, tenant_id, sender, body, reply_to, attachment_id, created_at, is_deleted
            FROM messages
            WHERE tenant_id = $1
              AND is_deleted = FALSE
              AND ($2::uuid IS NULL OR (created_at, id) < (
                    SELECT created_at, id FROM messages WHERE tenant_id = $1 AND id = $2
              ))
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            "#,
        )
        .bind(tenant.as_str())
        .bind(before)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.into_iter().map(DbMessage::into_domain).collect()
    }
}
