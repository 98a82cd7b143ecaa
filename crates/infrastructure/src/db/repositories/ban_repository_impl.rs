//! 封禁仓储的 PostgreSQL 实现

use crate::db::DbPool;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{BanRecord, BanRepository, BanSubject, RepositoryError, RepositoryResult, TenantId};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
struct DbBan {
    pub subject_kind: String,
    pub subject_value: String,
    pub reason: String,
    pub issued_by: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

fn subject_columns(subject: &BanSubject) -> (&'static str, &str) {
    match subject {
        BanSubject::Address(addr) => ("address", addr),
        BanSubject::Nickname(nick) => ("nickname", nick),
    }
}

impl DbBan {
    fn into_domain(self) -> RepositoryResult<BanRecord> {
        let subject = match self.subject_kind.as_str() {
            "address" => BanSubject::Address(self.subject_value),
            "nickname" => BanSubject::Nickname(self.subject_value),
            other => {
                return Err(RepositoryError::storage(format!(
                    "corrupt subject_kind column: {}",
                    other
                )))
            }
        };
        Ok(BanRecord {
            subject,
            reason: self.reason,
            issued_by: self.issued_by,
            issued_at: self.issued_at,
            expires_at: self.expires_at,
        })
    }
}

fn storage_err(err: sqlx::Error) -> RepositoryError {
    RepositoryError::storage(err.to_string())
}

pub struct PgBanRepository {
    pool: DbPool,
}

impl PgBanRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BanRepository for PgBanRepository {
    async fn upsert(&self, tenant: &TenantId, record: &BanRecord) -> RepositoryResult<()> {
        let (kind, value) = subject_columns(&record.subject);
        sqlx::query(
            r#"
            INSERT INTO bans (tenant_id, subject_kind, subject_value, reason, issued_by, issued_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (tenant_id, subject_kind, subject_value)
            DO UPDATE SET reason = $4, issued_by = $5, issued_at = $6, expires_at = $7
            "#,
        )
        .bind(tenant.as_str())
        .bind(kind)
        .bind(value)
        .bind(&record.reason)
        .bind(&record.issued_by)
        .bind(record.issued_at)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn remove(&self, tenant: &TenantId, subject: &BanSubject) -> RepositoryResult<bool> {
        let (kind, value) = subject_columns(subject);
        let result = sqlx::query(
            "DELETE FROM bans WHERE tenant_id = $1 AND subject_kind = $2 AND subject_value = $3",
        )
        .bind(tenant.as_str())
        .bind(kind)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn find(
        &self,
        tenant: &TenantId,
        subject: &BanSubject,
    ) -> RepositoryResult<Option<BanRecord>> {
        let (kind, value) = subject_columns(subject);
        let row = sqlx::query_as::<_, DbBan>(
            r#"
            SELECT subject_kind, subject_value, reason, issued_by, issued_at, expires_at
            FROM bans
            WHERE tenant_id = $1 AND subject_kind = $2 AND subject_value = $3
            "#,
        )
        .bind(tenant.as_str())
        .bind(kind)
        .bind(value)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.map(DbBan::into_domain).transpose()
    }

    async fn list_active(
        &self,
        tenant: &TenantId,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<BanRecord>> {
        let rows = sqlx::query_as::<_, DbBan>(
            r#"
            SELECT subject_kind, subject_value, reason, issued_by, issued_at, expires_at
            FROM bans
            WHERE tenant_id = $1 AND (expires_at IS NULL OR expires_at > $2)
            ORDER BY issued_at DESC
            "#,
        )
        .bind(tenant.as_str())
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.into_iter().map(DbBan::into_domain).collect()
    }

    async fn sweep_expired(&self, tenant: &TenantId, now: DateTime<Utc>) -> RepositoryResult<u64> {
        let result = sqlx::query(
            "DELETE FROM bans WHERE tenant_id = $1 AND expires_at IS NOT NULL AND expires_at <= $2",
        )
        .bind(tenant.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(result.rows_affected())
    }
}
