//! 租户设置仓储的 PostgreSQL 实现

use crate::db::DbPool;
use async_trait::async_trait;
use domain::{
    ChatMode, RepositoryError, RepositoryResult, SettingsRepository, TenantId, TenantSettings,
};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
struct DbTenantSettings {
    pub mode: String,
    pub rate_limit: Option<i32>,
    pub rate_window_secs: Option<i64>,
    pub history_limit: Option<i32>,
}

fn mode_to_column(mode: ChatMode) -> &'static str {
    match mode {
        ChatMode::Public => "public",
        ChatMode::Private => "private",
        ChatMode::Both => "both",
    }
}

impl DbTenantSettings {
    fn into_domain(self) -> RepositoryResult<TenantSettings> {
        let mode = match self.mode.as_str() {
            "public" => ChatMode::Public,
            "private" => ChatMode::Private,
            "both" => ChatMode::Both,
            other => {
                return Err(RepositoryError::storage(format!(
                    "corrupt mode column: {}",
                    other
                )))
            }
        };
        Ok(TenantSettings {
            mode,
            rate_limit: self.rate_limit.map(|v| v as u32),
            rate_window_secs: self.rate_window_secs.map(|v| v as u64),
            history_limit: self.history_limit.map(|v| v as u32),
        })
    }
}

fn storage_err(err: sqlx::Error) -> RepositoryError {
    RepositoryError::storage(err.to_string())
}

pub struct PgSettingsRepository {
    pool: DbPool,
}

impl PgSettingsRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsRepository for PgSettingsRepository {
    async fn load(&self, tenant: &TenantId) -> RepositoryResult<Option<TenantSettings>> {
        let row = sqlx::query_as::<_, DbTenantSettings>(
            r#"
            SELECT mode, rate_limit, rate_window_secs, history_limit
            FROM tenant_settings
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.map(DbTenantSettings::into_domain).transpose()
    }

    async fn save(&self, tenant: &TenantId, settings: &TenantSettings) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tenant_settings (tenant_id, mode, rate_limit, rate_window_secs, history_limit)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (tenant_id)
            DO UPDATE SET mode = $2, rate_limit = $3, rate_window_secs = $4, history_limit = $5
            "#,
        )
        .bind(tenant.as_str())
        .bind(mode_to_column(settings.mode))
        .bind(settings.rate_limit.map(|v| v as i32))
        .bind(settings.rate_window_secs.map(|v| v as i64))
        .bind(settings.history_limit.map(|v| v as i32))
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }
}
