//! 拒绝列表仓储的 PostgreSQL 实现

use crate::db::DbPool;
use async_trait::async_trait;
use domain::{FilterPattern, FilterPatternRepository, RepositoryError, RepositoryResult, TenantId};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
struct DbFilterPattern {
    pub id: Uuid,
    pub pattern: String,
    pub is_regex: bool,
}

impl From<DbFilterPattern> for FilterPattern {
    fn from(row: DbFilterPattern) -> Self {
        FilterPattern {
            id: row.id,
            pattern: row.pattern,
            is_regex: row.is_regex,
        }
    }
}

fn storage_err(err: sqlx::Error) -> RepositoryError {
    RepositoryError::storage(err.to_string())
}

pub struct PgFilterPatternRepository {
    pool: DbPool,
}

impl PgFilterPatternRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FilterPatternRepository for PgFilterPatternRepository {
    async fn list(&self, tenant: &TenantId) -> RepositoryResult<Vec<FilterPattern>> {
        let rows = sqlx::query_as::<_, DbFilterPattern>(
            "SELECT id, pattern, is_regex FROM filter_patterns WHERE tenant_id = $1 ORDER BY pattern",
        )
        .bind(tenant.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(rows.into_iter().map(FilterPattern::from).collect())
    }

    async fn add(&self, tenant: &TenantId, pattern: &FilterPattern) -> RepositoryResult<()> {
        sqlx::query(
            "INSERT INTO filter_patterns (id, tenant_id, pattern, is_regex) VALUES ($1, $2, $3, $4)",
        )
        .bind(pattern.id)
        .bind(tenant.as_str())
        .bind(&pattern.pattern)
        .bind(pattern.is_regex)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn remove(&self, tenant: &TenantId, id: Uuid) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM filter_patterns WHERE tenant_id = $1 AND id = $2")
            .bind(tenant.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(result.rows_affected() > 0)
    }
}
