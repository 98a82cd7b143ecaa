use crate::errors::RepositoryResult;
use crate::moderation::FilterPattern;
use crate::tenant::TenantId;
use async_trait::async_trait;
use uuid::Uuid;

/// 内容拦截模式仓储（版主维护的拒绝列表）
#[async_trait]
pub trait FilterPatternRepository: Send + Sync {
    async fn list(&self, tenant: &TenantId) -> RepositoryResult<Vec<FilterPattern>>;

    async fn add(&self, tenant: &TenantId, pattern: &FilterPattern) -> RepositoryResult<()>;

    async fn remove(&self, tenant: &TenantId, id: Uuid) -> RepositoryResult<bool>;
}
