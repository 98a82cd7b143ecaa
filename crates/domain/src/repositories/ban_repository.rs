use crate::errors::RepositoryResult;
use crate::moderation::{BanRecord, BanSubject};
use crate::tenant::TenantId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// 封禁记录仓储
#[async_trait]
pub trait BanRepository: Send + Sync {
    /// 写入或覆盖同一对象的封禁记录
    async fn upsert(&self, tenant: &TenantId, record: &BanRecord) -> RepositoryResult<()>;

    /// 解除封禁，返回是否存在记录
    async fn remove(&self, tenant: &TenantId, subject: &BanSubject) -> RepositoryResult<bool>;

    /// 查找封禁记录，过期记录也会返回（惰性过期由调用方判断）
    async fn find(
        &self,
        tenant: &TenantId,
        subject: &BanSubject,
    ) -> RepositoryResult<Option<BanRecord>>;

    /// 列出租户全部未过期封禁
    async fn list_active(
        &self,
        tenant: &TenantId,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<BanRecord>>;

    /// 显式清理扫除：删除已过期记录，返回删除数量
    async fn sweep_expired(&self, tenant: &TenantId, now: DateTime<Utc>) -> RepositoryResult<u64>;
}
