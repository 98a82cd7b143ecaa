use crate::errors::RepositoryResult;
use crate::settings::TenantSettings;
use crate::tenant::TenantId;
use async_trait::async_trait;

/// 租户设置仓储
///
/// 管理端协作方通过它写入设置；核心只读，经缓存层取值。
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// 读取租户设置，未配置的租户返回 `None`（使用全局默认值）
    async fn load(&self, tenant: &TenantId) -> RepositoryResult<Option<TenantSettings>>;

    async fn save(&self, tenant: &TenantId, settings: &TenantSettings) -> RepositoryResult<()>;
}
