use crate::errors::RepositoryResult;
use crate::message::ChatMessage;
use crate::tenant::TenantId;
use async_trait::async_trait;
use uuid::Uuid;

/// 消息仓储
///
/// 租户内按插入顺序持久化，这是唯一的顺序保证。
/// 分页以消息 id 定位而不是偏移量，并发追加时结果仍然正确。
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// 追加一条已通过审核的消息
    async fn append(&self, message: &ChatMessage) -> RepositoryResult<()>;

    /// 按 id 读取，包含已软删除的行
    async fn find(&self, tenant: &TenantId, id: Uuid) -> RepositoryResult<Option<ChatMessage>>;

    /// 软删除单条消息
    async fn soft_delete(&self, tenant: &TenantId, id: Uuid) -> RepositoryResult<()>;

    /// 一个事务内翻转租户全部行的删除标记，返回受影响行数
    async fn clear_all(&self, tenant: &TenantId) -> RepositoryResult<u64>;

    /// 最近历史，新的在前，排除软删除行。
    /// `before` 给出时返回比该消息更早的行。
    async fn recent_history(
        &self,
        tenant: &TenantId,
        limit: u32,
        before: Option<Uuid>,
    ) -> RepositoryResult<Vec<ChatMessage>>;
}
