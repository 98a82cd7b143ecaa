//! 事件分发接缝
//!
//! 按（租户、频道种类）发布事件；订阅得到一个可取消的事件流，
//! 丢弃流即退订。投递语义为至多一次、尽力而为、不回放。

use async_trait::async_trait;
use domain::{ChannelKind, ChatEvent, TenantKeyspace};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum DistributeError {
    #[error("publish failed: {0}")]
    Publish(String),

    #[error("subscribe failed: {0}")]
    Subscribe(String),
}

impl DistributeError {
    pub fn publish(message: impl Into<String>) -> Self {
        Self::Publish(message.into())
    }

    pub fn subscribe(message: impl Into<String>) -> Self {
        Self::Subscribe(message.into())
    }
}

impl From<DistributeError> for domain::DomainError {
    fn from(err: DistributeError) -> Self {
        domain::DomainError::transient(err.to_string())
    }
}

#[async_trait]
pub trait Distributor: Send + Sync {
    /// 发布事件，频道由事件类型决定
    async fn publish(
        &self,
        keyspace: &TenantKeyspace,
        event: &ChatEvent,
    ) -> Result<(), DistributeError>;

    /// 订阅一组频道，返回事件流。订阅之前发布的事件不可见。
    async fn subscribe(
        &self,
        keyspace: &TenantKeyspace,
        kinds: &[ChannelKind],
    ) -> Result<EventStream, DistributeError>;
}

/// 可取消的事件流
///
/// 内部由转发任务喂入；`Drop` 时中止全部转发任务，
/// 使退订在一个轮询间隔内生效。
pub struct EventStream {
    rx: mpsc::Receiver<ChatEvent>,
    forwarders: Vec<JoinHandle<()>>,
}

impl EventStream {
    pub fn new(rx: mpsc::Receiver<ChatEvent>, forwarders: Vec<JoinHandle<()>>) -> Self {
        Self { rx, forwarders }
    }

    /// 下一个事件；全部发送端关闭后返回 `None`
    pub async fn recv(&mut self) -> Option<ChatEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ChatEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        for handle in &self.forwarders {
            handle.abort();
        }
    }
}
