//! 进程内分发器
//!
//! 以 tokio broadcast 按频道名分发，单进程部署和测试使用。
//! 语义与 Redis 实现一致：订阅前发布的事件不可见。

use crate::distributor::{DistributeError, Distributor, EventStream};
use async_trait::async_trait;
use domain::{ChannelKind, ChatEvent, TenantKeyspace};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::{broadcast, mpsc};

const CHANNEL_CAPACITY: usize = 256;

#[derive(Default)]
pub struct LocalDistributor {
    channels: Mutex<HashMap<String, broadcast::Sender<ChatEvent>>>,
}

impl LocalDistributor {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender_for(&self, channel: &str) -> broadcast::Sender<ChatEvent> {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

#[async_trait]
impl Distributor for LocalDistributor {
    async fn publish(
        &self,
        keyspace: &TenantKeyspace,
        event: &ChatEvent,
    ) -> Result<(), DistributeError> {
        let channel = keyspace.channel(event.channel_kind());
        let sender = self.sender_for(&channel);
        // 没有订阅者不算失败
        let _ = sender.send(event.clone());
        Ok(())
    }

    async fn subscribe(
        &self,
        keyspace: &TenantKeyspace,
        kinds: &[ChannelKind],
    ) -> Result<EventStream, DistributeError> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let mut forwarders = Vec::with_capacity(kinds.len());

        for kind in kinds {
            let channel = keyspace.channel(*kind);
            let mut receiver = self.sender_for(&channel).subscribe();
            let tx = tx.clone();
            forwarders.push(tokio::spawn(async move {
                loop {
                    match receiver.recv().await {
                        Ok(event) => {
                            if tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        // 慢订阅者被挤掉的事件直接丢弃：至多一次
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }));
        }

        Ok(EventStream::new(rx, forwarders))
    }
}
