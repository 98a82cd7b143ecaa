//! 事件分发器的 Redis Pub/Sub 实现
//!
//! 发布走 ConnectionManager；订阅为每个事件流起一个后台任务，
//! 代理读错误在任务内部重订阅，不向客户端暴露。订阅方丢弃
//! 事件流后任务随之退出。

use crate::redis::error::{RedisInfraError, RedisInfraResult};
use application::{DistributeError, Distributor, EventStream};
use async_trait::async_trait;
use domain::{ChannelKind, ChatEvent, TenantKeyspace};
use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

const EVENT_BUFFER: usize = 256;
const MAX_RESUBSCRIBE_RETRIES: u32 = 5;

pub struct RedisDistributor {
    client: Client,
    manager: ConnectionManager,
}

impl RedisDistributor {
    pub async fn connect(url: &str) -> RedisInfraResult<Self> {
        let client = Client::open(url).map_err(|e| {
            RedisInfraError::config(format!("invalid redis url: {}", e))
        })?;
        let manager = ConnectionManager::new(client.clone()).await.map_err(|e| {
            RedisInfraError::connection(format!("cannot reach redis: {}", e))
        })?;
        info!("Redis 分发器已连接");
        Ok(Self { client, manager })
    }

    /// 订阅循环：建连、订阅、转发，读错误退避后重订阅
    async fn subscribe_loop(
        client: Client,
        channels: Vec<String>,
        tx: mpsc::Sender<ChatEvent>,
    ) {
        let mut retries: u32 = 0;

        loop {
            if tx.is_closed() {
                return;
            }

            let mut pubsub = match client.get_async_pubsub().await {
                Ok(pubsub) => pubsub,
                Err(err) => {
                    retries += 1;
                    if retries > MAX_RESUBSCRIBE_RETRIES {
                        error!(error = %err, "订阅连接失败，已达最大重试次数");
                        return;
                    }
                    warn!(error = %err, retries, "订阅连接失败，退避重试");
                    sleep(Duration::from_millis(100 * 2_u64.pow(retries.min(6)))).await;
                    continue;
                }
            };

            if let Err(err) = pubsub.subscribe(&channels).await {
                retries += 1;
                if retries > MAX_RESUBSCRIBE_RETRIES {
                    error!(error = %err, "订阅失败，已达最大重试次数");
                    return;
                }
                warn!(error = %err, retries, "订阅失败，退避重试");
                sleep(Duration::from_millis(100 * 2_u64.pow(retries.min(6)))).await;
                continue;
            }

            retries = 0;
            debug!(channels = channels.len(), "订阅已建立");

            let mut stream = pubsub.on_message();
            while let Some(msg) = stream.next().await {
                let payload: String = match msg.get_payload() {
                    Ok(payload) => payload,
                    Err(err) => {
                        warn!(error = %err, "事件载荷读取失败，丢弃");
                        continue;
                    }
                };
                match serde_json::from_str::<ChatEvent>(&payload) {
                    Ok(event) => {
                        if tx.send(event).await.is_err() {
                            // 订阅方已放弃事件流
                            return;
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "事件反序列化失败，丢弃");
                    }
                }
            }

            // 消息流结束意味着连接断开：内部重订阅，不向客户端暴露
            debug!("订阅连接断开，重订阅");
        }
    }
}

#[async_trait]
impl Distributor for RedisDistributor {
    async fn publish(
        &self,
        keyspace: &TenantKeyspace,
        event: &ChatEvent,
    ) -> Result<(), DistributeError> {
        let channel = keyspace.channel(event.channel_kind());
        let payload = serde_json::to_string(event)
            .map_err(|e| DistributeError::publish(format!("serialize event: {}", e)))?;

        let mut conn = self.manager.clone();
        let subscriber_count: u32 = conn
            .publish(&channel, payload)
            .await
            .map_err(|e| DistributeError::publish(e.to_string()))?;
        debug!(channel, subscriber_count, "事件已发布");
        Ok(())
    }

    async fn subscribe(
        &self,
        keyspace: &TenantKeyspace,
        kinds: &[ChannelKind],
    ) -> Result<EventStream, DistributeError> {
        let channels: Vec<String> = kinds.iter().map(|kind| keyspace.channel(*kind)).collect();
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);

        let handle = tokio::spawn(Self::subscribe_loop(self.client.clone(), channels, tx));

        Ok(EventStream::new(rx, vec![handle]))
    }
}
