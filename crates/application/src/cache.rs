//! 旁路缓存层
//!
//! 读先查缓存，未命中回源再以短 TTL 回填。分钟级 TTL 限定
//! 未显式失效的版主操作造成的脏读时长；显式操作必须在返回前
//! 同步调用 `invalidate`。

use crate::shared_state::SharedStateClient;
use domain::{DomainError, DomainResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct CacheLayer {
    state: Arc<dyn SharedStateClient>,
    ttl: Duration,
}

impl CacheLayer {
    pub fn new(state: Arc<dyn SharedStateClient>, ttl: Duration) -> Self {
        Self { state, ttl }
    }

    /// 读穿透：命中返回缓存值，未命中执行 `loader` 并回填。
    /// 缓存本身不可达时退化为直接回源；回源失败的错误原样向上。
    pub async fn get_with<T, F, Fut>(&self, key: &str, loader: F) -> DomainResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = DomainResult<T>>,
    {
        match self.state.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    warn!(key, error = %err, "缓存值损坏，回源重建");
                }
            },
            Ok(None) => {}
            Err(err) => {
                debug!(key, error = %err, "缓存不可达，直接回源");
            }
        }

        let value = loader().await?;

        match serde_json::to_string(&value) {
            Ok(raw) => {
                if let Err(err) = self.state.set_ex(key, &raw, self.ttl).await {
                    debug!(key, error = %err, "缓存回填失败");
                }
            }
            Err(err) => {
                warn!(key, error = %err, "缓存值序列化失败");
            }
        }

        Ok(value)
    }

    /// 同步失效。失败向上抛出：显式的版主操作不允许带着
    /// 可能脏的缓存静默返回。
    pub async fn invalidate(&self, key: &str) -> DomainResult<()> {
        self.state
            .del(key)
            .await
            .map_err(|err| DomainError::transient(err.to_string()))
    }
}
