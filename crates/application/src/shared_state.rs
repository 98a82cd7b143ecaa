//! 共享状态客户端接缝
//!
//! 计数器、封禁缓存、会话表都通过这个接口访问共享的
//! 缓存进程，没有环境全局量。所有键都已经过租户键空间。

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SharedStateError {
    #[error("shared state unreachable: {message}")]
    Unreachable { message: String },

    #[error("stored value corrupt: {message}")]
    Corrupt { message: String },
}

impl SharedStateError {
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Unreachable {
            message: message.into(),
        }
    }

    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt {
            message: message.into(),
        }
    }
}

pub type SharedStateResult<T> = Result<T, SharedStateError>;

/// 共享状态客户端
///
/// 计数操作必须是带过期的原子自增，不允许读-改-写。
/// 固定窗口只在首次自增时设置过期；滑动过期每次自增都刷新。
#[async_trait]
pub trait SharedStateClient: Send + Sync {
    async fn get(&self, key: &str) -> SharedStateResult<Option<String>>;

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> SharedStateResult<()>;

    async fn del(&self, key: &str) -> SharedStateResult<()>;

    /// 固定窗口计数：返回自增后的值，窗口到期整体清零
    async fn incr_fixed_window(&self, key: &str, window: Duration) -> SharedStateResult<u64>;

    /// 滑动过期计数：返回自增后的值，每次自增刷新 TTL
    async fn incr_sliding(&self, key: &str, ttl: Duration) -> SharedStateResult<u64>;

    /// 键的剩余存活时间，键不存在或无过期返回 `None`
    async fn ttl_remaining(&self, key: &str) -> SharedStateResult<Option<Duration>>;

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> SharedStateResult<()>;

    async fn hash_get(&self, key: &str, field: &str) -> SharedStateResult<Option<String>>;

    async fn hash_get_all(&self, key: &str) -> SharedStateResult<Vec<(String, String)>>;

    async fn hash_del(&self, key: &str, field: &str) -> SharedStateResult<()>;
}

enum Value {
    Text(String),
    Counter(u64),
    Hash(HashMap<String, String>),
}

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

/// 内存实现
///
/// 单进程部署和测试使用。过期是惰性的：访问时检查并移除。
#[derive(Default)]
pub struct MemorySharedState {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemorySharedState {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entries<T>(&self, f: impl FnOnce(&mut HashMap<String, Entry>) -> T) -> T {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut entries)
    }

    fn drop_if_expired(entries: &mut HashMap<String, Entry>, key: &str) {
        let now = Instant::now();
        if entries.get(key).map(|e| e.is_expired(now)).unwrap_or(false) {
            entries.remove(key);
        }
    }
}

#[async_trait]
impl SharedStateClient for MemorySharedState {
    async fn get(&self, key: &str) -> SharedStateResult<Option<String>> {
        self.with_entries(|entries| {
            Self::drop_if_expired(entries, key);
            match entries.get(key) {
                Some(Entry {
                    value: Value::Text(text),
                    ..
                }) => Ok(Some(text.clone())),
                Some(_) => Err(SharedStateError::corrupt(format!(
                    "key {} does not hold a text value",
                    key
                ))),
                None => Ok(None),
            }
        })
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> SharedStateResult<()> {
        self.with_entries(|entries| {
            entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Text(value.to_string()),
                    expires_at: Some(Instant::now() + ttl),
                },
            );
            Ok(())
        })
    }

    async fn del(&self, key: &str) -> SharedStateResult<()> {
        self.with_entries(|entries| {
            entries.remove(key);
            Ok(())
        })
    }

    async fn incr_fixed_window(&self, key: &str, window: Duration) -> SharedStateResult<u64> {
        self.with_entries(|entries| {
            Self::drop_if_expired(entries, key);
            let now = Instant::now();
            let entry = entries.entry(key.to_string()).or_insert(Entry {
                value: Value::Counter(0),
                expires_at: Some(now + window),
            });
            match &mut entry.value {
                Value::Counter(count) => {
                    *count += 1;
                    Ok(*count)
                }
                _ => Err(SharedStateError::corrupt(format!(
                    "key {} does not hold a counter",
                    key
                ))),
            }
        })
    }

    async fn incr_sliding(&self, key: &str, ttl: Duration) -> SharedStateResult<u64> {
        self.with_entries(|entries| {
            Self::drop_if_expired(entries, key);
            let now = Instant::now();
            let entry = entries.entry(key.to_string()).or_insert(Entry {
                value: Value::Counter(0),
                expires_at: None,
            });
            entry.expires_at = Some(now + ttl);
            match &mut entry.value {
                Value::Counter(count) => {
                    *count += 1;
                    Ok(*count)
                }
                _ => Err(SharedStateError::corrupt(format!(
                    "key {} does not hold a counter",
                    key
                ))),
            }
        })
    }

    async fn ttl_remaining(&self, key: &str) -> SharedStateResult<Option<Duration>> {
        self.with_entries(|entries| {
            Self::drop_if_expired(entries, key);
            let now = Instant::now();
            Ok(entries
                .get(key)
                .and_then(|e| e.expires_at)
                .map(|at| at.saturating_duration_since(now)))
        })
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> SharedStateResult<()> {
        self.with_entries(|entries| {
            let entry = entries.entry(key.to_string()).or_insert(Entry {
                value: Value::Hash(HashMap::new()),
                expires_at: None,
            });
            match &mut entry.value {
                Value::Hash(map) => {
                    map.insert(field.to_string(), value.to_string());
                    Ok(())
                }
                _ => Err(SharedStateError::corrupt(format!(
                    "key {} does not hold a hash",
                    key
                ))),
            }
        })
    }

    async fn hash_get(&self, key: &str, field: &str) -> SharedStateResult<Option<String>> {
        self.with_entries(|entries| match entries.get(key) {
            Some(Entry {
                value: Value::Hash(map),
                ..
            }) => Ok(map.get(field).cloned()),
            Some(_) => Err(SharedStateError::corrupt(format!(
                "key {} does not hold a hash",
                key
            ))),
            None => Ok(None),
        })
    }

    async fn hash_get_all(&self, key: &str) -> SharedStateResult<Vec<(String, String)>> {
        self.with_entries(|entries| match entries.get(key) {
            Some(Entry {
                value: Value::Hash(map),
                ..
            }) => Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
            Some(_) => Err(SharedStateError::corrupt(format!(
                "key {} does not hold a hash",
                key
            ))),
            None => Ok(Vec::new()),
        })
    }

    async fn hash_del(&self, key: &str, field: &str) -> SharedStateResult<()> {
        self.with_entries(|entries| {
            if let Some(Entry {
                value: Value::Hash(map),
                ..
            }) = entries.get_mut(key)
            {
                map.remove(field);
                if map.is_empty() {
                    entries.remove(key);
                }
            }
            Ok(())
        })
    }
}

impl From<SharedStateError> for domain::DomainError {
    fn from(err: SharedStateError) -> Self {
        domain::DomainError::transient(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_window_resets_after_expiry() {
        let state = MemorySharedState::new();
        let window = Duration::from_millis(50);

        assert_eq!(state.incr_fixed_window("k", window).await.unwrap(), 1);
        assert_eq!(state.incr_fixed_window("k", window).await.unwrap(), 2);

        tokio::time::sleep(Duration::from_millis(70)).await;
        // 窗口到期，计数从头开始
        assert_eq!(state.incr_fixed_window("k", window).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn sliding_counter_refreshes_ttl_on_each_increment() {
        let state = MemorySharedState::new();
        let ttl = Duration::from_millis(80);

        assert_eq!(state.incr_sliding("v", ttl).await.unwrap(), 1);
        tokio::time::sleep(Duration::from_millis(50)).await;
        // 第二次自增刷新 TTL，计数保留
        assert_eq!(state.incr_sliding("v", ttl).await.unwrap(), 2);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(state.incr_sliding("v", ttl).await.unwrap(), 3);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(state.incr_sliding("v", ttl).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn text_values_expire() {
        let state = MemorySharedState::new();
        state
            .set_ex("t", "hello", Duration::from_millis(30))
            .await
            .unwrap();
        assert_eq!(state.get("t").await.unwrap(), Some("hello".to_string()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(state.get("t").await.unwrap(), None);
    }

    #[tokio::test]
    async fn hash_fields_round_trip() {
        let state = MemorySharedState::new();
        state.hash_set("h", "a", "1").await.unwrap();
        state.hash_set("h", "b", "2").await.unwrap();
        let mut all = state.hash_get_all("h").await.unwrap();
        all.sort();
        assert_eq!(
            all,
            vec![("a".into(), "1".into()), ("b".into(), "2".into())]
        );
        state.hash_del("h", "a").await.unwrap();
        assert_eq!(state.hash_get_all("h").await.unwrap().len(), 1);
    }
}
