//! 共享状态客户端的 Redis 实现
//!
//! 计数用 INCR 原子自增：固定窗口只在计数为 1 时设置过期，
//! 滑动过期每次自增后刷新 TTL。连接走 ConnectionManager，
//! 断线自动重连。

use crate::redis::error::{RedisInfraError, RedisInfraResult};
use application::{SharedStateClient, SharedStateError, SharedStateResult};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

#[derive(Clone)]
pub struct RedisSharedState {
    manager: ConnectionManager,
}

impl RedisSharedState {
    pub async fn connect(url: &str) -> RedisInfraResult<Self> {
        let client = Client::open(url).map_err(|e| {
            RedisInfraError::config(format!("invalid redis url: {}", e))
        })?;
        let manager = ConnectionManager::new(client).await.map_err(|e| {
            RedisInfraError::connection(format!("cannot reach redis: {}", e))
        })?;
        info!("Redis 共享状态客户端已连接");
        Ok(Self { manager })
    }
}

fn command_err(err: redis::RedisError) -> SharedStateError {
    SharedStateError::unreachable(err.to_string())
}

#[async_trait]
impl SharedStateClient for RedisSharedState {
    async fn get(&self, key: &str) -> SharedStateResult<Option<String>> {
        let mut conn = self.manager.clone();
        conn.get(key).await.map_err(command_err)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> SharedStateResult<()> {
        let mut conn = self.manager.clone();
        conn.set_ex(key, value, ttl.as_secs().max(1))
            .await
            .map_err(command_err)
    }

    async fn del(&self, key: &str) -> SharedStateResult<()> {
        let mut conn = self.manager.clone();
        let _: u64 = conn.del(key).await.map_err(command_err)?;
        Ok(())
    }

    async fn incr_fixed_window(&self, key: &str, window: Duration) -> SharedStateResult<u64> {
        let mut conn = self.manager.clone();
        let count: u64 = conn.incr(key, 1u64).await.map_err(command_err)?;
        if count == 1 {
            let _: bool = conn
                .expire(key, window.as_secs().max(1) as i64)
                .await
                .map_err(command_err)?;
        }
        Ok(count)
    }

    async fn incr_sliding(&self, key: &str, ttl: Duration) -> SharedStateResult<u64> {
        let mut conn = self.manager.clone();
        let count: u64 = conn.incr(key, 1u64).await.map_err(command_err)?;
        let _: bool = conn
            .expire(key, ttl.as_secs().max(1) as i64)
            .await
            .map_err(command_err)?;
        Ok(count)
    }

    async fn ttl_remaining(&self, key: &str) -> SharedStateResult<Option<Duration>> {
        let mut conn = self.manager.clone();
        let millis: i64 = conn.pttl(key).await.map_err(command_err)?;
        // -1 无过期，-2 键不存在
        if millis < 0 {
            return Ok(None);
        }
        Ok(Some(Duration::from_millis(millis as u64)))
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> SharedStateResult<()> {
        let mut conn = self.manager.clone();
        let _: u64 = conn.hset(key, field, value).await.map_err(command_err)?;
        Ok(())
    }

    async fn hash_get(&self, key: &str, field: &str) -> SharedStateResult<Option<String>> {
        let mut conn = self.manager.clone();
        conn.hget(key, field).await.map_err(command_err)
    }

    async fn hash_get_all(&self, key: &str) -> SharedStateResult<Vec<(String, String)>> {
        let mut conn = self.manager.clone();
        let map: HashMap<String, String> = conn.hgetall(key).await.map_err(command_err)?;
        Ok(map.into_iter().collect())
    }

    async fn hash_del(&self, key: &str, field: &str) -> SharedStateResult<()> {
        let mut conn = self.manager.clone();
        let _: u64 = conn.hdel(key, field).await.map_err(command_err)?;
        Ok(())
    }
}
