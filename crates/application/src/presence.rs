//! 会话登记与在线状态
//!
//! 会话存在共享状态的租户哈希表里，字段为 `昵称:令牌`。
//! 心跳刷新 last_seen，超过不活跃窗口的会话在读取时被惰性
//! 剔除。私信可达性和在线人数都从这里取。

use crate::clock::Clock;
use crate::distributor::Distributor;
use crate::shared_state::SharedStateClient;
use chrono::Duration as ChronoDuration;
use domain::{ChatEvent, DomainError, DomainResult, Session, TenantKeyspace};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

const SESSIONS_KEY: &str = "sessions";

pub struct SessionRegistry {
    state: Arc<dyn SharedStateClient>,
    distributor: Arc<dyn Distributor>,
    clock: Arc<dyn Clock>,
    inactivity: ChronoDuration,
}

impl SessionRegistry {
    pub fn new(
        state: Arc<dyn SharedStateClient>,
        distributor: Arc<dyn Distributor>,
        clock: Arc<dyn Clock>,
        inactivity: std::time::Duration,
    ) -> Self {
        let inactivity = ChronoDuration::from_std(inactivity)
            .unwrap_or_else(|_| ChronoDuration::seconds(300));
        Self {
            state,
            distributor,
            clock,
            inactivity,
        }
    }

    fn field(nick: &str, token: Uuid) -> String {
        format!("{}:{}", nick, token)
    }

    /// 注册会话并广播在线状态变化
    pub async fn register(
        &self,
        keyspace: &TenantKeyspace,
        nick: &str,
        addr: &str,
    ) -> DomainResult<Session> {
        if nick.trim().is_empty() {
            return Err(DomainError::validation("nick", "must not be empty"));
        }
        let session = Session::new(nick, addr, self.clock.now());
        self.write(keyspace, &session).await?;
        self.publish_presence(keyspace).await;
        Ok(session)
    }

    /// 心跳：刷新 last_seen
    pub async fn heartbeat(
        &self,
        keyspace: &TenantKeyspace,
        nick: &str,
        token: Uuid,
    ) -> DomainResult<()> {
        let key = keyspace.key(SESSIONS_KEY);
        let field = Self::field(nick, token);
        let raw = self
            .state
            .hash_get(&key, &field)
            .await
            .map_err(DomainError::from)?
            .ok_or_else(|| DomainError::validation("session", "unknown session"))?;

        let mut session: Session = serde_json::from_str(&raw)
            .map_err(|e| DomainError::invariant(format!("corrupt session record: {}", e)))?;
        session.touch(self.clock.now());
        self.write(keyspace, &session).await
    }

    /// 注销会话并广播在线状态变化
    pub async fn disconnect(
        &self,
        keyspace: &TenantKeyspace,
        nick: &str,
        token: Uuid,
    ) -> DomainResult<()> {
        let key = keyspace.key(SESSIONS_KEY);
        self.state
            .hash_del(&key, &Self::field(nick, token))
            .await
            .map_err(DomainError::from)?;
        self.publish_presence(keyspace).await;
        Ok(())
    }

    /// 当前活跃会话；过期会话被惰性剔除
    pub async fn active_sessions(&self, keyspace: &TenantKeyspace) -> DomainResult<Vec<Session>> {
        let key = keyspace.key(SESSIONS_KEY);
        let entries = self
            .state
            .hash_get_all(&key)
            .await
            .map_err(DomainError::from)?;

        let now = self.clock.now();
        let mut active = Vec::new();
        for (field, raw) in entries {
            let session: Session = match serde_json::from_str(&raw) {
                Ok(session) => session,
                Err(err) => {
                    warn!(field, error = %err, "会话记录损坏，剔除");
                    let _ = self.state.hash_del(&key, &field).await;
                    continue;
                }
            };
            if session.is_expired(now, self.inactivity) {
                debug!(field, "会话过期，剔除");
                let _ = self.state.hash_del(&key, &field).await;
            } else {
                active.push(session);
            }
        }
        Ok(active)
    }

    /// 在线昵称列表（去重、排序）与人数
    pub async fn online_users(
        &self,
        keyspace: &TenantKeyspace,
    ) -> DomainResult<(usize, Vec<String>)> {
        let sessions = self.active_sessions(keyspace).await?;
        let mut nicks: Vec<String> = sessions.into_iter().map(|s| s.nick).collect();
        nicks.sort();
        nicks.dedup();
        Ok((nicks.len(), nicks))
    }

    /// 私信投递前的可达性判断
    pub async fn is_reachable(&self, keyspace: &TenantKeyspace, nick: &str) -> DomainResult<bool> {
        let sessions = self.active_sessions(keyspace).await?;
        Ok(sessions.iter().any(|s| s.nick == nick))
    }

    async fn write(&self, keyspace: &TenantKeyspace, session: &Session) -> DomainResult<()> {
        let key = keyspace.key(SESSIONS_KEY);
        let raw = serde_json::to_string(session)
            .map_err(|e| DomainError::invariant(e.to_string()))?;
        self.state
            .hash_set(&key, &Self::field(&session.nick, session.token), &raw)
            .await
            .map_err(DomainError::from)
    }

    /// 在线状态广播失败不影响调用方
    async fn publish_presence(&self, keyspace: &TenantKeyspace) {
        match self.online_users(keyspace).await {
            Ok((count, users)) => {
                let event = ChatEvent::PresenceChanged { count, users };
                if let Err(err) = self.distributor.publish(keyspace, &event).await {
                    warn!(tenant = %keyspace.tenant(), error = %err, "在线状态广播失败");
                }
            }
            Err(err) => {
                warn!(tenant = %keyspace.tenant(), error = %err, "在线状态读取失败");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::local_distributor::LocalDistributor;
    use crate::shared_state::MemorySharedState;
    use chrono::Utc;
    use domain::TenantId;
    use std::time::Duration;

    fn registry(clock: Arc<ManualClock>) -> SessionRegistry {
        SessionRegistry::new(
            Arc::new(MemorySharedState::new()),
            Arc::new(LocalDistributor::new()),
            clock,
            Duration::from_secs(60),
        )
    }

    fn keyspace() -> TenantKeyspace {
        TenantKeyspace::new(TenantId::new("radio-one").unwrap())
    }

    #[tokio::test]
    async fn register_then_reachable() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let registry = registry(clock);
        let ks = keyspace();

        registry.register(&ks, "alice", "1.2.3.4").await.unwrap();
        assert!(registry.is_reachable(&ks, "alice").await.unwrap());
        assert!(!registry.is_reachable(&ks, "bob").await.unwrap());
    }

    #[tokio::test]
    async fn sessions_expire_without_heartbeat() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let registry = registry(Arc::clone(&clock));
        let ks = keyspace();

        let session = registry.register(&ks, "alice", "1.2.3.4").await.unwrap();

        clock.advance(chrono::Duration::seconds(45));
        registry
            .heartbeat(&ks, "alice", session.token)
            .await
            .unwrap();

        // 心跳把窗口往后推了
        clock.advance(chrono::Duration::seconds(45));
        assert!(registry.is_reachable(&ks, "alice").await.unwrap());

        clock.advance(chrono::Duration::seconds(61));
        assert!(!registry.is_reachable(&ks, "alice").await.unwrap());
    }

    #[tokio::test]
    async fn online_users_dedups_multiple_connections() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let registry = registry(clock);
        let ks = keyspace();

        registry.register(&ks, "alice", "1.2.3.4").await.unwrap();
        registry.register(&ks, "alice", "1.2.3.4").await.unwrap();
        registry.register(&ks, "bob", "5.6.7.8").await.unwrap();

        let (count, users) = registry.online_users(&ks).await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(users, vec!["alice".to_string(), "bob".to_string()]);
    }

    #[tokio::test]
    async fn heartbeat_for_unknown_session_fails() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let registry = registry(clock);
        let ks = keyspace();

        let result = registry.heartbeat(&ks, "ghost", Uuid::new_v4()).await;
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }
}
