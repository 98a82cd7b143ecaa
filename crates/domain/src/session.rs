use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 观众会话
///
/// 把（租户、昵称、连接令牌）映射到存活元数据。注册时创建，
/// 心跳时刷新，超过不活跃窗口后过期。私信可达性和在线人数
/// 都以会话为依据。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub nick: String,
    pub token: Uuid,
    pub remote_addr: String,
    pub last_seen: DateTime<Utc>,
}

impl Session {
    pub fn new(nick: impl Into<String>, remote_addr: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            nick: nick.into(),
            token: Uuid::new_v4(),
            remote_addr: remote_addr.into(),
            last_seen: now,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_seen = now;
    }

    pub fn is_expired(&self, now: DateTime<Utc>, inactivity: Duration) -> bool {
        now.signed_duration_since(self.last_seen) > inactivity
    }
}
