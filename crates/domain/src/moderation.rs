//! 封禁与违规计数的领域类型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 封禁对象：网络地址或昵称
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum BanSubject {
    Address(String),
    Nickname(String),
}

impl BanSubject {
    /// 缓存键里的逻辑后缀，例如 `bans:addr:1.2.3.4`
    pub fn logical_key(&self) -> String {
        match self {
            Self::Address(addr) => format!("bans:addr:{}", addr),
            Self::Nickname(nick) => format!("bans:nick:{}", nick),
        }
    }
}

impl fmt::Display for BanSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(addr) => write!(f, "addr:{}", addr),
            Self::Nickname(nick) => write!(f, "nick:{}", nick),
        }
    }
}

/// 封禁记录
///
/// `expires_at` 为空表示永久封禁。过期记录视同不存在，但不会
/// 被急切删除（惰性过期），清理由显式的后台扫除完成。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanRecord {
    pub subject: BanSubject,
    pub reason: String,
    pub issued_by: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl BanRecord {
    pub fn permanent(
        subject: BanSubject,
        reason: impl Into<String>,
        issued_by: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            subject,
            reason: reason.into(),
            issued_by: issued_by.into(),
            issued_at: now,
            expires_at: None,
        }
    }

    pub fn timeboxed(
        subject: BanSubject,
        reason: impl Into<String>,
        issued_by: impl Into<String>,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Self {
        Self {
            subject,
            reason: reason.into(),
            issued_by: issued_by.into(),
            issued_at: now,
            expires_at: Some(until),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(until) if until <= now)
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired(now)
    }
}

/// 违规类别
///
/// 违规计数按（类别、网络地址）累加，滑动过期；
/// 越过阈值触发自动定时封禁。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationCategory {
    /// 私信中反复出现被拦截的链接
    BlockedUrl,
    /// 反复触发限流
    RateAbuse,
}

impl ViolationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BlockedUrl => "blocked_url",
            Self::RateAbuse => "rate_abuse",
        }
    }
}


/// 内容拦截模式
///
/// 版主维护的私信链接拒绝列表条目，子串或正则两种形式。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterPattern {
    pub id: uuid::Uuid,
    pub pattern: String,
    pub is_regex: bool,
}
