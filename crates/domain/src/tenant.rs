//! 租户标识与键空间
//!
//! 多个租户共享同一套缓存和消息代理进程，所有缓存键和频道名
//! 必须经过键空间函数生成，租户之间不允许出现任何键碰撞。

use crate::errors::{DomainError, DomainResult};
use crate::events::ChannelKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 租户标识
///
/// 合法形式为小写字母、数字、`-`、`_` 组成的 slug，最长 64 字符。
/// 冒号被排除在合法字符之外，这是键空间无碰撞的前提。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub const MAX_LEN: usize = 64;

    pub fn new(raw: impl Into<String>) -> DomainResult<Self> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(DomainError::validation("tenant", "must not be empty"));
        }
        if raw.len() > Self::MAX_LEN {
            return Err(DomainError::validation("tenant", "slug too long"));
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        {
            return Err(DomainError::validation(
                "tenant",
                "slug may only contain [a-z0-9-_]",
            ));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 租户键空间
///
/// 唯一允许产生缓存键和频道名的地方。前缀为 `chat:{tenant}:`，
/// 租户 slug 不能包含冒号，因此两个不同租户生成的键永远不同。
#[derive(Debug, Clone)]
pub struct TenantKeyspace {
    tenant: TenantId,
    prefix: String,
}

impl TenantKeyspace {
    pub fn new(tenant: TenantId) -> Self {
        let prefix = format!("chat:{}:", tenant.as_str());
        Self { tenant, prefix }
    }

    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// 生成缓存键：`chat:{tenant}:{logical}`
    pub fn key(&self, logical: &str) -> String {
        format!("{}{}", self.prefix, logical)
    }

    /// 生成频道名：`chat:{tenant}:channel:{kind}`
    pub fn channel(&self, kind: ChannelKind) -> String {
        format!("{}channel:{}", self.prefix, kind.as_str())
    }
}
