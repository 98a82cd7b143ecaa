//! 经由消息代理广播的聊天事件
//!
//! 事件按（租户、频道种类）发布，订阅方只收到订阅之后发布的
//! 事件，不做回放。

use crate::message::{ChatMessage, PrivateMessage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 频道种类
///
/// 每个租户按用途各有一个逻辑频道，频道名由键空间生成。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelKind {
    PublicMessages,
    Presence,
    PrivateMessages,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PublicMessages => "public-messages",
            Self::Presence => "presence",
            Self::PrivateMessages => "private-messages",
        }
    }
}

/// 广播事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// 新的公开消息
    MessagePosted { message: ChatMessage },

    /// 单条消息被删除
    MessageDeleted { message_id: Uuid },

    /// 租户全量清空标记
    Cleared { at: DateTime<Utc> },

    /// 在线状态变化：人数与昵称列表
    PresenceChanged { count: usize, users: Vec<String> },

    /// 聊天模式变更
    ConfigChanged { mode: ChatMode },

    /// 私信（网关按收件人过滤后投递）
    PrivatePosted { message: PrivateMessage },
}

impl ChatEvent {
    /// 事件所属的频道种类
    pub fn channel_kind(&self) -> ChannelKind {
        match self {
            Self::MessagePosted { .. } | Self::MessageDeleted { .. } | Self::Cleared { .. } => {
                ChannelKind::PublicMessages
            }
            Self::PresenceChanged { .. } | Self::ConfigChanged { .. } => ChannelKind::Presence,
            Self::PrivatePosted { .. } => ChannelKind::PrivateMessages,
        }
    }
}

/// 租户聊天模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatMode {
    Public,
    Private,
    Both,
}

impl ChatMode {
    pub fn includes_public(&self) -> bool {
        matches!(self, Self::Public | Self::Both)
    }

    pub fn includes_private(&self) -> bool {
        matches!(self, Self::Private | Self::Both)
    }

    /// 该模式下网关需要订阅的频道集合
    pub fn channel_kinds(&self) -> Vec<ChannelKind> {
        let mut kinds = vec![ChannelKind::Presence];
        if self.includes_public() {
            kinds.push(ChannelKind::PublicMessages);
        }
        if self.includes_private() {
            kinds.push(ChannelKind::PrivateMessages);
        }
        kinds
    }
}
