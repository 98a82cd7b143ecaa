//! 流式帧
//!
//! 网关发往客户端的全部帧种类。`error` 是终止帧，连接随后
//! 关闭；`reconnect` 要求客户端重新建立连接。

use domain::{ChatMessage, ChatMode, PrivateMessage};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamFrame {
    /// 连接时一次性下发的历史批次，新的在前
    History { messages: Vec<ChatMessage> },
    /// 单条新公开消息
    Message { message: ChatMessage },
    /// 单条消息被删除
    MessageDeleted { message_id: Uuid },
    /// 全量清空标记
    Clear { at: chrono::DateTime<chrono::Utc> },
    /// 在线人数与昵称列表
    Users { count: usize, users: Vec<String> },
    /// 当前聊天模式
    Config { mode: ChatMode },
    /// 私信（已按收件人过滤）
    Private { message: PrivateMessage },
    /// 保活
    Ping,
    /// 终止错误，连接将关闭
    Error { code: String },
    /// 客户端必须重新建立连接
    Reconnect,
}
