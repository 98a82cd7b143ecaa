//! 领域模型错误定义
//!
//! 四类错误构成整个系统的错误分类：输入校验失败、策略拒绝、
//! 基础设施瞬时故障、程序不变量被破坏。

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 拒绝类别
///
/// 每个被拒绝的请求必须携带可区分的类别，调用方据此决定
/// 重试、退避或放弃。序列化为 kebab-case 供客户端使用。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "kebab-case")]
pub enum DenyCategory {
    /// 触发限流，附带重试等待秒数
    RateLimited { retry_after_secs: u64 },
    /// 发送方被封禁（按网络地址或昵称）
    Banned,
    /// 命中内容拦截模式
    BlockedPattern { patterns: Vec<String> },
    /// 消息超长
    TooLong { length: usize, max: usize },
    /// 私信收件人不在线
    RecipientUnreachable,
}

impl DenyCategory {
    /// 类别标识符，用于日志和违规计数
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate-limited",
            Self::Banned => "banned",
            Self::BlockedPattern { .. } => "blocked-pattern",
            Self::TooLong { .. } => "too-long",
            Self::RecipientUnreachable => "recipient-unreachable",
        }
    }
}

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// 输入形状错误，永不重试
    #[error("validation failed: {field}: {message}")]
    Validation { field: String, message: String },

    /// 策略拒绝，必须带类别返回给发送方
    #[error("denied: {0:?}")]
    Denied(DenyCategory),

    /// 存储或消息代理不可达，内部有限次重试后向上暴露
    #[error("transient infrastructure failure: {message}")]
    Transient { message: String },

    /// 程序不变量被破坏，记录日志并中止当前请求
    #[error("invariant violated: {message}")]
    Invariant { message: String },
}

impl DomainError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn denied(category: DenyCategory) -> Self {
        Self::Denied(category)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            message: message.into(),
        }
    }

    /// 是否属于可内部重试的瞬时故障
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// 领域模型结果类型
pub type DomainResult<T> = Result<T, DomainError>;

/// 仓储层错误
///
/// 仓储实现把驱动错误归入这三类，应用层再映射到 DomainError。
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("requested row not found")]
    NotFound,

    #[error("conflicting row already exists")]
    Conflict,

    #[error("storage error: {message}")]
    Storage { message: String },
}

impl RepositoryError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

impl From<RepositoryError> for DomainError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => DomainError::validation("id", "row not found"),
            RepositoryError::Conflict => DomainError::invariant("conflicting row"),
            RepositoryError::Storage { message } => DomainError::Transient { message },
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;
