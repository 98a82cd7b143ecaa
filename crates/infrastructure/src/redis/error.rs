//! Redis 错误定义

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RedisInfraError {
    #[error("redis config error: {message}")]
    Config { message: String },

    #[error("redis connection error: {message}")]
    Connection { message: String },

    #[error("redis command error: {message}")]
    Command { message: String },
}

impl RedisInfraError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn command(message: impl Into<String>) -> Self {
        Self::Command {
            message: message.into(),
        }
    }
}

pub type RedisInfraResult<T> = Result<T, RedisInfraError>;
