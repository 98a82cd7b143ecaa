use crate::events::ChatMode;
use serde::{Deserialize, Serialize};

/// 租户级设置
///
/// 未设置的字段回退到全局配置默认值。限流窗口与上限是
/// 租户可配置的，经缓存层读取。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantSettings {
    pub mode: ChatMode,
    #[serde(default)]
    pub rate_limit: Option<u32>,
    #[serde(default)]
    pub rate_window_secs: Option<u64>,
    #[serde(default)]
    pub history_limit: Option<u32>,
}

impl Default for TenantSettings {
    fn default() -> Self {
        Self {
            mode: ChatMode::Both,
            rate_limit: None,
            rate_window_secs: None,
            history_limit: None,
        }
    }
}
