//! 审核账本
//!
//! 准入判定（封禁检查 + 限流）、违规计数升级、封禁管理。
//! 封禁检查在基础设施故障时拒绝放行（fail closed），限流在
//! 故障时放行（fail open）：封禁是安全控制，限流只是性能控制。

use crate::cache::CacheLayer;
use crate::clock::Clock;
use crate::shared_state::SharedStateClient;
use chrono::Duration as ChronoDuration;
use domain::{
    BanRecord, BanRepository, BanSubject, DenyCategory, DomainError, DomainResult, TenantKeyspace,
    ViolationCategory,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// 发送方身份：昵称 + 网络地址
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderIdentity {
    pub nick: String,
    pub addr: String,
}

/// 准入判定结果
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Admit,
    Deny(DenyCategory),
}

/// 限流配额（租户可覆盖）
#[derive(Debug, Clone, Copy)]
pub struct RateQuota {
    pub limit: u32,
    pub window: Duration,
}

/// 违规升级与自动封禁参数
#[derive(Debug, Clone)]
pub struct ModerationParams {
    pub violation_threshold: u64,
    pub violation_ttl: Duration,
    pub autoban_duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViolationOutcome {
    pub count: u64,
    pub auto_banned: bool,
}

pub struct ModerationLedger {
    state: Arc<dyn SharedStateClient>,
    cache: CacheLayer,
    bans: Arc<dyn BanRepository>,
    clock: Arc<dyn Clock>,
    params: ModerationParams,
}

impl ModerationLedger {
    pub fn new(
        state: Arc<dyn SharedStateClient>,
        cache: CacheLayer,
        bans: Arc<dyn BanRepository>,
        clock: Arc<dyn Clock>,
        params: ModerationParams,
    ) -> Self {
        Self {
            state,
            cache,
            bans,
            clock,
            params,
        }
    }

    /// 准入判定：封禁检查在前，限流在后
    pub async fn evaluate(
        &self,
        keyspace: &TenantKeyspace,
        sender: &SenderIdentity,
        quota: RateQuota,
    ) -> DomainResult<Verdict> {
        let subjects = [
            BanSubject::Address(sender.addr.clone()),
            BanSubject::Nickname(sender.nick.clone()),
        ];
        for subject in &subjects {
            match self.active_ban(keyspace, subject).await {
                Ok(Some(record)) => {
                    info!(
                        tenant = %keyspace.tenant(),
                        subject = %record.subject,
                        "发送方被封禁，拒绝"
                    );
                    return Ok(Verdict::Deny(DenyCategory::Banned));
                }
                Ok(None) => {}
                Err(err) => {
                    // 封禁状态未知时拒绝放行
                    warn!(
                        tenant = %keyspace.tenant(),
                        subject = %subject,
                        error = %err,
                        "封禁检查不可用，fail closed"
                    );
                    return Ok(Verdict::Deny(DenyCategory::Banned));
                }
            }
        }

        let rate_key = keyspace.key(&format!("rate:{}", sender.addr));
        match self
            .state
            .incr_fixed_window(&rate_key, quota.window)
            .await
        {
            Ok(count) if count > u64::from(quota.limit) => {
                let retry_after = self
                    .state
                    .ttl_remaining(&rate_key)
                    .await
                    .ok()
                    .flatten()
                    .unwrap_or(quota.window);
                Ok(Verdict::Deny(DenyCategory::RateLimited {
                    retry_after_secs: retry_after.as_secs().max(1),
                }))
            }
            Ok(_) => Ok(Verdict::Admit),
            Err(err) => {
                // 限流计数不可用时放行
                warn!(
                    tenant = %keyspace.tenant(),
                    error = %err,
                    "限流计数不可用，fail open"
                );
                Ok(Verdict::Admit)
            }
        }
    }

    /// 记录一次违规；滑动窗口内越过阈值触发自动定时封禁。
    /// 这是系统唯一的自动执法路径。
    pub async fn record_violation(
        &self,
        keyspace: &TenantKeyspace,
        category: ViolationCategory,
        addr: &str,
    ) -> DomainResult<ViolationOutcome> {
        let key = keyspace.key(&format!("violations:{}:{}", category.as_str(), addr));
        let count = self
            .state
            .incr_sliding(&key, self.params.violation_ttl)
            .await?;

        if count >= self.params.violation_threshold {
            let now = self.clock.now();
            let until = now
                + ChronoDuration::from_std(self.params.autoban_duration)
                    .map_err(|e| DomainError::invariant(e.to_string()))?;
            let record = BanRecord::timeboxed(
                BanSubject::Address(addr.to_string()),
                format!("automatic ban: {} violations in window", category.as_str()),
                "system",
                now,
                until,
            );
            self.ban(keyspace, &record).await?;
            info!(
                tenant = %keyspace.tenant(),
                addr,
                category = category.as_str(),
                count,
                "违规越过阈值，自动封禁"
            );
            return Ok(ViolationOutcome {
                count,
                auto_banned: true,
            });
        }

        Ok(ViolationOutcome {
            count,
            auto_banned: false,
        })
    }

    /// 版主手动封禁：无时长即永久
    pub async fn issue_ban(
        &self,
        keyspace: &TenantKeyspace,
        subject: BanSubject,
        reason: &str,
        actor: &str,
        duration: Option<Duration>,
    ) -> DomainResult<BanRecord> {
        let now = self.clock.now();
        let record = match duration {
            Some(duration) => {
                let until = now
                    + ChronoDuration::from_std(duration)
                        .map_err(|e| DomainError::validation("duration", e.to_string()))?;
                BanRecord::timeboxed(subject, reason, actor, now, until)
            }
            None => BanRecord::permanent(subject, reason, actor, now),
        };
        self.ban(keyspace, &record).await?;
        Ok(record)
    }

    /// 写入封禁并同步失效缓存，返回后下一次 evaluate 立即可见
    pub async fn ban(&self, keyspace: &TenantKeyspace, record: &BanRecord) -> DomainResult<()> {
        self.bans
            .upsert(keyspace.tenant(), record)
            .await
            .map_err(DomainError::from)?;
        self.cache
            .invalidate(&keyspace.key(&record.subject.logical_key()))
            .await?;
        Ok(())
    }

    /// 解除封禁并同步失效缓存
    pub async fn unban(
        &self,
        keyspace: &TenantKeyspace,
        subject: &BanSubject,
    ) -> DomainResult<bool> {
        let removed = self
            .bans
            .remove(keyspace.tenant(), subject)
            .await
            .map_err(DomainError::from)?;
        self.cache
            .invalidate(&keyspace.key(&subject.logical_key()))
            .await?;
        Ok(removed)
    }

    pub async fn list_bans(&self, keyspace: &TenantKeyspace) -> DomainResult<Vec<BanRecord>> {
        self.bans
            .list_active(keyspace.tenant(), self.clock.now())
            .await
            .map_err(DomainError::from)
    }

    /// 显式清理扫除：删除已过期的封禁行
    pub async fn sweep_expired(&self, keyspace: &TenantKeyspace) -> DomainResult<u64> {
        self.bans
            .sweep_expired(keyspace.tenant(), self.clock.now())
            .await
            .map_err(DomainError::from)
    }

    /// 过期记录视同不存在，但不在这里删除（惰性过期）
    async fn active_ban(
        &self,
        keyspace: &TenantKeyspace,
        subject: &BanSubject,
    ) -> DomainResult<Option<BanRecord>> {
        let key = keyspace.key(&subject.logical_key());
        let tenant = keyspace.tenant().clone();
        let bans = Arc::clone(&self.bans);
        let subject_owned = subject.clone();

        let cached: Option<BanRecord> = self
            .cache
            .get_with(&key, move || async move {
                bans.find(&tenant, &subject_owned)
                    .await
                    .map_err(DomainError::from)
            })
            .await?;

        Ok(cached.filter(|record| record.is_active(self.clock.now())))
    }
}
