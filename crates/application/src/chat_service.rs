//! 消息接收管道
//!
//! 入口校验 -> 内容过滤 -> 审核账本准入 -> 持久化 -> 分发。
//! 每次调用独立处理，无全局锁；瞬时故障内部有限次重试。
//! 历史、删除、清空与租户设置也在这里。

use crate::cache::CacheLayer;
use crate::clock::Clock;
use crate::content_filter::{ContentFilter, FilterMode};
use crate::distributor::Distributor;
use crate::moderation::{ModerationLedger, RateQuota, SenderIdentity, Verdict};
use crate::presence::SessionRegistry;
use domain::{
    ChatEvent, ChatMessage, DenyCategory, DomainError, DomainResult, FilterPattern,
    FilterPatternRepository, MessageRepository, PrivateMessage, SettingsRepository, TenantKeyspace,
    TenantSettings, ViolationCategory,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

const HISTORY_CACHE_KEY: &str = "history:recent";
const PATTERNS_CACHE_KEY: &str = "patterns";
const SETTINGS_CACHE_KEY: &str = "settings";

/// 瞬时故障的内部重试次数
const TRANSIENT_RETRIES: u32 = 2;

#[derive(Debug, Clone)]
pub struct ChatParams {
    /// 消息长度上限，过滤前检查
    pub max_message_len: usize,
    /// 默认历史条数（也是缓存的快照大小）
    pub history_limit: u32,
    /// 全局默认限流配额，租户设置可覆盖
    pub default_quota: RateQuota,
}

pub struct ChatServiceDependencies {
    pub messages: Arc<dyn MessageRepository>,
    pub patterns: Arc<dyn FilterPatternRepository>,
    pub settings: Arc<dyn SettingsRepository>,
    pub ledger: Arc<ModerationLedger>,
    pub sessions: Arc<SessionRegistry>,
    pub distributor: Arc<dyn Distributor>,
    pub cache: CacheLayer,
    pub clock: Arc<dyn Clock>,
    pub params: ChatParams,
}

pub struct ChatService {
    messages: Arc<dyn MessageRepository>,
    patterns: Arc<dyn FilterPatternRepository>,
    settings: Arc<dyn SettingsRepository>,
    ledger: Arc<ModerationLedger>,
    sessions: Arc<SessionRegistry>,
    distributor: Arc<dyn Distributor>,
    cache: CacheLayer,
    clock: Arc<dyn Clock>,
    params: ChatParams,
}

impl ChatService {
    pub fn new(deps: ChatServiceDependencies) -> Self {
        Self {
            messages: deps.messages,
            patterns: deps.patterns,
            settings: deps.settings,
            ledger: deps.ledger,
            sessions: deps.sessions,
            distributor: deps.distributor,
            cache: deps.cache,
            clock: deps.clock,
            params: deps.params,
        }
    }

    pub fn ledger(&self) -> &Arc<ModerationLedger> {
        &self.ledger
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// 发布公开消息
    pub async fn post_public_message(
        &self,
        keyspace: &TenantKeyspace,
        sender: &SenderIdentity,
        body: &str,
        reply_to: Option<Uuid>,
        attachment_id: Option<String>,
    ) -> DomainResult<ChatMessage> {
        self.check_length(body)?;

        let settings = self.effective_settings(keyspace).await?;
        if !settings.mode.includes_public() {
            return Err(DomainError::validation("mode", "public chat is disabled"));
        }

        // 公开模式不读拒绝列表：链接一律剥除
        let outcome = ContentFilter::filter(body, FilterMode::Public, &[]);

        self.admit(keyspace, sender, &settings).await?;

        let message = ChatMessage::new(
            keyspace.tenant().clone(),
            sender.nick.clone(),
            outcome.filtered,
            reply_to,
            attachment_id,
            self.clock.now(),
        )?;

        let messages = &self.messages;
        with_retry("append message", || async {
            messages.append(&message).await.map_err(DomainError::from)
        })
        .await?;
        self.cache
            .invalidate(&keyspace.key(HISTORY_CACHE_KEY))
            .await?;

        self.publish(keyspace, &ChatEvent::MessagePosted {
            message: message.clone(),
        })
        .await;

        info!(
            tenant = %keyspace.tenant(),
            message_id = %message.id,
            sender = %sender.nick,
            "公开消息已接收"
        );
        Ok(message)
    }

    /// 发布私信：不落库，经频道广播后由网关按收件人过滤
    pub async fn post_private_message(
        &self,
        keyspace: &TenantKeyspace,
        sender: &SenderIdentity,
        recipient: &str,
        body: &str,
        attachment_id: Option<String>,
    ) -> DomainResult<PrivateMessage> {
        self.check_length(body)?;
        if recipient.trim().is_empty() {
            return Err(DomainError::validation("recipient", "must not be empty"));
        }

        let settings = self.effective_settings(keyspace).await?;
        if !settings.mode.includes_private() {
            return Err(DomainError::validation("mode", "private chat is disabled"));
        }

        if !self.sessions.is_reachable(keyspace, recipient).await? {
            return Err(DomainError::denied(DenyCategory::RecipientUnreachable));
        }

        let deny_list = self.deny_list(keyspace).await?;
        let outcome = ContentFilter::filter(body, FilterMode::Private, &deny_list);
        if outcome.blocked {
            // 拦截必须上报违规并让发送方知道，不允许静默丢弃
            if let Err(err) = self
                .ledger
                .record_violation(keyspace, ViolationCategory::BlockedUrl, &sender.addr)
                .await
            {
                warn!(tenant = %keyspace.tenant(), error = %err, "违规记录失败");
            }
            return Err(DomainError::denied(DenyCategory::BlockedPattern {
                patterns: outcome.matched_patterns,
            }));
        }

        if outcome.filtered.is_empty() && attachment_id.is_none() {
            return Err(DomainError::validation(
                "body",
                "empty body requires an attachment",
            ));
        }

        self.admit(keyspace, sender, &settings).await?;

        let message = PrivateMessage {
            id: Uuid::new_v4(),
            tenant: keyspace.tenant().clone(),
            sender: sender.nick.clone(),
            recipient: recipient.to_string(),
            body: outcome.filtered,
            attachment_id,
            created_at: self.clock.now(),
        };

        self.publish(keyspace, &ChatEvent::PrivatePosted {
            message: message.clone(),
        })
        .await;

        info!(
            tenant = %keyspace.tenant(),
            sender = %sender.nick,
            recipient,
            "私信已接收"
        );
        Ok(message)
    }

    /// 最近历史。默认首页走缓存快照，分页读直接回源。
    pub async fn list_history(
        &self,
        keyspace: &TenantKeyspace,
        limit: Option<u32>,
        before: Option<Uuid>,
    ) -> DomainResult<Vec<ChatMessage>> {
        let settings = self.effective_settings(keyspace).await?;
        let default_limit = settings.history_limit.unwrap_or(self.params.history_limit);
        let limit = limit.unwrap_or(default_limit).min(200);

        if before.is_none() && limit == default_limit {
            let tenant = keyspace.tenant().clone();
            let messages = Arc::clone(&self.messages);
            return self
                .cache
                .get_with(&keyspace.key(HISTORY_CACHE_KEY), move || async move {
                    messages
                        .recent_history(&tenant, limit, None)
                        .await
                        .map_err(DomainError::from)
                })
                .await;
        }

        self.messages
            .recent_history(keyspace.tenant(), limit, before)
            .await
            .map_err(DomainError::from)
    }

    /// 软删除单条消息并广播删除事件
    pub async fn delete_message(&self, keyspace: &TenantKeyspace, id: Uuid) -> DomainResult<()> {
        let messages = &self.messages;
        let tenant = keyspace.tenant();
        with_retry("soft delete message", || async {
            messages
                .soft_delete(tenant, id)
                .await
                .map_err(DomainError::from)
        })
        .await?;
        self.cache
            .invalidate(&keyspace.key(HISTORY_CACHE_KEY))
            .await?;

        self.publish(keyspace, &ChatEvent::MessageDeleted { message_id: id })
            .await;
        info!(tenant = %tenant, message_id = %id, "消息已删除");
        Ok(())
    }

    /// 清空租户全部消息。存储翻转与缓存失效完成后才广播
    /// 清空标记，订阅中的连接恰好收到一个清空帧。
    pub async fn clear_chat(&self, keyspace: &TenantKeyspace) -> DomainResult<u64> {
        let messages = &self.messages;
        let tenant = keyspace.tenant();
        let affected = with_retry("clear chat", || async {
            messages.clear_all(tenant).await.map_err(DomainError::from)
        })
        .await?;
        self.cache
            .invalidate(&keyspace.key(HISTORY_CACHE_KEY))
            .await?;

        self.publish(keyspace, &ChatEvent::Cleared {
            at: self.clock.now(),
        })
        .await;
        info!(tenant = %tenant, affected, "聊天记录已清空");
        Ok(affected)
    }

    /// 租户有效设置（缓存读）
    pub async fn effective_settings(
        &self,
        keyspace: &TenantKeyspace,
    ) -> DomainResult<TenantSettings> {
        let tenant = keyspace.tenant().clone();
        let settings = Arc::clone(&self.settings);
        let loaded: Option<TenantSettings> = self
            .cache
            .get_with(&keyspace.key(SETTINGS_CACHE_KEY), move || async move {
                settings.load(&tenant).await.map_err(DomainError::from)
            })
            .await?;
        Ok(loaded.unwrap_or_default())
    }

    /// 更新租户设置：落库、同步失效缓存、广播模式变更
    pub async fn update_settings(
        &self,
        keyspace: &TenantKeyspace,
        settings: &TenantSettings,
    ) -> DomainResult<()> {
        self.settings
            .save(keyspace.tenant(), settings)
            .await
            .map_err(DomainError::from)?;
        self.cache
            .invalidate(&keyspace.key(SETTINGS_CACHE_KEY))
            .await?;

        self.publish(keyspace, &ChatEvent::ConfigChanged {
            mode: settings.mode,
        })
        .await;
        Ok(())
    }

    pub async fn list_patterns(
        &self,
        keyspace: &TenantKeyspace,
    ) -> DomainResult<Vec<FilterPattern>> {
        self.patterns
            .list(keyspace.tenant())
            .await
            .map_err(DomainError::from)
    }

    pub async fn add_pattern(
        &self,
        keyspace: &TenantKeyspace,
        pattern: String,
        is_regex: bool,
    ) -> DomainResult<FilterPattern> {
        if pattern.trim().is_empty() {
            return Err(DomainError::validation("pattern", "must not be empty"));
        }
        let entry = FilterPattern {
            id: Uuid::new_v4(),
            pattern,
            is_regex,
        };
        self.patterns
            .add(keyspace.tenant(), &entry)
            .await
            .map_err(DomainError::from)?;
        self.cache
            .invalidate(&keyspace.key(PATTERNS_CACHE_KEY))
            .await?;
        Ok(entry)
    }

    pub async fn remove_pattern(&self, keyspace: &TenantKeyspace, id: Uuid) -> DomainResult<bool> {
        let removed = self
            .patterns
            .remove(keyspace.tenant(), id)
            .await
            .map_err(DomainError::from)?;
        self.cache
            .invalidate(&keyspace.key(PATTERNS_CACHE_KEY))
            .await?;
        Ok(removed)
    }

    fn check_length(&self, body: &str) -> DomainResult<()> {
        // 长度在过滤前检查，截断不能把内容混过长度限制
        let length = body.chars().count();
        if length > self.params.max_message_len {
            return Err(DomainError::denied(DenyCategory::TooLong {
                length,
                max: self.params.max_message_len,
            }));
        }
        Ok(())
    }

    /// 审核账本准入；限流拒绝同时记一次违规
    async fn admit(
        &self,
        keyspace: &TenantKeyspace,
        sender: &SenderIdentity,
        settings: &TenantSettings,
    ) -> DomainResult<()> {
        let quota = self.quota_for(settings);
        match self.ledger.evaluate(keyspace, sender, quota).await? {
            Verdict::Admit => Ok(()),
            Verdict::Deny(category) => {
                if matches!(category, DenyCategory::RateLimited { .. }) {
                    if let Err(err) = self
                        .ledger
                        .record_violation(keyspace, ViolationCategory::RateAbuse, &sender.addr)
                        .await
                    {
                        warn!(tenant = %keyspace.tenant(), error = %err, "违规记录失败");
                    }
                }
                Err(DomainError::denied(category))
            }
        }
    }

    fn quota_for(&self, settings: &TenantSettings) -> RateQuota {
        RateQuota {
            limit: settings.rate_limit.unwrap_or(self.params.default_quota.limit),
            window: settings
                .rate_window_secs
                .map(Duration::from_secs)
                .unwrap_or(self.params.default_quota.window),
        }
    }

    async fn deny_list(&self, keyspace: &TenantKeyspace) -> DomainResult<Vec<FilterPattern>> {
        let tenant = keyspace.tenant().clone();
        let patterns = Arc::clone(&self.patterns);
        self.cache
            .get_with(&keyspace.key(PATTERNS_CACHE_KEY), move || async move {
                patterns.list(&tenant).await.map_err(DomainError::from)
            })
            .await
    }

    /// 分发是尽力而为：消息已持久化，发布失败只记日志
    async fn publish(&self, keyspace: &TenantKeyspace, event: &ChatEvent) {
        let result = with_retry("publish event", || async {
            self.distributor
                .publish(keyspace, event)
                .await
                .map_err(DomainError::from)
        })
        .await;
        if let Err(err) = result {
            error!(tenant = %keyspace.tenant(), error = %err, "事件分发失败");
        }
    }
}

/// 瞬时故障的有限重试，非瞬时错误立即向上
async fn with_retry<T, F, Fut>(op: &str, mut f: F) -> DomainResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DomainResult<T>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Err(err) if err.is_transient() && attempt < TRANSIENT_RETRIES => {
                attempt += 1;
                warn!(op, attempt, error = %err, "瞬时故障，重试");
                tokio::time::sleep(Duration::from_millis(50 * u64::from(attempt))).await;
            }
            other => return other,
        }
    }
}
