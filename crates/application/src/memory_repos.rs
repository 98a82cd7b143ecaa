//! 内存仓储实现
//!
//! 用于测试和单进程部署。语义与 PostgreSQL 实现一致：
//! 插入顺序、软删除、惰性过期。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    BanRecord, BanRepository, BanSubject, ChatMessage, FilterPattern, FilterPatternRepository,
    MessageRepository, RepositoryError, RepositoryResult, SettingsRepository, TenantId,
    TenantSettings,
};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

type TenantKey = String;

fn tenant_key(tenant: &TenantId) -> TenantKey {
    tenant.as_str().to_string()
}

/// 消息仓储：每租户一个按插入顺序排列的向量
#[derive(Default)]
pub struct MemoryMessageRepository {
    rows: Mutex<HashMap<TenantKey, Vec<ChatMessage>>>,
}

impl MemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageRepository for MemoryMessageRepository {
    async fn append(&self, message: &ChatMessage) -> RepositoryResult<()> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.entry(tenant_key(&message.tenant))
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn find(&self, tenant: &TenantId, id: Uuid) -> RepositoryResult<Option<ChatMessage>> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        Ok(rows
            .get(&tenant_key(tenant))
            .and_then(|msgs| msgs.iter().find(|m| m.id == id).cloned()))
    }

    async fn soft_delete(&self, tenant: &TenantId, id: Uuid) -> RepositoryResult<()> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        let msgs = rows
            .get_mut(&tenant_key(tenant))
            .ok_or(RepositoryError::NotFound)?;
        let msg = msgs
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(RepositoryError::NotFound)?;
        msg.mark_deleted();
        Ok(())
    }

    async fn clear_all(&self, tenant: &TenantId) -> RepositoryResult<u64> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        let msgs = match rows.get_mut(&tenant_key(tenant)) {
            Some(msgs) => msgs,
            None => return Ok(0),
        };
        let mut affected = 0;
        for msg in msgs.iter_mut() {
            if msg.is_visible() {
                msg.mark_deleted();
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn recent_history(
        &self,
        tenant: &TenantId,
        limit: u32,
        before: Option<Uuid>,
    ) -> RepositoryResult<Vec<ChatMessage>> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        let msgs = match rows.get(&tenant_key(tenant)) {
            Some(msgs) => msgs,
            None => return Ok(Vec::new()),
        };

        // 以锚点消息的位置截断，新消息并发追加也不会错位
        let cutoff = match before {
            Some(anchor) => match msgs.iter().position(|m| m.id == anchor) {
                Some(pos) => pos,
                None => return Ok(Vec::new()),
            },
            None => msgs.len(),
        };

        Ok(msgs[..cutoff]
            .iter()
            .rev()
            .filter(|m| m.is_visible())
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

/// 封禁仓储：按（租户、对象）索引
#[derive(Default)]
pub struct MemoryBanRepository {
    rows: Mutex<HashMap<(TenantKey, BanSubject), BanRecord>>,
}

impl MemoryBanRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BanRepository for MemoryBanRepository {
    async fn upsert(&self, tenant: &TenantId, record: &BanRecord) -> RepositoryResult<()> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.insert(
            (tenant_key(tenant), record.subject.clone()),
            record.clone(),
        );
        Ok(())
    }

    async fn remove(&self, tenant: &TenantId, subject: &BanSubject) -> RepositoryResult<bool> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        Ok(rows
            .remove(&(tenant_key(tenant), subject.clone()))
            .is_some())
    }

    async fn find(
        &self,
        tenant: &TenantId,
        subject: &BanSubject,
    ) -> RepositoryResult<Option<BanRecord>> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        Ok(rows.get(&(tenant_key(tenant), subject.clone())).cloned())
    }

    async fn list_active(
        &self,
        tenant: &TenantId,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<BanRecord>> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        let key = tenant_key(tenant);
        Ok(rows
            .iter()
            .filter(|((t, _), record)| *t == key && record.is_active(now))
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn sweep_expired(&self, tenant: &TenantId, now: DateTime<Utc>) -> RepositoryResult<u64> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        let key = tenant_key(tenant);
        let before = rows.len();
        rows.retain(|(t, _), record| *t != key || record.is_active(now));
        Ok((before - rows.len()) as u64)
    }
}

/// 拒绝列表仓储
#[derive(Default)]
pub struct MemoryFilterPatternRepository {
    rows: Mutex<HashMap<TenantKey, Vec<FilterPattern>>>,
}

impl MemoryFilterPatternRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FilterPatternRepository for MemoryFilterPatternRepository {
    async fn list(&self, tenant: &TenantId) -> RepositoryResult<Vec<FilterPattern>> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        Ok(rows.get(&tenant_key(tenant)).cloned().unwrap_or_default())
    }

    async fn add(&self, tenant: &TenantId, pattern: &FilterPattern) -> RepositoryResult<()> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.entry(tenant_key(tenant))
            .or_default()
            .push(pattern.clone());
        Ok(())
    }

    async fn remove(&self, tenant: &TenantId, id: Uuid) -> RepositoryResult<bool> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        let patterns = match rows.get_mut(&tenant_key(tenant)) {
            Some(patterns) => patterns,
            None => return Ok(false),
        };
        let before = patterns.len();
        patterns.retain(|p| p.id != id);
        Ok(patterns.len() != before)
    }
}

/// 租户设置仓储
#[derive(Default)]
pub struct MemorySettingsRepository {
    rows: Mutex<HashMap<TenantKey, TenantSettings>>,
}

impl MemorySettingsRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsRepository for MemorySettingsRepository {
    async fn load(&self, tenant: &TenantId) -> RepositoryResult<Option<TenantSettings>> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        Ok(rows.get(&tenant_key(tenant)).cloned())
    }

    async fn save(&self, tenant: &TenantId, settings: &TenantSettings) -> RepositoryResult<()> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.insert(tenant_key(tenant), settings.clone());
        Ok(())
    }
}
