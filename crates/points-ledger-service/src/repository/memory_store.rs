//! 内存账本存储
//!
//! 用于测试和本地运行。事务持有整个存储的独占锁并在快照上操作，
//! 提交时写回，回滚或 drop 时丢弃快照。
//!
//! 这把全局锁串行化所有用户的全部事务，不同用户之间也不会并发；
//! 按用户粒度的锁竞争只能在 Postgres 集成测试中覆盖。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::traits::{LedgerStore, LedgerTx};
use crate::error::{PointsError, Result};
use crate::models::{
    BatchStatus, IdempotencyRecord, IdempotencyState, LedgerEntry, PointsBatch, Redemption,
    TransactionType,
};

/// 存储内容
#[derive(Debug, Clone, Default)]
struct MemoryState {
    batches: Vec<PointsBatch>,
    entries: Vec<LedgerEntry>,
    redemptions: Vec<Redemption>,
    idempotency: HashMap<(String, String), IdempotencyRecord>,
}

impl MemoryState {
    fn earn_entries_since<'a>(
        &'a self,
        user_id: &'a str,
        action_type: &'a str,
        since: DateTime<Utc>,
    ) -> impl Iterator<Item = &'a LedgerEntry> + 'a {
        self.entries.iter().filter(move |e| {
            e.user_id == user_id
                && e.entry_type == TransactionType::Earn
                && e.action_type.as_deref() == Some(action_type)
                && e.created_at >= since
        })
    }
}

/// 内存账本存储
///
/// `begin` 即取得全局锁，事务之间完全串行
#[derive(Clone, Default)]
pub struct MemoryLedgerStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== 测试辅助 ====================

    /// 直接写入批次（绕过引擎，用于构造过期等场景）
    pub async fn seed_batch(&self, batch: PointsBatch) {
        self.state.lock().await.batches.push(batch);
    }

    /// 直接写入幂等记录（用于构造处理中或已过期的记录）
    pub async fn seed_idempotency_record(&self, record: IdempotencyRecord) {
        let key = (record.key.clone(), record.user_id.clone());
        self.state.lock().await.idempotency.insert(key, record);
    }

    /// 用户的全部批次（按发放时间）
    pub async fn batches(&self, user_id: &str) -> Vec<PointsBatch> {
        let state = self.state.lock().await;
        let mut batches: Vec<_> = state
            .batches
            .iter()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        batches.sort_by_key(|b| (b.issued_at, b.id));
        batches
    }

    /// 用户的全部流水（按写入顺序）
    pub async fn entries(&self, user_id: &str) -> Vec<LedgerEntry> {
        let state = self.state.lock().await;
        state
            .entries
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn redemptions(&self, user_id: &str) -> Vec<Redemption> {
        let state = self.state.lock().await;
        state
            .redemptions
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn idempotency_record(&self, key: &str, user_id: &str) -> Option<IdempotencyRecord> {
        let state = self.state.lock().await;
        state
            .idempotency
            .get(&(key.to_string(), user_id.to_string()))
            .cloned()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryLedgerTx { guard, working }))
    }

    async fn find_idempotency_records(&self, key: &str) -> Result<Vec<IdempotencyRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .idempotency
            .values()
            .filter(|r| r.key == key)
            .cloned()
            .collect())
    }
}

/// 内存事务
pub struct MemoryLedgerTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

impl MemoryLedgerTx {
    fn batch_mut(&mut self, batch_id: Uuid) -> Result<&mut PointsBatch> {
        self.working
            .batches
            .iter_mut()
            .find(|b| b.id == batch_id)
            .ok_or_else(|| PointsError::Internal(format!("批次不存在: {}", batch_id)))
    }
}

#[async_trait]
impl LedgerTx for MemoryLedgerTx {
    async fn lock_active_batches(&mut self, user_id: &str) -> Result<Vec<PointsBatch>> {
        let mut batches: Vec<_> = self
            .working
            .batches
            .iter()
            .filter(|b| b.user_id == user_id && b.status == BatchStatus::Active)
            .cloned()
            .collect();
        // expires_at 升序，NULL 排最后
        batches.sort_by_key(|b| (b.expires_at.is_none(), b.expires_at, b.issued_at, b.id));
        Ok(batches)
    }

    async fn insert_batch(&mut self, batch: &PointsBatch) -> Result<()> {
        self.working.batches.push(batch.clone());
        Ok(())
    }

    async fn update_batch(
        &mut self,
        batch_id: Uuid,
        remaining_pts: i64,
        status: BatchStatus,
    ) -> Result<()> {
        let batch = self.batch_mut(batch_id)?;
        batch.remaining_pts = remaining_pts;
        batch.status = status;
        Ok(())
    }

    async fn insert_entry(&mut self, entry: &LedgerEntry) -> Result<()> {
        self.working.entries.push(entry.clone());
        Ok(())
    }

    async fn count_earn_entries_since(
        &mut self,
        user_id: &str,
        action_type: &str,
        since: DateTime<Utc>,
    ) -> Result<i64> {
        Ok(self
            .working
            .earn_entries_since(user_id, action_type, since)
            .count() as i64)
    }

    async fn earliest_earn_entry_since(
        &mut self,
        user_id: &str,
        action_type: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .working
            .earn_entries_since(user_id, action_type, since)
            .map(|e| e.created_at)
            .min())
    }

    async fn insert_redemption(&mut self, redemption: &Redemption) -> Result<()> {
        self.working.redemptions.push(redemption.clone());
        Ok(())
    }

    async fn try_insert_idempotency_placeholder(
        &mut self,
        record: &IdempotencyRecord,
    ) -> Result<bool> {
        let slot = (record.key.clone(), record.user_id.clone());
        if self.working.idempotency.contains_key(&slot) {
            return Ok(false);
        }
        self.working.idempotency.insert(slot, record.clone());
        Ok(true)
    }

    async fn lock_idempotency_record(
        &mut self,
        key: &str,
        user_id: &str,
    ) -> Result<Option<IdempotencyRecord>> {
        Ok(self
            .working
            .idempotency
            .get(&(key.to_string(), user_id.to_string()))
            .cloned())
    }

    async fn reclaim_idempotency_record(&mut self, record: &IdempotencyRecord) -> Result<()> {
        self.working.idempotency.insert(
            (record.key.clone(), record.user_id.clone()),
            record.clone(),
        );
        Ok(())
    }

    async fn complete_idempotency_record(
        &mut self,
        key: &str,
        user_id: &str,
        response_code: i32,
        response_body: &serde_json::Value,
    ) -> Result<()> {
        let record = self
            .working
            .idempotency
            .get_mut(&(key.to_string(), user_id.to_string()))
            .ok_or_else(|| PointsError::Internal(format!("幂等记录不存在: {}", key)))?;
        record.state = IdempotencyState::Completed {
            response_code,
            response_body: response_body.clone(),
        };
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryLedgerTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
