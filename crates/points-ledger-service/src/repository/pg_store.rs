//! PostgreSQL 账本存储
//!
//! 将 `LedgerStore` / `LedgerTx` 映射到各仓储的 `*_in_tx` 静态函数

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::batch_repo::PointsBatchRepository;
use super::idempotency_repo::IdempotencyRepository;
use super::ledger_repo::LedgerRepository;
use super::redemption_repo::RedemptionRepository;
use super::traits::{LedgerStore, LedgerTx};
use crate::error::Result;
use crate::models::{BatchStatus, IdempotencyRecord, LedgerEntry, PointsBatch, Redemption};

/// PostgreSQL 账本存储
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
    idempotency_repo: Arc<IdempotencyRepository>,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            idempotency_repo: Arc::new(IdempotencyRepository::new(pool.clone())),
            pool,
        }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLedgerTx { tx }))
    }

    async fn find_idempotency_records(&self, key: &str) -> Result<Vec<IdempotencyRecord>> {
        self.idempotency_repo.find_by_key(key).await
    }
}

/// PostgreSQL 事务
///
/// sqlx 的 Transaction 在 drop 时自动回滚
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn lock_active_batches(&mut self, user_id: &str) -> Result<Vec<PointsBatch>> {
        PointsBatchRepository::lock_active_in_tx(&mut self.tx, user_id).await
    }

    async fn insert_batch(&mut self, batch: &PointsBatch) -> Result<()> {
        PointsBatchRepository::create_in_tx(&mut self.tx, batch).await
    }

    async fn update_batch(
        &mut self,
        batch_id: Uuid,
        remaining_pts: i64,
        status: BatchStatus,
    ) -> Result<()> {
        PointsBatchRepository::update_in_tx(&mut self.tx, batch_id, remaining_pts, status).await
    }

    async fn insert_entry(&mut self, entry: &LedgerEntry) -> Result<()> {
        LedgerRepository::create_in_tx(&mut self.tx, entry).await
    }

    async fn count_earn_entries_since(
        &mut self,
        user_id: &str,
        action_type: &str,
        since: DateTime<Utc>,
    ) -> Result<i64> {
        LedgerRepository::count_earn_since_in_tx(&mut self.tx, user_id, action_type, since).await
    }

    async fn earliest_earn_entry_since(
        &mut self,
        user_id: &str,
        action_type: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        LedgerRepository::earliest_earn_since_in_tx(&mut self.tx, user_id, action_type, since)
            .await
    }

    async fn insert_redemption(&mut self, redemption: &Redemption) -> Result<()> {
        RedemptionRepository::create_in_tx(&mut self.tx, redemption).await
    }

    async fn try_insert_idempotency_placeholder(
        &mut self,
        record: &IdempotencyRecord,
    ) -> Result<bool> {
        IdempotencyRepository::insert_placeholder_in_tx(&mut self.tx, record).await
    }

    async fn lock_idempotency_record(
        &mut self,
        key: &str,
        user_id: &str,
    ) -> Result<Option<IdempotencyRecord>> {
        IdempotencyRepository::get_for_update_in_tx(&mut self.tx, key, user_id).await
    }

    async fn reclaim_idempotency_record(&mut self, record: &IdempotencyRecord) -> Result<()> {
        IdempotencyRepository::overwrite_in_tx(&mut self.tx, record).await
    }

    async fn complete_idempotency_record(
        &mut self,
        key: &str,
        user_id: &str,
        response_code: i32,
        response_body: &serde_json::Value,
    ) -> Result<()> {
        IdempotencyRepository::complete_in_tx(
            &mut self.tx,
            key,
            user_id,
            response_code,
            response_body,
        )
        .await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
