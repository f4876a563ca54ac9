//! 兑换服务
//!
//! 按过期时间先后（FIFO）从批次中扣减积分，并生成兑换记录与兑换流水

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, instrument, warn};

use points_shared::observability::metrics as ledger_metrics;

use super::balance_service::BalanceCalculator;
use super::dto::RedeemResult;
use super::idempotency::{IdempotencyManager, SlotOutcome};
use crate::clock::Clock;
use crate::error::{PointsError, Result};
use crate::models::{BatchStatus, NewLedgerEntry, NewRedemption, PointsBatch};
use crate::repository::{CatalogRepository, LedgerStore};

const OPERATION: &str = "redeem";

/// 单个批次的扣减计划
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deduction {
    pub batch_id: uuid::Uuid,
    pub deducted: i64,
    pub remaining_pts: i64,
    pub status: BatchStatus,
}

/// 按给定顺序从批次中扣减 `cost`
///
/// 调用方需保证批次总余额不小于 `cost`
pub fn plan_fifo_deduction(batches: &[PointsBatch], cost: i64) -> Vec<Deduction> {
    let mut remaining = cost;
    let mut plan = Vec::new();

    for batch in batches {
        if remaining <= 0 {
            break;
        }
        let deducted = batch.remaining_pts.min(remaining);
        remaining -= deducted;

        let left = batch.remaining_pts - deducted;
        plan.push(Deduction {
            batch_id: batch.id,
            deducted,
            remaining_pts: left,
            status: if left == 0 {
                BatchStatus::Redeemed
            } else {
                BatchStatus::Active
            },
        });
    }

    plan
}

/// 兑换引擎
#[derive(Clone)]
pub struct RedeemEngine {
    store: Arc<dyn LedgerStore>,
    catalog: Arc<dyn CatalogRepository>,
    clock: Arc<dyn Clock>,
    idempotency: IdempotencyManager,
    balance: BalanceCalculator,
}

impl RedeemEngine {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        catalog: Arc<dyn CatalogRepository>,
        clock: Arc<dyn Clock>,
        idempotency: IdempotencyManager,
        balance: BalanceCalculator,
    ) -> Self {
        Self {
            store,
            catalog,
            clock,
            idempotency,
            balance,
        }
    }

    /// 兑换商品
    ///
    /// 商品价格以服务端配置为准。余额不足时整个事务回滚，
    /// 包括本次触发的过期结转。
    #[instrument(skip(self))]
    pub async fn redeem(
        &self,
        user_id: &str,
        item_code: &str,
        idempotency_key: Option<&str>,
    ) -> Result<RedeemResult> {
        let started = Instant::now();
        let result = self.execute(user_id, item_code, idempotency_key).await;

        ledger_metrics::record_operation(
            OPERATION,
            result.as_ref().err().map(PointsError::error_code),
            started.elapsed().as_secs_f64(),
        );
        result
    }

    async fn execute(
        &self,
        user_id: &str,
        item_code: &str,
        idempotency_key: Option<&str>,
    ) -> Result<RedeemResult> {
        let now = self.clock.now();

        if let Some(key) = idempotency_key {
            if let Some(cached) = self
                .idempotency
                .check_cache::<RedeemResult>(key, user_id, now)
                .await?
            {
                ledger_metrics::record_replay(OPERATION);
                return Ok(cached);
            }
        }

        let item = self
            .catalog
            .get_item_config(item_code)
            .await?
            .filter(|item| item.is_active)
            .ok_or_else(|| PointsError::InvalidItem(item_code.to_string()))?;
        let cost = item.points_cost;

        let mut tx = self.store.begin().await?;

        if let Some(key) = idempotency_key {
            if let SlotOutcome::Cached(cached) = self
                .idempotency
                .occupy_slot::<RedeemResult>(tx.as_mut(), key, user_id, now)
                .await?
            {
                tx.rollback().await?;
                ledger_metrics::record_replay(OPERATION);
                return Ok(cached);
            }
        }

        let active = self.balance.lock_and_expire(tx.as_mut(), user_id, now).await?;
        let balance: i64 = active.iter().map(|b| b.remaining_pts).sum();

        if balance < cost {
            warn!(
                user_id = %user_id,
                item_code = %item_code,
                balance,
                required = cost,
                "积分余额不足"
            );
            return Err(PointsError::InsufficientPoints {
                current_balance: balance,
                required: cost,
            });
        }

        for deduction in plan_fifo_deduction(&active, cost) {
            tx.update_batch(deduction.batch_id, deduction.remaining_pts, deduction.status)
                .await?;
        }

        let redemption = NewRedemption {
            user_id: user_id.to_string(),
            item_code: item.item_code.clone(),
            points_cost: cost,
            created_at: now,
        }
        .into_redemption();
        tx.insert_redemption(&redemption).await?;

        let entry = NewLedgerEntry::redeem(user_id, cost, balance, redemption.id, now).into_entry();
        tx.insert_entry(&entry).await?;

        let result = RedeemResult {
            success: true,
            points_deducted: cost,
            new_balance: entry.balance_after,
            redemption_id: redemption.id,
            transaction_id: entry.id,
        };

        if let Some(key) = idempotency_key {
            self.idempotency
                .cache_response(tx.as_mut(), key, user_id, &result)
                .await?;
        }

        tx.commit().await?;

        info!(
            user_id = %user_id,
            item_code = %item.item_code,
            points = cost,
            new_balance = result.new_balance,
            redemption_id = %redemption.id,
            "积分兑换成功"
        );
        ledger_metrics::record_redeem(&item.item_code, cost);

        Ok(result)
    }
}
