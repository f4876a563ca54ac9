//! 余额计算与惰性过期
//!
//! 过期不依赖定时任务：任何触及用户批次的操作都会先锁定全部 active 批次，
//! 把已过期的批次结转为 expired 并写入 expire 流水，再计算余额。

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument};

use points_shared::observability::metrics as ledger_metrics;

use super::dto::BalanceSummary;
use crate::clock::Clock;
use crate::error::Result;
use crate::models::{BatchStatus, NewLedgerEntry, PointsBatch};
use crate::repository::{LedgerStore, LedgerTx};

/// 余额计算器
#[derive(Clone)]
pub struct BalanceCalculator {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    expiring_soon_window: Duration,
}

impl BalanceCalculator {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
        expiring_soon_window: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            expiring_soon_window,
        }
    }

    /// 锁定用户 active 批次并结转已过期批次
    ///
    /// 返回仍然有效的批次，保持锁定顺序（即 FIFO 扣减顺序）
    pub async fn lock_and_expire(
        &self,
        tx: &mut dyn LedgerTx,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<PointsBatch>> {
        let locked = tx.lock_active_batches(user_id).await?;

        let mut running = locked.iter().map(|b| b.remaining_pts).sum::<i64>();
        let (expired, active): (Vec<_>, Vec<_>) =
            locked.into_iter().partition(|b| b.is_expired(now));

        for batch in &expired {
            let entry =
                NewLedgerEntry::expire(user_id, batch.remaining_pts, running, batch.id, now)
                    .into_entry();
            tx.insert_entry(&entry).await?;
            tx.update_batch(batch.id, 0, BatchStatus::Expired).await?;
            running = entry.balance_after;

            info!(
                user_id = %user_id,
                batch_id = %batch.id,
                points = batch.remaining_pts,
                expired_at = ?batch.expires_at,
                "积分批次已过期"
            );
            ledger_metrics::record_expire(batch.remaining_pts);
        }

        Ok(active)
    }

    /// 在调用方事务中计算余额（含惰性过期）
    pub async fn calculate(
        &self,
        tx: &mut dyn LedgerTx,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<BalanceSummary> {
        let active = self.lock_and_expire(tx, user_id, now).await?;
        Ok(summarize(&active, now + self.expiring_soon_window))
    }

    /// 独立事务查询余额，过期结转随事务提交
    #[instrument(skip(self))]
    pub async fn get_balance(&self, user_id: &str) -> Result<BalanceSummary> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let summary = self.calculate(tx.as_mut(), user_id, now).await?;
        tx.commit().await?;
        Ok(summary)
    }
}

/// 汇总有效批次
fn summarize(active: &[PointsBatch], soon_deadline: DateTime<Utc>) -> BalanceSummary {
    let balance = active.iter().map(|b| b.remaining_pts).sum();

    let expiring: Vec<_> = active.iter().filter(|b| b.expires_by(soon_deadline)).collect();
    let expiring_soon = expiring.iter().map(|b| b.remaining_pts).sum();
    let next_expiry_at = expiring.iter().filter_map(|b| b.expires_at).min();

    BalanceSummary {
        balance,
        expiring_soon,
        next_expiry_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewPointsBatch;

    fn batch(points: i64, expires_at: Option<DateTime<Utc>>) -> PointsBatch {
        NewPointsBatch {
            user_id: "u1".to_string(),
            action_type: "DAILY_LOGIN".to_string(),
            points,
            issued_at: Utc::now(),
            expires_at,
        }
        .into_batch()
    }

    #[test]
    fn test_summarize_empty() {
        assert_eq!(summarize(&[], Utc::now()), BalanceSummary::empty());
    }

    #[test]
    fn test_summarize_expiring_soon() {
        let now = Utc::now();
        let deadline = now + Duration::days(7);
        let active = vec![
            batch(30, Some(now + Duration::days(3))),
            batch(5, Some(deadline)),
            batch(80, Some(now + Duration::days(60))),
            batch(7, None),
        ];

        let summary = summarize(&active, deadline);

        assert_eq!(summary.balance, 122);
        assert_eq!(summary.expiring_soon, 35);
        assert_eq!(summary.next_expiry_at, Some(now + Duration::days(3)));
    }
}
