//! 获取积分服务
//!
//! 每次获取生成一个独立批次与一条获取流水，整个过程在单个事务中完成

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument};

use points_shared::observability::metrics as ledger_metrics;

use super::balance_service::BalanceCalculator;
use super::dto::EarnResult;
use super::idempotency::{IdempotencyManager, SlotOutcome};
use super::rate_limiter::RateLimiter;
use crate::clock::Clock;
use crate::error::{PointsError, Result};
use crate::models::{NewLedgerEntry, NewPointsBatch};
use crate::repository::{CatalogRepository, LedgerStore};

const OPERATION: &str = "earn";

/// 获取积分引擎
#[derive(Clone)]
pub struct EarnEngine {
    store: Arc<dyn LedgerStore>,
    catalog: Arc<dyn CatalogRepository>,
    clock: Arc<dyn Clock>,
    idempotency: IdempotencyManager,
    rate_limiter: RateLimiter,
    balance: BalanceCalculator,
}

impl EarnEngine {
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
            rate_limiter: RateLimiter::new(),
            balance,
        }
    }

    /// 获取积分
    ///
    /// 流程：
    /// 1. 携带幂等 key 时先在事务外查缓存
    /// 2. 校验行为配置
    /// 3. 事务内：幂等占位 → 锁定批次并结转过期 → 频率限制 → 创建批次与流水 → 缓存响应
    /// 4. 提交
    #[instrument(skip(self))]
    pub async fn earn(
        &self,
        user_id: &str,
        action_type: &str,
        idempotency_key: Option<&str>,
    ) -> Result<EarnResult> {
        let started = Instant::now();
        let result = self.execute(user_id, action_type, idempotency_key).await;

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
        action_type: &str,
        idempotency_key: Option<&str>,
    ) -> Result<EarnResult> {
        let now = self.clock.now();

        if let Some(key) = idempotency_key {
            if let Some(cached) = self
                .idempotency
                .check_cache::<EarnResult>(key, user_id, now)
                .await?
            {
                ledger_metrics::record_replay(OPERATION);
                return Ok(cached);
            }
        }

        let config = self
            .catalog
            .get_action_config(action_type)
            .await?
            .ok_or_else(|| PointsError::InvalidAction(action_type.to_string()))?;
        let expires_at = config.expires_at(now)?;

        let mut tx = self.store.begin().await?;

        if let Some(key) = idempotency_key {
            if let SlotOutcome::Cached(cached) = self
                .idempotency
                .occupy_slot::<EarnResult>(tx.as_mut(), key, user_id, now)
                .await?
            {
                tx.rollback().await?;
                ledger_metrics::record_replay(OPERATION);
                return Ok(cached);
            }
        }

        // 用户锁在频率计数之前获取，计数时能看到并发获取已提交的流水
        let balance_before = self.balance.calculate(tx.as_mut(), user_id, now).await?.balance;

        self.rate_limiter
            .check_and_throw(tx.as_mut(), user_id, &config, now)
            .await?;

        let batch = NewPointsBatch {
            user_id: user_id.to_string(),
            action_type: config.action_type.clone(),
            points: config.points,
            issued_at: now,
            expires_at: Some(expires_at),
        }
        .into_batch();
        tx.insert_batch(&batch).await?;

        let entry = NewLedgerEntry::earn(
            user_id,
            &config.action_type,
            config.points,
            balance_before,
            batch.id,
            now,
        )
        .into_entry();
        tx.insert_entry(&entry).await?;

        let result = EarnResult {
            success: true,
            points_earned: config.points,
            new_balance: entry.balance_after,
            expires_at: batch.expires_at,
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
            action_type = %config.action_type,
            points = config.points,
            new_balance = result.new_balance,
            batch_id = %batch.id,
            "积分获取成功"
        );
        debug!(transaction_id = %entry.id, expires_at = ?batch.expires_at, "获取流水已写入");
        ledger_metrics::record_earn(&config.action_type, config.points);

        Ok(result)
    }
}
