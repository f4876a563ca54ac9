//! 积分账本门面
//!
//! 组装各引擎，对外暴露获取、兑换、查询余额三个操作

use std::sync::Arc;

use chrono::Duration;

use points_shared::config::LedgerConfig;

use super::balance_service::BalanceCalculator;
use super::dto::{BalanceSummary, EarnResult, RedeemResult};
use super::earn_service::EarnEngine;
use super::idempotency::IdempotencyManager;
use super::redeem_service::RedeemEngine;
use crate::clock::Clock;
use crate::error::Result;
use crate::repository::{CatalogRepository, LedgerStore};

/// 积分账本
#[derive(Clone)]
pub struct PointsLedger {
    earn: EarnEngine,
    redeem: RedeemEngine,
    balance: BalanceCalculator,
}

impl PointsLedger {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        catalog: Arc<dyn CatalogRepository>,
        clock: Arc<dyn Clock>,
        config: &LedgerConfig,
    ) -> Self {
        let idempotency = IdempotencyManager::new(
            store.clone(),
            Duration::hours(config.idempotency_ttl_hours),
        );
        let balance = BalanceCalculator::new(
            store.clone(),
            clock.clone(),
            Duration::days(config.expiring_soon_days),
        );

        Self {
            earn: EarnEngine::new(
                store.clone(),
                catalog.clone(),
                clock.clone(),
                idempotency.clone(),
                balance.clone(),
            ),
            redeem: RedeemEngine::new(store, catalog, clock, idempotency, balance.clone()),
            balance,
        }
    }

    pub async fn earn(
        &self,
        user_id: &str,
        action_type: &str,
        idempotency_key: Option<&str>,
    ) -> Result<EarnResult> {
        self.earn.earn(user_id, action_type, idempotency_key).await
    }

    pub async fn redeem(
        &self,
        user_id: &str,
        item_code: &str,
        idempotency_key: Option<&str>,
    ) -> Result<RedeemResult> {
        self.redeem.redeem(user_id, item_code, idempotency_key).await
    }

    pub async fn get_balance(&self, user_id: &str) -> Result<BalanceSummary> {
        self.balance.get_balance(user_id).await
    }
}
