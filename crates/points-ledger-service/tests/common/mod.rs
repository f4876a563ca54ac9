//! 引擎测试公共设施
//!
//! 内存存储 + 静态目录 + 手动时钟，无需外部依赖

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use points_ledger::{
    ActionConfig, BatchStatus, Clock, ItemConfig, LedgerEntry, ManualClock, MemoryLedgerStore,
    NewPointsBatch, PointsBatch, PointsLedger, StaticCatalog,
};
use points_shared::config::LedgerConfig;

pub const DAILY_LOGIN: &str = "DAILY_LOGIN";
pub const SHARE: &str = "SHARE";
pub const PURCHASE: &str = "PURCHASE";

pub const ITEM_A: &str = "ITEM_A";
pub const COUPON_5: &str = "COUPON_5";
pub const RETIRED_ITEM: &str = "RETIRED_ITEM";

/// 测试目录
///
/// - DAILY_LOGIN: 10 分，30 天有效，每 24 小时 1 次
/// - SHARE: 5 分，30 天有效，每小时 3 次
/// - PURCHASE: 100 分，90 天有效，每分钟 100 次
/// - ITEM_A 100 分，COUPON_5 50 分，RETIRED_ITEM 已下架
pub fn test_catalog() -> StaticCatalog {
    StaticCatalog::new()
        .with_action(action(DAILY_LOGIN, 10, 30, 86_400, 1))
        .with_action(action(SHARE, 5, 30, 3_600, 3))
        .with_action(action(PURCHASE, 100, 90, 60, 100))
        .with_item(item(ITEM_A, 100, true))
        .with_item(item(COUPON_5, 50, true))
        .with_item(item(RETIRED_ITEM, 10, false))
}

fn action(
    action_type: &str,
    points: i64,
    validity_days: i64,
    window_seconds: i64,
    max: i64,
) -> ActionConfig {
    ActionConfig {
        action_type: action_type.to_string(),
        points,
        validity_days,
        rate_limit_window_seconds: window_seconds,
        rate_limit_max: max,
    }
}

fn item(item_code: &str, points_cost: i64, is_active: bool) -> ItemConfig {
    ItemConfig {
        item_code: item_code.to_string(),
        points_cost,
        is_active,
    }
}

/// 测试装置
pub struct Harness {
    pub ledger: PointsLedger,
    pub store: MemoryLedgerStore,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(start: DateTime<Utc>) -> Self {
        let store = MemoryLedgerStore::new();
        let clock = Arc::new(ManualClock::new(start));
        let ledger = PointsLedger::new(
            Arc::new(store.clone()),
            Arc::new(test_catalog()),
            clock.clone(),
            &LedgerConfig::default(),
        );

        Self {
            ledger,
            store,
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    /// 直接写入一个 active 批次，`expires_in` 相对当前时钟
    pub async fn seed_batch(
        &self,
        user_id: &str,
        points: i64,
        expires_in: Option<Duration>,
    ) -> PointsBatch {
        let now = self.now();
        let batch = NewPointsBatch {
            user_id: user_id.to_string(),
            action_type: "SEED".to_string(),
            points,
            issued_at: now,
            expires_at: expires_in.map(|d| now + d),
        }
        .into_batch();
        self.store.seed_batch(batch.clone()).await;
        batch
    }

    pub async fn batch(&self, user_id: &str, batch_id: uuid::Uuid) -> PointsBatch {
        self.store
            .batches(user_id)
            .await
            .into_iter()
            .find(|b| b.id == batch_id)
            .unwrap_or_else(|| panic!("batch {} not found", batch_id))
    }

    pub async fn active_sum(&self, user_id: &str) -> i64 {
        self.store
            .batches(user_id)
            .await
            .iter()
            .filter(|b| b.status == BatchStatus::Active)
            .map(|b| b.remaining_pts)
            .sum()
    }

    /// 校验审计链：每条流水自洽，相邻流水首尾相接
    pub async fn assert_audit_chain(&self, user_id: &str) -> Vec<LedgerEntry> {
        let entries = self.store.entries(user_id).await;
        for entry in &entries {
            assert!(entry.is_balanced(), "unbalanced entry: {:?}", entry);
        }
        for pair in entries.windows(2) {
            assert_eq!(
                pair[0].balance_after, pair[1].balance_before,
                "broken chain between {:?} and {:?}",
                pair[0], pair[1]
            );
        }
        entries
    }
}
