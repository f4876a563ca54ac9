//! 仓储 Trait 定义
//!
//! 服务层只依赖这些抽象：Postgres 实现用于生产，内存实现用于测试与本地运行。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    ActionConfig, BatchStatus, IdempotencyRecord, ItemConfig, LedgerEntry, PointsBatch, Redemption,
};

/// 账本存储（连接池级别）
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// 开启事务
    async fn begin(&self) -> Result<Box<dyn LedgerTx>>;

    /// 事务外按 key 查询幂等记录（不区分用户）
    async fn find_idempotency_records(&self, key: &str) -> Result<Vec<IdempotencyRecord>>;
}

/// 账本事务
///
/// 未调用 `commit` 即被 drop 的事务会整体回滚
#[async_trait]
pub trait LedgerTx: Send {
    // ==================== 批次 ====================

    /// 取得用户级排他锁，再对用户所有 active 批次加排他行锁并返回
    ///
    /// 用户级锁持有到事务结束，用户没有任何批次时同样生效；
    /// 之后的读取能看到同一用户前序事务提交的全部写入。
    /// 批次固定按 expires_at ASC NULLS LAST, issued_at, id 排序，
    /// 所有加锁路径共用此顺序以避免死锁
    async fn lock_active_batches(&mut self, user_id: &str) -> Result<Vec<PointsBatch>>;

    async fn insert_batch(&mut self, batch: &PointsBatch) -> Result<()>;

    async fn update_batch(
        &mut self,
        batch_id: Uuid,
        remaining_pts: i64,
        status: BatchStatus,
    ) -> Result<()>;

    // ==================== 流水 ====================

    async fn insert_entry(&mut self, entry: &LedgerEntry) -> Result<()>;

    /// 统计窗口内（created_at >= since）用户某行为的获取流水数
    async fn count_earn_entries_since(
        &mut self,
        user_id: &str,
        action_type: &str,
        since: DateTime<Utc>,
    ) -> Result<i64>;

    /// 窗口内最早一条获取流水的创建时间
    async fn earliest_earn_entry_since(
        &mut self,
        user_id: &str,
        action_type: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>>;

    // ==================== 兑换 ====================

    async fn insert_redemption(&mut self, redemption: &Redemption) -> Result<()>;

    // ==================== 幂等 ====================

    /// 条件插入占位记录，成功返回 true，(key, user_id) 已存在返回 false
    async fn try_insert_idempotency_placeholder(&mut self, record: &IdempotencyRecord)
    -> Result<bool>;

    /// 加锁读取 (key, user_id) 的幂等记录
    async fn lock_idempotency_record(
        &mut self,
        key: &str,
        user_id: &str,
    ) -> Result<Option<IdempotencyRecord>>;

    /// 将过期记录重置为新的占位记录
    async fn reclaim_idempotency_record(&mut self, record: &IdempotencyRecord) -> Result<()>;

    /// 写入最终响应
    async fn complete_idempotency_record(
        &mut self,
        key: &str,
        user_id: &str,
        response_code: i32,
        response_body: &serde_json::Value,
    ) -> Result<()>;

    // ==================== 事务控制 ====================

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// 参考数据只读查询
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn get_action_config(&self, action_type: &str) -> Result<Option<ActionConfig>>;

    async fn get_item_config(&self, item_code: &str) -> Result<Option<ItemConfig>>;
}
