//! 积分账本领域模型
//!
//! 包含批次、流水、兑换记录、幂等记录与参考数据的实体定义

pub mod batch;
pub mod catalog;
pub mod enums;
pub mod idempotency;
pub mod ledger;
pub mod redemption;

// 重新导出常用类型
pub use batch::{NewPointsBatch, PointsBatch};
pub use catalog::{ActionConfig, ItemConfig};
pub use enums::{BatchStatus, TransactionType};
pub use idempotency::{IdempotencyRecord, IdempotencyState};
pub use ledger::{LedgerEntry, NewLedgerEntry};
pub use redemption::{NewRedemption, Redemption};
