//! 数据访问层
//!
//! 服务层通过 trait 访问存储；Postgres 仓储以 `*_in_tx` 静态函数
//! 提供事务内操作，由 `PgLedgerStore` 组装。

mod batch_repo;
mod catalog_repo;
mod idempotency_repo;
mod ledger_repo;
mod memory_store;
mod pg_store;
mod redemption_repo;
mod traits;

pub use batch_repo::PointsBatchRepository;
pub use catalog_repo::{PgCatalogRepository, StaticCatalog};
pub use idempotency_repo::IdempotencyRepository;
pub use ledger_repo::LedgerRepository;
pub use memory_store::{MemoryLedgerStore, MemoryLedgerTx};
pub use pg_store::{PgLedgerStore, PgLedgerTx};
pub use redemption_repo::RedemptionRepository;
pub use traits::{CatalogRepository, LedgerStore, LedgerTx};

#[cfg(test)]
pub use traits::{MockCatalogRepository, MockLedgerStore};
