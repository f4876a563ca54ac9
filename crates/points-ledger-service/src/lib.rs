//! 积分账本服务
//!
//! 以批次为单位管理用户积分，每个批次有独立的过期时间。
//!
//! ## 核心功能
//!
//! - **获取积分**：按行为配置发放批次，滑动窗口频率限制
//! - **兑换**：按过期时间先后（FIFO）从批次中扣减
//! - **余额查询**：惰性过期结转，统计即将过期积分
//! - **幂等**：客户端 key 保证重试请求只生效一次、只响应一次
//! - **审计流水**：每次变动记录变动前后余额
//!
//! ## 模块结构
//!
//! - `models`: 领域模型定义
//! - `error`: 错误类型定义
//! - `clock`: 时钟抽象
//! - `repository`: 存储层（Postgres 与内存实现）
//! - `service`: 业务服务层
//! - `cli`: 运维命令行

pub mod cli;
pub mod clock;
pub mod error;
pub mod models;
pub mod repository;
pub mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConflictReason, PointsError, Result};
pub use models::*;
pub use repository::{
    CatalogRepository, LedgerStore, LedgerTx, MemoryLedgerStore, PgCatalogRepository,
    PgLedgerStore, StaticCatalog,
};
pub use service::{
    BalanceCalculator, BalanceSummary, EarnEngine, EarnResult, IdempotencyManager, PointsLedger,
    RateLimiter, RedeemEngine, RedeemResult, dto,
};
