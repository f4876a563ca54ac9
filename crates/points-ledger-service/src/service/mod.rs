//! 服务层
//!
//! 幂等、频率限制、余额计算与获取/兑换引擎

pub mod balance_service;
pub mod dto;
pub mod earn_service;
pub mod idempotency;
pub mod ledger_service;
pub mod rate_limiter;
pub mod redeem_service;

pub use balance_service::BalanceCalculator;
pub use dto::{BalanceSummary, EarnResult, RedeemResult};
pub use earn_service::EarnEngine;
pub use idempotency::{IdempotencyManager, SUCCESS_RESPONSE_CODE, SlotOutcome};
pub use ledger_service::PointsLedger;
pub use rate_limiter::RateLimiter;
pub use redeem_service::{Deduction, RedeemEngine, plan_fifo_deduction};
