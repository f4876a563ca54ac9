//! 服务层数据传输对象
//!
//! 结果以 camelCase JSON 缓存在幂等记录中，重放时原样反序列化返回

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 获取积分结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarnResult {
    pub success: bool,
    pub points_earned: i64,
    /// 获取后的有效余额
    pub new_balance: i64,
    pub expires_at: Option<DateTime<Utc>>,
    /// 获取流水 ID
    pub transaction_id: Uuid,
}

/// 兑换结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemResult {
    pub success: bool,
    pub points_deducted: i64,
    pub new_balance: i64,
    pub redemption_id: Uuid,
    /// 兑换流水 ID
    pub transaction_id: Uuid,
}

/// 余额汇总
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSummary {
    /// 有效余额
    pub balance: i64,
    /// 即将过期的积分数
    pub expiring_soon: i64,
    /// 即将过期批次中最早的过期时间
    pub next_expiry_at: Option<DateTime<Utc>>,
}

impl BalanceSummary {
    pub fn empty() -> Self {
        Self {
            balance: 0,
            expiring_soon: 0,
            next_expiry_at: None,
        }
    }
}
