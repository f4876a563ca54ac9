//! 积分流水实体
//!
//! 追加写入、不可变。每条记录同时保存变动前后余额，
//! 按创建时间排列即可还原用户余额的完整审计链。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::TransactionType;

/// 积分流水
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: Uuid,
    pub user_id: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub entry_type: TransactionType,
    /// 带符号积分变动（earn 为正，redeem/expire 为负）
    pub points: i64,
    /// 获取流水对应的行为类型，其余类型为空
    #[sqlx(default)]
    pub action_type: Option<String>,
    pub balance_before: i64,
    pub balance_after: i64,
    /// 关联的批次 ID 或兑换记录 ID
    pub ref_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// 校验 balance_after = balance_before + points
    pub fn is_balanced(&self) -> bool {
        self.balance_after == self.balance_before + self.points
    }
}

/// 新建流水参数
///
/// `points` 为绝对值，符号由 `entry_type` 决定
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub user_id: String,
    pub entry_type: TransactionType,
    pub points: i64,
    pub action_type: Option<String>,
    pub balance_before: i64,
    pub ref_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl NewLedgerEntry {
    /// 获取流水
    pub fn earn(
        user_id: &str,
        action_type: &str,
        points: i64,
        balance_before: i64,
        batch_id: Uuid,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            entry_type: TransactionType::Earn,
            points,
            action_type: Some(action_type.to_string()),
            balance_before,
            ref_id: batch_id,
            created_at: now,
        }
    }

    /// 兑换流水
    pub fn redeem(
        user_id: &str,
        points_cost: i64,
        balance_before: i64,
        redemption_id: Uuid,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            entry_type: TransactionType::Redeem,
            points: points_cost,
            action_type: None,
            balance_before,
            ref_id: redemption_id,
            created_at: now,
        }
    }

    /// 过期流水
    pub fn expire(
        user_id: &str,
        points: i64,
        balance_before: i64,
        batch_id: Uuid,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            entry_type: TransactionType::Expire,
            points,
            action_type: None,
            balance_before,
            ref_id: batch_id,
            created_at: now,
        }
    }

    /// 生成完整流水，计算带符号积分与变动后余额
    pub fn into_entry(self) -> LedgerEntry {
        let signed = self.points.abs() * self.entry_type.sign();
        LedgerEntry {
            id: Uuid::now_v7(),
            user_id: self.user_id,
            entry_type: self.entry_type,
            points: signed,
            action_type: self.action_type,
            balance_before: self.balance_before,
            balance_after: self.balance_before + signed,
            ref_id: self.ref_id,
            created_at: self.created_at,
        }
    }
}
