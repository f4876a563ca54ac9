//! 积分账本枚举类型定义
//!
//! 所有枚举都支持数据库（sqlx）和 JSON（serde）序列化

use serde::{Deserialize, Serialize};

/// 积分批次状态
///
/// `Expired` 与 `Redeemed` 为终态，不会再发生转换
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum BatchStatus {
    /// 有效 - 仍有可用积分（可能已被部分扣减）
    #[default]
    Active,
    /// 已过期 - 惰性过期处理后余量清零
    Expired,
    /// 已兑换 - 余量被 FIFO 扣减至 0
    Redeemed,
}

impl BatchStatus {
    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

/// 积分流水类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum TransactionType {
    /// 获取（+）
    Earn,
    /// 兑换（-）
    Redeem,
    /// 过期（-）
    Expire,
}

impl TransactionType {
    /// 返回该流水类型的积分符号
    pub fn sign(&self) -> i64 {
        match self {
            Self::Earn => 1,
            Self::Redeem | Self::Expire => -1,
        }
    }
}
