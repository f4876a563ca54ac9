//! 积分账本错误类型
//!
//! 定义服务层的业务错误和系统错误

use std::fmt;

use thiserror::Error;

/// 幂等冲突原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    /// 相同 key 已被其他用户使用
    KeyOwnedByOtherUser,
    /// 相同请求仍在处理中
    RequestInFlight,
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyOwnedByOtherUser => write!(f, "相同 key 不同 userId"),
            Self::RequestInFlight => write!(f, "请求处理中，请勿重复提交"),
        }
    }
}

/// 积分账本错误类型
#[derive(Debug, Error)]
pub enum PointsError {
    // === 校验错误 ===
    #[error("未知的 actionType: {0}")]
    InvalidAction(String),

    #[error("商品不存在或已下架: {0}")]
    InvalidItem(String),

    // === 业务规则错误 ===
    #[error("该行为积分已达频率上限，请稍后再试: action_type={action_type}, retry_after={retry_after}")]
    RateLimited { action_type: String, retry_after: i64 },

    #[error("积分余额不足: 当前 {current_balance}, 需要 {required}")]
    InsufficientPoints { current_balance: i64, required: i64 },

    // === 幂等错误 ===
    #[error("幂等冲突: key={key}, {reason}")]
    IdempotencyConflict { key: String, reason: ConflictReason },

    // === 系统错误 ===
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON 序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 积分账本 Result 类型别名
pub type Result<T> = std::result::Result<T, PointsError>;

impl PointsError {
    /// 检查是否为可重试的错误
    ///
    /// 幂等冲突与业务错误需由客户端处理，不可自动重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }

    /// 检查是否为业务错误（非系统错误）
    pub fn is_business_error(&self) -> bool {
        !matches!(
            self,
            Self::Database(_) | Self::Serialization(_) | Self::Internal(_)
        )
    }

    /// 获取错误码（供调用方映射传输层状态码）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidAction(_) => "INVALID_ACTION",
            Self::InvalidItem(_) => "INVALID_ITEM",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::InsufficientPoints { .. } => "INSUFFICIENT_POINTS",
            Self::IdempotencyConflict { .. } => "IDEMPOTENCY_CONFLICT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub(crate) fn conflict(key: &str, reason: ConflictReason) -> Self {
        Self::IdempotencyConflict {
            key: key.to_string(),
            reason,
        }
    }
}
