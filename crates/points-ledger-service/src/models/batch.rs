//! 积分批次实体
//!
//! 每次获取积分产生一个独立批次，拥有各自的过期时间

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::BatchStatus;

/// 积分批次
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PointsBatch {
    pub id: Uuid,
    pub user_id: String,
    /// 产生该批次的行为类型
    pub action_type: String,
    /// 发放时的积分数（> 0）
    pub original_pts: i64,
    /// 剩余可用积分（0 ≤ remaining_pts ≤ original_pts）
    pub remaining_pts: i64,
    pub issued_at: DateTime<Utc>,
    /// 过期时间（null 表示永不过期）
    #[sqlx(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub status: BatchStatus,
}

impl PointsBatch {
    /// 在 `now` 时刻是否已过期
    ///
    /// 过期时间恰好等于 now 时仍视为有效
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|t| t < now)
    }

    /// 是否有效可用（状态 active 且未过期）
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        self.status == BatchStatus::Active && !self.is_expired(now)
    }

    /// 是否在 `deadline` 之前（含）到期
    pub fn expires_by(&self, deadline: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|t| t <= deadline)
    }
}

/// 新建批次参数
#[derive(Debug, Clone)]
pub struct NewPointsBatch {
    pub user_id: String,
    pub action_type: String,
    pub points: i64,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewPointsBatch {
    /// 生成完整批次（ID 使用时间有序的 UUID v7）
    pub fn into_batch(self) -> PointsBatch {
        PointsBatch {
            id: Uuid::now_v7(),
            user_id: self.user_id,
            action_type: self.action_type,
            original_pts: self.points,
            remaining_pts: self.points,
            issued_at: self.issued_at,
            expires_at: self.expires_at,
            status: BatchStatus::Active,
        }
    }
}
