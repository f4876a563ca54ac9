//! 参考数据：行为积分配置与兑换商品配置
//!
//! 由外部维护，账本只读

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use points_shared::config::{StaticActionConfig, StaticItemConfig};

use crate::error::{PointsError, Result};

/// 行为积分配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ActionConfig {
    pub action_type: String,
    /// 每次获取的积分数
    pub points: i64,
    /// 批次有效天数
    pub validity_days: i64,
    /// 频率限制窗口（秒）
    pub rate_limit_window_seconds: i64,
    /// 窗口内最多获取次数
    pub rate_limit_max: i64,
}

impl ActionConfig {
    /// 以 `issued_at` 为起点计算批次过期时间
    ///
    /// 有效天数超出时间可表示范围时返回 `Internal`
    pub fn expires_at(&self, issued_at: DateTime<Utc>) -> Result<DateTime<Utc>> {
        Duration::try_days(self.validity_days)
            .and_then(|validity| issued_at.checked_add_signed(validity))
            .ok_or_else(|| {
                PointsError::Internal(format!(
                    "行为配置有效天数超出范围: action_type={}, validity_days={}",
                    self.action_type, self.validity_days
                ))
            })
    }

    pub fn rate_limit_window(&self) -> Result<Duration> {
        Duration::try_seconds(self.rate_limit_window_seconds).ok_or_else(|| {
            PointsError::Internal(format!(
                "行为配置频率窗口超出范围: action_type={}, rate_limit_window_seconds={}",
                self.action_type, self.rate_limit_window_seconds
            ))
        })
    }
}

impl From<StaticActionConfig> for ActionConfig {
    fn from(c: StaticActionConfig) -> Self {
        Self {
            action_type: c.action_type,
            points: c.points,
            validity_days: c.validity_days,
            rate_limit_window_seconds: c.rate_limit_window_seconds,
            rate_limit_max: c.rate_limit_max,
        }
    }
}

/// 兑换商品配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ItemConfig {
    pub item_code: String,
    pub points_cost: i64,
    pub is_active: bool,
}

impl From<StaticItemConfig> for ItemConfig {
    fn from(c: StaticItemConfig) -> Self {
        Self {
            item_code: c.item_code,
            points_cost: c.points_cost,
            is_active: c.is_active,
        }
    }
}
