//! 滑动窗口频率限制
//!
//! 窗口内的获取流水就是计数依据，无需额外状态

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::error::{PointsError, Result};
use crate::models::ActionConfig;
use crate::repository::LedgerTx;

/// 频率限制器
#[derive(Debug, Clone, Copy, Default)]
pub struct RateLimiter;

impl RateLimiter {
    pub fn new() -> Self {
        Self
    }

    /// 统计 [now - window, now] 内的获取次数，达到上限时返回 `RateLimited`
    pub async fn check_and_throw(
        &self,
        tx: &mut dyn LedgerTx,
        user_id: &str,
        config: &ActionConfig,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let window = config.rate_limit_window()?;
        let window_start = now.checked_sub_signed(window).ok_or_else(|| {
            PointsError::Internal(format!(
                "频率窗口起点超出范围: action_type={}",
                config.action_type
            ))
        })?;

        let count = tx
            .count_earn_entries_since(user_id, &config.action_type, window_start)
            .await?;
        if count < config.rate_limit_max {
            return Ok(());
        }

        let earliest = tx
            .earliest_earn_entry_since(user_id, &config.action_type, window_start)
            .await?;
        let retry_at = earliest
            .unwrap_or(now)
            .checked_add_signed(window)
            .ok_or_else(|| {
                PointsError::Internal(format!(
                    "频率限制重试时间超出范围: action_type={}",
                    config.action_type
                ))
            })?;
        let retry_after = ceil_unix_seconds(retry_at);

        warn!(
            user_id = %user_id,
            action_type = %config.action_type,
            count,
            max = config.rate_limit_max,
            retry_after,
            "获取积分触发频率限制"
        );

        Err(PointsError::RateLimited {
            action_type: config.action_type.clone(),
            retry_after,
        })
    }
}

/// 向上取整到 Unix 秒
fn ceil_unix_seconds(at: DateTime<Utc>) -> i64 {
    let secs = at.timestamp();
    if at.timestamp_subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}
