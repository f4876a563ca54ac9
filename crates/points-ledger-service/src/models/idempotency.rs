//! 幂等记录实体
//!
//! 以 (key, user_id) 唯一。记录先以占位状态写入，事务提交前被最终响应覆盖。
//! 持久化时 response_code = 0 表示占位。

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// 占位记录在数据库中的响应码
pub const PENDING_RESPONSE_CODE: i32 = 0;

/// 幂等记录状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum IdempotencyState {
    /// 请求处理中（占位）
    Pending,
    /// 已完成，保存最终响应
    #[serde(rename_all = "camelCase")]
    Completed {
        response_code: i32,
        response_body: serde_json::Value,
    },
}

/// 幂等记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdempotencyRecord {
    pub key: String,
    pub user_id: String,
    pub state: IdempotencyState,
    pub created_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    /// 新建占位记录
    pub fn pending(key: &str, user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            key: key.to_string(),
            user_id: user_id.to_string(),
            state: IdempotencyState::Pending,
            created_at: now,
        }
    }

    /// 是否仍在可重放窗口内（创建后 ttl 以内）
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.created_at < ttl
    }

    /// 已完成时返回缓存的响应体
    pub fn completed_body(&self) -> Option<&serde_json::Value> {
        match &self.state {
            IdempotencyState::Completed { response_body, .. } => Some(response_body),
            IdempotencyState::Pending => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, IdempotencyState::Pending)
    }

    /// 数据库列值：(response_code, response_body)
    pub fn to_columns(&self) -> (i32, serde_json::Value) {
        match &self.state {
            IdempotencyState::Pending => (PENDING_RESPONSE_CODE, serde_json::json!({})),
            IdempotencyState::Completed {
                response_code,
                response_body,
            } => (*response_code, response_body.clone()),
        }
    }
}

/// idempotency_keys 表的行映射
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IdempotencyRow {
    pub key: String,
    pub user_id: String,
    pub response_code: i32,
    pub response_body: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<IdempotencyRow> for IdempotencyRecord {
    fn from(row: IdempotencyRow) -> Self {
        let state = if row.response_code == PENDING_RESPONSE_CODE {
            IdempotencyState::Pending
        } else {
            IdempotencyState::Completed {
                response_code: row.response_code,
                response_body: row.response_body,
            }
        };

        Self {
            key: row.key,
            user_id: row.user_id,
            state,
            created_at: row.created_at,
        }
    }
}
