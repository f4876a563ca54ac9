//! 幂等管理
//!
//! 两阶段检查：事务外快速查缓存，事务内通过条件插入占位做权威判定。
//! 同一 (key, user_id) 的并发请求中只有一个能占位成功，
//! 其余请求要么重放已完成的响应，要么以冲突失败。

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{ConflictReason, PointsError, Result};
use crate::models::IdempotencyRecord;
use crate::repository::{LedgerStore, LedgerTx};

/// 成功响应码
pub const SUCCESS_RESPONSE_CODE: i32 = 200;

/// 占位结果
#[derive(Debug, Clone, PartialEq)]
pub enum SlotOutcome<T> {
    /// 本请求获得占位，继续执行业务
    Acquired,
    /// 已有完成的响应，直接返回
    Cached(T),
}

/// 幂等管理器
#[derive(Clone)]
pub struct IdempotencyManager {
    store: Arc<dyn LedgerStore>,
    ttl: Duration,
}

impl IdempotencyManager {
    pub fn new(store: Arc<dyn LedgerStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// 事务外快速检查
    ///
    /// 相同 key 被其他用户使用过时直接冲突（不论是否过期）；
    /// 本用户在有效期内已完成的响应视为命中。
    pub async fn check_cache<T: DeserializeOwned>(
        &self,
        key: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<T>> {
        let records = self.store.find_idempotency_records(key).await?;

        if records.iter().any(|r| r.user_id != user_id) {
            warn!(key = %key, user_id = %user_id, "幂等 key 已被其他用户使用");
            return Err(PointsError::conflict(key, ConflictReason::KeyOwnedByOtherUser));
        }

        let Some(record) = records.into_iter().find(|r| r.user_id == user_id) else {
            return Ok(None);
        };
        if !record.is_fresh(now, self.ttl) {
            return Ok(None);
        }

        match record.completed_body() {
            Some(body) => {
                debug!(key = %key, user_id = %user_id, "幂等缓存命中（事务外）");
                Ok(Some(serde_json::from_value(body.clone())?))
            }
            None => Ok(None),
        }
    }

    /// 事务内占位
    pub async fn occupy_slot<T: DeserializeOwned>(
        &self,
        tx: &mut dyn LedgerTx,
        key: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SlotOutcome<T>> {
        let placeholder = IdempotencyRecord::pending(key, user_id, now);
        if tx.try_insert_idempotency_placeholder(&placeholder).await? {
            return Ok(SlotOutcome::Acquired);
        }

        let existing = tx.lock_idempotency_record(key, user_id).await?.ok_or_else(|| {
            PointsError::Internal(format!("幂等记录插入冲突但读取不到: key={}", key))
        })?;

        if !existing.is_fresh(now, self.ttl) {
            debug!(key = %key, user_id = %user_id, "幂等记录已过期，重新占位");
            tx.reclaim_idempotency_record(&placeholder).await?;
            return Ok(SlotOutcome::Acquired);
        }

        match existing.completed_body() {
            Some(body) => {
                debug!(key = %key, user_id = %user_id, "幂等缓存命中（事务内）");
                Ok(SlotOutcome::Cached(serde_json::from_value(body.clone())?))
            }
            None => {
                warn!(key = %key, user_id = %user_id, "相同请求仍在处理中");
                Err(PointsError::conflict(key, ConflictReason::RequestInFlight))
            }
        }
    }

    /// 用最终响应覆盖占位记录
    pub async fn cache_response<T: Serialize>(
        &self,
        tx: &mut dyn LedgerTx,
        key: &str,
        user_id: &str,
        response: &T,
    ) -> Result<()> {
        let body = serde_json::to_value(response)?;
        tx.complete_idempotency_record(key, user_id, SUCCESS_RESPONSE_CODE, &body)
            .await
    }
}
