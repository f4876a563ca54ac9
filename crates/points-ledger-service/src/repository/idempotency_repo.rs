//! 幂等记录仓储
//!
//! 唯一约束 (key, user_id) 配合 INSERT ON CONFLICT DO NOTHING 实现原子占位

use sqlx::{PgConnection, PgPool};

use crate::error::Result;
use crate::models::IdempotencyRecord;
use crate::models::idempotency::IdempotencyRow;

pub struct IdempotencyRepository {
    pool: PgPool,
}

impl IdempotencyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 按 key 查询所有用户的记录（事务外快速检查）
    pub async fn find_by_key(&self, key: &str) -> Result<Vec<IdempotencyRecord>> {
        let rows = sqlx::query_as::<_, IdempotencyRow>(
            r#"
            SELECT key, user_id, response_code, response_body, created_at
            FROM idempotency_keys
            WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(IdempotencyRecord::from).collect())
    }

    /// 在事务中条件插入占位记录
    ///
    /// 返回是否插入成功。并发插入同一 (key, user_id) 时，
    /// 后到者会等待先到者事务结束后再判定冲突。
    pub async fn insert_placeholder_in_tx(
        tx: &mut PgConnection,
        record: &IdempotencyRecord,
    ) -> Result<bool> {
        let (code, body) = record.to_columns();
        let result = sqlx::query(
            r#"
            INSERT INTO idempotency_keys (key, user_id, response_code, response_body, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (key, user_id) DO NOTHING
            "#,
        )
        .bind(&record.key)
        .bind(&record.user_id)
        .bind(code)
        .bind(body)
        .bind(record.created_at)
        .execute(tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 在事务中加锁读取记录
    pub async fn get_for_update_in_tx(
        tx: &mut PgConnection,
        key: &str,
        user_id: &str,
    ) -> Result<Option<IdempotencyRecord>> {
        let row = sqlx::query_as::<_, IdempotencyRow>(
            r#"
            SELECT key, user_id, response_code, response_body, created_at
            FROM idempotency_keys
            WHERE key = $1 AND user_id = $2
            FOR UPDATE
            "#,
        )
        .bind(key)
        .bind(user_id)
        .fetch_optional(tx)
        .await?;

        Ok(row.map(IdempotencyRecord::from))
    }

    /// 在事务中整体覆盖记录（用于重置过期记录）
    pub async fn overwrite_in_tx(tx: &mut PgConnection, record: &IdempotencyRecord) -> Result<()> {
        let (code, body) = record.to_columns();
        sqlx::query(
            r#"
            UPDATE idempotency_keys
            SET response_code = $3, response_body = $4, created_at = $5
            WHERE key = $1 AND user_id = $2
            "#,
        )
        .bind(&record.key)
        .bind(&record.user_id)
        .bind(code)
        .bind(body)
        .bind(record.created_at)
        .execute(tx)
        .await?;

        Ok(())
    }

    /// 在事务中写入最终响应
    pub async fn complete_in_tx(
        tx: &mut PgConnection,
        key: &str,
        user_id: &str,
        response_code: i32,
        response_body: &serde_json::Value,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE idempotency_keys
            SET response_code = $3, response_body = $4
            WHERE key = $1 AND user_id = $2
            "#,
        )
        .bind(key)
        .bind(user_id)
        .bind(response_code)
        .bind(response_body)
        .execute(tx)
        .await?;

        Ok(())
    }
}
