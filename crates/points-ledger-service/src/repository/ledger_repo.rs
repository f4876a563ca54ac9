//! 积分流水仓储
//!
//! 提供流水记录的数据访问，支持频率统计和审计追溯

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use crate::error::Result;
use crate::models::LedgerEntry;

/// 积分流水仓储
///
/// 流水只追加不修改，每条都带变动前后余额
pub struct LedgerRepository {
    pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 列出用户的全部流水（按时间正序，用于审计链校验）
    pub async fn list_by_user(&self, user_id: &str) -> Result<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT id, user_id, type, points, action_type, balance_before,
                   balance_after, ref_id, created_at
            FROM point_transactions
            WHERE user_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// 在事务中写入流水
    pub async fn create_in_tx(tx: &mut PgConnection, entry: &LedgerEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO point_transactions
                (id, user_id, type, points, action_type, balance_before, balance_after, ref_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(entry.id)
        .bind(&entry.user_id)
        .bind(entry.entry_type)
        .bind(entry.points)
        .bind(&entry.action_type)
        .bind(entry.balance_before)
        .bind(entry.balance_after)
        .bind(entry.ref_id)
        .bind(entry.created_at)
        .execute(tx)
        .await?;

        Ok(())
    }

    /// 在事务中统计窗口内的获取流水数
    pub async fn count_earn_since_in_tx(
        tx: &mut PgConnection,
        user_id: &str,
        action_type: &str,
        since: DateTime<Utc>,
    ) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM point_transactions
            WHERE user_id = $1 AND action_type = $2 AND type = 'earn' AND created_at >= $3
            "#,
        )
        .bind(user_id)
        .bind(action_type)
        .bind(since)
        .fetch_one(tx)
        .await?;

        Ok(count)
    }

    /// 在事务中查询窗口内最早一条获取流水的时间
    pub async fn earliest_earn_since_in_tx(
        tx: &mut PgConnection,
        user_id: &str,
        action_type: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        let earliest: Option<DateTime<Utc>> = sqlx::query_scalar(
            r#"
            SELECT MIN(created_at)
            FROM point_transactions
            WHERE user_id = $1 AND action_type = $2 AND type = 'earn' AND created_at >= $3
            "#,
        )
        .bind(user_id)
        .bind(action_type)
        .bind(since)
        .fetch_one(tx)
        .await?;

        Ok(earliest)
    }
}
