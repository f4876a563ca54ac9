//! 积分批次仓储
//!
//! 提供批次的数据访问，支持事务和行级锁

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{BatchStatus, PointsBatch};

/// 积分批次仓储
pub struct PointsBatchRepository {
    pool: PgPool,
}

impl PointsBatchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ==================== 查询操作 ====================

    /// 列出用户的所有批次（不加锁，按发放时间排序）
    pub async fn list_by_user(&self, user_id: &str) -> Result<Vec<PointsBatch>> {
        let batches = sqlx::query_as::<_, PointsBatch>(
            r#"
            SELECT id, user_id, action_type, original_pts, remaining_pts,
                   issued_at, expires_at, status
            FROM points_batches
            WHERE user_id = $1
            ORDER BY issued_at ASC, id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(batches)
    }

    // ==================== 事务操作 ====================

    /// 在事务中锁定用户所有 active 批次
    ///
    /// 先取用户级事务咨询锁（提交或回滚时释放），同一用户的事务在此串行化，
    /// 其后的查询都能读到前一事务新插入的批次与流水；再按固定顺序 FOR UPDATE 锁定批次行
    pub async fn lock_active_in_tx(
        tx: &mut PgConnection,
        user_id: &str,
    ) -> Result<Vec<PointsBatch>> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let batches = sqlx::query_as::<_, PointsBatch>(
            r#"
            SELECT id, user_id, action_type, original_pts, remaining_pts,
                   issued_at, expires_at, status
            FROM points_batches
            WHERE user_id = $1 AND status = 'active'
            ORDER BY expires_at ASC NULLS LAST, issued_at ASC, id ASC
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_all(tx)
        .await?;

        Ok(batches)
    }

    /// 在事务中创建批次
    pub async fn create_in_tx(tx: &mut PgConnection, batch: &PointsBatch) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO points_batches
                (id, user_id, action_type, original_pts, remaining_pts, issued_at, expires_at, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(batch.id)
        .bind(&batch.user_id)
        .bind(&batch.action_type)
        .bind(batch.original_pts)
        .bind(batch.remaining_pts)
        .bind(batch.issued_at)
        .bind(batch.expires_at)
        .bind(batch.status)
        .execute(tx)
        .await?;

        Ok(())
    }

    /// 在事务中更新批次余量与状态
    pub async fn update_in_tx(
        tx: &mut PgConnection,
        batch_id: Uuid,
        remaining_pts: i64,
        status: BatchStatus,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE points_batches
            SET remaining_pts = $2, status = $3
            WHERE id = $1
            "#,
        )
        .bind(batch_id)
        .bind(remaining_pts)
        .bind(status)
        .execute(tx)
        .await?;

        Ok(())
    }
}
