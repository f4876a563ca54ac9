//! 兑换记录仓储

use sqlx::{PgConnection, PgPool};

use crate::error::Result;
use crate::models::Redemption;

pub struct RedemptionRepository {
    pool: PgPool,
}

impl RedemptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_by_user(&self, user_id: &str) -> Result<Vec<Redemption>> {
        let redemptions = sqlx::query_as::<_, Redemption>(
            r#"
            SELECT id, user_id, item_code, points_cost, created_at
            FROM redemptions
            WHERE user_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(redemptions)
    }

    /// 在事务中创建兑换记录
    pub async fn create_in_tx(tx: &mut PgConnection, redemption: &Redemption) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO redemptions (id, user_id, item_code, points_cost, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(redemption.id)
        .bind(&redemption.user_id)
        .bind(&redemption.item_code)
        .bind(redemption.points_cost)
        .bind(redemption.created_at)
        .execute(tx)
        .await?;

        Ok(())
    }
}
