//! 兑换记录实体

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 兑换记录
///
/// 每次成功兑换生成一条，创建后不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Redemption {
    pub id: Uuid,
    pub user_id: String,
    pub item_code: String,
    pub points_cost: i64,
    pub created_at: DateTime<Utc>,
}

/// 新建兑换记录参数
#[derive(Debug, Clone)]
pub struct NewRedemption {
    pub user_id: String,
    pub item_code: String,
    pub points_cost: i64,
    pub created_at: DateTime<Utc>,
}

impl NewRedemption {
    pub fn into_redemption(self) -> Redemption {
        Redemption {
            id: Uuid::now_v7(),
            user_id: self.user_id,
            item_code: self.item_code,
            points_cost: self.points_cost,
            created_at: self.created_at,
        }
    }
}
