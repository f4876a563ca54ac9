//! 参考数据仓储
//!
//! 行为积分配置与兑换商品配置，支持数据库和静态配置两种来源

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;

use points_shared::config::LedgerConfig;

use super::traits::CatalogRepository;
use crate::error::Result;
use crate::models::{ActionConfig, ItemConfig};

/// 基于 action_configs / item_configs 表的参考数据仓储
pub struct PgCatalogRepository {
    pool: PgPool,
}

impl PgCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogRepository for PgCatalogRepository {
    async fn get_action_config(&self, action_type: &str) -> Result<Option<ActionConfig>> {
        let config = sqlx::query_as::<_, ActionConfig>(
            r#"
            SELECT action_type, points, validity_days, rate_limit_window_seconds, rate_limit_max
            FROM action_configs
            WHERE action_type = $1
            "#,
        )
        .bind(action_type)
        .fetch_optional(&self.pool)
        .await?;

        Ok(config)
    }

    async fn get_item_config(&self, item_code: &str) -> Result<Option<ItemConfig>> {
        let config = sqlx::query_as::<_, ItemConfig>(
            r#"
            SELECT item_code, points_cost, is_active
            FROM item_configs
            WHERE item_code = $1
            "#,
        )
        .bind(item_code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(config)
    }
}

/// 内存参考数据
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    actions: HashMap<String, ActionConfig>,
    items: HashMap<String, ItemConfig>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从配置文件中的 actions / items 构建
    pub fn from_config(config: &LedgerConfig) -> Self {
        config
            .actions
            .iter()
            .cloned()
            .map(ActionConfig::from)
            .fold(Self::new(), Self::with_action)
            .with_items(config.items.iter().cloned().map(ItemConfig::from))
    }

    pub fn with_action(mut self, action: ActionConfig) -> Self {
        self.actions.insert(action.action_type.clone(), action);
        self
    }

    pub fn with_item(mut self, item: ItemConfig) -> Self {
        self.items.insert(item.item_code.clone(), item);
        self
    }

    fn with_items(self, items: impl IntoIterator<Item = ItemConfig>) -> Self {
        items.into_iter().fold(self, Self::with_item)
    }
}

#[async_trait]
impl CatalogRepository for StaticCatalog {
    async fn get_action_config(&self, action_type: &str) -> Result<Option<ActionConfig>> {
        Ok(self.actions.get(action_type).cloned())
    }

    async fn get_item_config(&self, item_code: &str) -> Result<Option<ItemConfig>> {
        Ok(self.items.get(item_code).cloned())
    }
}
