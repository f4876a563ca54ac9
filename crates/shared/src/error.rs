//! 基础设施错误类型
//!
//! 覆盖配置加载、数据库连接与迁移等服务启动阶段的错误。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SharedError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("数据库迁移失败: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("配置错误: {0}")]
    Config(#[from] config::ConfigError),

    #[error("可观测性初始化失败: {0}")]
    Observability(String),
}

pub type Result<T> = std::result::Result<T, SharedError>;
