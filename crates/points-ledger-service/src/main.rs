//! 积分账本运维工具入口
//!
//! 加载配置、初始化可观测性与数据库连接后执行子命令，结果以 JSON 打印到标准输出。

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use points_shared::{
    config::{AppConfig, CatalogSource},
    database::Database,
    observability,
};
use tracing::info;

use points_ledger::{
    cli::{Cli, CommandRunner, Commands},
    clock::SystemClock,
    repository::{CatalogRepository, PgCatalogRepository, PgLedgerStore, StaticCatalog},
    service::PointsLedger,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. 加载配置
    let config = AppConfig::load(&cli.service_name)?;

    // 2. 初始化可观测性
    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!(
        environment = %config.environment,
        catalog_source = ?config.ledger.catalog_source,
        "Configuration loaded"
    );

    // 3. 连接数据库
    let db = Database::connect(&config.database).await?;
    info!("Database connection established");

    if cli.command == Commands::Migrate {
        db.run_migrations().await?;
        println!("{}", serde_json::json!({ "success": true, "migrated": true }));
        return Ok(());
    }

    // 4. 组装账本
    let pool = db.pool().clone();
    let catalog: Arc<dyn CatalogRepository> = match config.ledger.catalog_source {
        CatalogSource::Database => Arc::new(PgCatalogRepository::new(pool.clone())),
        CatalogSource::Static => Arc::new(StaticCatalog::from_config(&config.ledger)),
    };
    let ledger = PointsLedger::new(
        Arc::new(PgLedgerStore::new(pool)),
        catalog,
        Arc::new(SystemClock),
        &config.ledger,
    );

    // 5. 执行命令
    let output = CommandRunner::new(ledger).run(&cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    db.close().await;
    Ok(())
}
