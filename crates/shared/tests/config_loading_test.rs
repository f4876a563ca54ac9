//! 配置加载集成测试
//!
//! 验证配置文件分层加载与环境变量覆盖。整个测试二进制只有一个用例，
//! 避免并发修改进程环境变量。

use std::fs;

use points_shared::config::{AppConfig, CatalogSource};

#[test]
fn test_load_layers_files_and_env_overrides() {
    let dir = std::env::temp_dir().join(format!("points-config-{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).unwrap();

    fs::write(
        dir.join("default.toml"),
        r#"
        [database]
        url = "postgres://default/points"
        max_connections = 4
        min_connections = 1
        connect_timeout_seconds = 5
        idle_timeout_seconds = 60

        [observability]
        log_level = "debug"

        [ledger]
        catalog_source = "static"

        [[ledger.actions]]
        action_type = "DAILY_LOGIN"
        points = 10
        validity_days = 30
        rate_limit_window_seconds = 86400
        rate_limit_max = 1
        "#,
    )
    .unwrap();

    fs::write(
        dir.join("points-ledger-service.toml"),
        r#"
        [ledger]
        expiring_soon_days = 3
        "#,
    )
    .unwrap();

    // SAFETY: 本测试二进制仅此一个用例，不存在并发读写环境变量
    unsafe {
        std::env::set_var("CONFIG_DIR", dir.to_str().unwrap());
        std::env::set_var("POINTS_ENV", "integration");
        std::env::set_var("POINTS_DATABASE__URL", "postgres://env/points");
    }

    let config = AppConfig::load("points-ledger-service").unwrap();

    unsafe {
        std::env::remove_var("CONFIG_DIR");
        std::env::remove_var("POINTS_ENV");
        std::env::remove_var("POINTS_DATABASE__URL");
    }
    fs::remove_dir_all(&dir).ok();

    assert_eq!(config.service_name, "points-ledger-service");
    assert_eq!(config.environment, "integration");
    assert_eq!(config.database.url, "postgres://env/points");
    assert_eq!(config.database.max_connections, 4);
    assert_eq!(config.observability.log_level, "debug");
    assert_eq!(config.ledger.catalog_source, CatalogSource::Static);
    assert_eq!(config.ledger.expiring_soon_days, 3);
    assert_eq!(config.ledger.idempotency_ttl_hours, 24);
    assert_eq!(config.ledger.actions.len(), 1);
    assert_eq!(config.ledger.actions[0].action_type, "DAILY_LOGIN");
}
