//! PostgreSQL 集成测试
//!
//! 使用真实数据库验证用户锁、行锁、条件插入与事务回滚。
//! 同一用户的并发竞争只能在这里覆盖，内存存储把所有事务串行化。
//!
//! ## 运行方式
//!
//! ```bash
//! DATABASE_URL=postgres://... cargo test --test pg_ledger_test -- --ignored
//! ```

use std::sync::Arc;

use chrono::{Duration, Utc};
use futures::future::join_all;
use sqlx::PgPool;

use points_ledger::{
    BatchStatus, LedgerEntry, NewPointsBatch, PgCatalogRepository, PgLedgerStore, PointsError,
    PointsLedger, SystemClock, TransactionType,
    repository::{LedgerRepository, PointsBatchRepository, RedemptionRepository},
};
use points_shared::config::LedgerConfig;
use points_shared::database::Database;
use points_shared::observability::tracing::init_for_tests;
use points_shared::test_utils::{
    TestAssertions, test_database_config, test_idempotency_key, test_user_id,
};

const ACTION: &str = "PG_TEST_CHECKIN";
const ONCE_PER_HOUR: &str = "PG_TEST_ONCE_PER_HOUR";
const ITEM: &str = "PG_TEST_COUPON";

// ==================== 辅助函数 ====================

async fn setup() -> (PgPool, PointsLedger) {
    init_for_tests();
    let db = Database::connect(&test_database_config())
        .await
        .expect("数据库连接失败");
    db.run_migrations().await.expect("迁移失败");
    let pool = db.pool().clone();

    for (action_type, rate_limit_window_seconds, rate_limit_max) in
        [(ACTION, 60_i64, 100_i64), (ONCE_PER_HOUR, 3600, 1)]
    {
        sqlx::query(
            r#"
            INSERT INTO action_configs (action_type, points, validity_days, rate_limit_window_seconds, rate_limit_max)
            VALUES ($1, 40, 30, $2, $3)
            ON CONFLICT (action_type) DO UPDATE SET
                points = EXCLUDED.points,
                rate_limit_window_seconds = EXCLUDED.rate_limit_window_seconds,
                rate_limit_max = EXCLUDED.rate_limit_max
            "#,
        )
        .bind(action_type)
        .bind(rate_limit_window_seconds)
        .bind(rate_limit_max)
        .execute(&pool)
        .await
        .expect("插入行为配置失败");
    }

    sqlx::query(
        r#"
        INSERT INTO item_configs (item_code, points_cost, is_active)
        VALUES ($1, 50, TRUE)
        ON CONFLICT (item_code) DO UPDATE SET points_cost = EXCLUDED.points_cost
        "#,
    )
    .bind(ITEM)
    .execute(&pool)
    .await
    .expect("插入商品配置失败");

    let ledger = PointsLedger::new(
        Arc::new(PgLedgerStore::new(pool.clone())),
        Arc::new(PgCatalogRepository::new(pool.clone())),
        Arc::new(SystemClock),
        &LedgerConfig::default(),
    );

    (pool, ledger)
}

async fn seed_batch(pool: &PgPool, user_id: &str, points: i64, expires_in: Duration) {
    let now = Utc::now();
    let batch = NewPointsBatch {
        user_id: user_id.to_string(),
        action_type: ACTION.to_string(),
        points,
        issued_at: now - Duration::days(1),
        expires_at: Some(now + expires_in),
    }
    .into_batch();

    let mut conn = pool.acquire().await.expect("获取连接失败");
    PointsBatchRepository::create_in_tx(&mut *conn, &batch)
        .await
        .expect("插入批次失败");
}

/// 断言每条流水自洽且相邻流水首尾相接，返回按提交顺序排列的流水
///
/// created_at 取自请求开始时刻，并发下不等于提交顺序；
/// 流水 ID 为 UUID v7，在用户锁内生成，进程内单调递增
fn assert_audit_chain(mut entries: Vec<LedgerEntry>) -> Vec<LedgerEntry> {
    entries.sort_by_key(|e| e.id);
    assert!(entries.iter().all(|e| e.is_balanced()));
    for pair in entries.windows(2) {
        assert_eq!(pair[1].balance_before, pair[0].balance_after);
    }
    entries
}

// ==================== 测试 ====================

#[tokio::test]
#[ignore = "需要 PostgreSQL 数据库连接"]
async fn test_pg_earn_redeem_flow() {
    let (pool, ledger) = setup().await;
    let user = test_user_id();

    ledger.earn(&user, ACTION, None).await.unwrap();
    let earned = ledger.earn(&user, ACTION, None).await.unwrap();
    assert_eq!(earned.new_balance, 80);
    TestAssertions::assert_time_within(
        earned.expires_at.unwrap(),
        Utc::now() + Duration::days(30),
        Duration::minutes(1),
    );

    let redeemed = ledger.redeem(&user, ITEM, None).await.unwrap();
    assert_eq!(redeemed.new_balance, 30);

    let batches = PointsBatchRepository::new(pool.clone())
        .list_by_user(&user)
        .await
        .unwrap();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].status, BatchStatus::Redeemed);
    assert_eq!(batches[1].remaining_pts, 30);

    let entries = LedgerRepository::new(pool.clone())
        .list_by_user(&user)
        .await
        .unwrap();
    let entries = assert_audit_chain(entries);
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[2].entry_type, TransactionType::Redeem);

    let redemptions = RedemptionRepository::new(pool)
        .list_by_user(&user)
        .await
        .unwrap();
    assert_eq!(redemptions.len(), 1);
    assert_eq!(redemptions[0].id, redeemed.redemption_id);
    assert_eq!(redemptions[0].item_code, ITEM);
    assert_eq!(redemptions[0].points_cost, 50);
}

#[tokio::test]
#[ignore = "需要 PostgreSQL 数据库连接"]
async fn test_pg_lazy_expiry_persists() {
    let (pool, ledger) = setup().await;
    let user = test_user_id();
    seed_batch(&pool, &user, 25, -Duration::hours(1)).await;
    seed_batch(&pool, &user, 10, Duration::days(3)).await;

    let summary = ledger.get_balance(&user).await.unwrap();
    assert_eq!(summary.balance, 10);
    assert_eq!(summary.expiring_soon, 10);

    ledger.get_balance(&user).await.unwrap();
    let entries = LedgerRepository::new(pool).list_by_user(&user).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].entry_type, TransactionType::Expire);
    assert_eq!(entries[0].points, -25);
    assert_eq!(entries[0].balance_before, 35);
}

#[tokio::test]
#[ignore = "需要 PostgreSQL 数据库连接"]
async fn test_pg_idempotent_replay() {
    let (pool, ledger) = setup().await;
    let user = test_user_id();
    let key = test_idempotency_key();

    let first = ledger.earn(&user, ACTION, Some(&key)).await.unwrap();
    let second = ledger.earn(&user, ACTION, Some(&key)).await.unwrap();
    assert_eq!(first, second);

    let err = ledger
        .earn(&test_user_id(), ACTION, Some(&key))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "IDEMPOTENCY_CONFLICT");

    let batches = PointsBatchRepository::new(pool).list_by_user(&user).await.unwrap();
    assert_eq!(batches.len(), 1);
}

#[tokio::test]
#[ignore = "需要 PostgreSQL 数据库连接"]
async fn test_pg_concurrent_redeems_serialize_on_row_locks() {
    let (pool, ledger) = setup().await;
    let user = test_user_id();
    seed_batch(&pool, &user, 60, Duration::days(5)).await;
    seed_batch(&pool, &user, 60, Duration::days(9)).await;

    let tasks = (0..5).map(|_| {
        let ledger = ledger.clone();
        let user = user.clone();
        tokio::spawn(async move { ledger.redeem(&user, ITEM, None).await })
    });
    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 2);
    assert!(
        results
            .iter()
            .filter(|r| r.is_err())
            .all(|r| matches!(r, Err(PointsError::InsufficientPoints { .. })))
    );
    assert_eq!(ledger.get_balance(&user).await.unwrap().balance, 20);

    let redemptions = RedemptionRepository::new(pool.clone())
        .list_by_user(&user)
        .await
        .unwrap();
    assert_eq!(redemptions.len(), 2);
    let entries = LedgerRepository::new(pool).list_by_user(&user).await.unwrap();
    assert_audit_chain(entries);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "需要 PostgreSQL 数据库连接"]
async fn test_pg_concurrent_earns_respect_rate_limit_for_new_user() {
    let (pool, ledger) = setup().await;
    let user = test_user_id();

    let tasks = (0..8).map(|_| {
        let ledger = ledger.clone();
        let user = user.clone();
        tokio::spawn(async move { ledger.earn(&user, ONCE_PER_HOUR, None).await })
    });
    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .filter(|r| r.is_err())
            .all(|r| matches!(r, Err(PointsError::RateLimited { .. })))
    );

    let batches = PointsBatchRepository::new(pool).list_by_user(&user).await.unwrap();
    assert_eq!(batches.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "需要 PostgreSQL 数据库连接"]
async fn test_pg_concurrent_earns_keep_audit_chain() {
    let (pool, ledger) = setup().await;
    let user = test_user_id();
    ledger.earn(&user, ACTION, None).await.unwrap();

    let tasks = (0..8).map(|_| {
        let ledger = ledger.clone();
        let user = user.clone();
        tokio::spawn(async move { ledger.earn(&user, ACTION, None).await })
    });
    let mut new_balances: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap().new_balance)
        .collect();

    // 串行化后每个请求看到的余额各不相同
    new_balances.sort_unstable();
    assert_eq!(new_balances, (2..=9).map(|n| n * 40).collect::<Vec<_>>());

    let entries = LedgerRepository::new(pool).list_by_user(&user).await.unwrap();
    let entries = assert_audit_chain(entries);
    assert_eq!(entries.len(), 9);
    assert_eq!(entries.last().unwrap().balance_after, 360);
    assert_eq!(ledger.get_balance(&user).await.unwrap().balance, 360);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "需要 PostgreSQL 数据库连接"]
async fn test_pg_concurrent_earns_and_redeems_keep_audit_chain() {
    let (pool, ledger) = setup().await;
    let user = test_user_id();
    seed_batch(&pool, &user, 200, Duration::days(10)).await;

    let earns = (0..4).map(|_| {
        let ledger = ledger.clone();
        let user = user.clone();
        tokio::spawn(async move { ledger.earn(&user, ACTION, None).await.map(|_| ()) })
    });
    let redeems = (0..4).map(|_| {
        let ledger = ledger.clone();
        let user = user.clone();
        tokio::spawn(async move { ledger.redeem(&user, ITEM, None).await.map(|_| ()) })
    });
    for joined in join_all(earns.chain(redeems)).await {
        joined.unwrap().unwrap();
    }

    // 200 + 4 * 40 - 4 * 50
    let entries = LedgerRepository::new(pool).list_by_user(&user).await.unwrap();
    let entries = assert_audit_chain(entries);
    assert_eq!(entries.len(), 8);
    assert_eq!(entries.first().unwrap().balance_before, 200);
    assert_eq!(entries.last().unwrap().balance_after, 160);
    assert_eq!(ledger.get_balance(&user).await.unwrap().balance, 160);
}

#[tokio::test]
#[ignore = "需要 PostgreSQL 数据库连接"]
async fn test_pg_concurrent_identical_requests() {
    let (pool, ledger) = setup().await;
    let user = test_user_id();
    let key = test_idempotency_key();

    let tasks = (0..8).map(|_| {
        let ledger = ledger.clone();
        let user = user.clone();
        let key = key.clone();
        tokio::spawn(async move { ledger.earn(&user, ACTION, Some(&key)).await })
    });
    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    // 胜者之外的请求要么重放，要么因处理中而冲突
    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert!(!winners.is_empty());
    assert!(winners.iter().all(|r| *r == winners[0]));
    assert!(results.iter().all(|r| match r {
        Ok(_) => true,
        Err(e) => e.error_code() == "IDEMPOTENCY_CONFLICT",
    }));

    let batches = PointsBatchRepository::new(pool).list_by_user(&user).await.unwrap();
    assert_eq!(batches.len(), 1);
}
