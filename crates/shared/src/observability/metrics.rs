//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;

/// 全局 Prometheus handle，用于渲染指标
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics 资源守卫
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 端点。
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROMETHEUS_HANDLE.set(handle.clone());

    register_common_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        _server_handle: server_handle,
    })
}

/// 注册积分账本指标描述
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!("points_earned_total", "Total points issued by earn operations");
    metrics::describe_counter!(
        "points_redeemed_total",
        "Total points deducted by redeem operations"
    );
    metrics::describe_counter!(
        "points_expired_total",
        "Total points forfeited by lazy expiry"
    );
    metrics::describe_counter!(
        "points_idempotent_replays_total",
        "Requests answered from the idempotency cache"
    );
    metrics::describe_counter!(
        "points_operation_errors_total",
        "Failed ledger operations by error code"
    );
    metrics::describe_histogram!(
        "points_operation_duration_seconds",
        "Ledger operation duration in seconds"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 启动指标 HTTP 服务器
async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

/// 获取全局 Prometheus handle（用于自定义渲染）
pub fn get_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录积分发放
#[inline]
pub fn record_earn(action_type: &str, points: i64) {
    metrics::counter!("points_earned_total", "action_type" => action_type.to_string())
        .increment(points.max(0) as u64);
}

/// 记录积分兑换
#[inline]
pub fn record_redeem(item_code: &str, points: i64) {
    metrics::counter!("points_redeemed_total", "item_code" => item_code.to_string())
        .increment(points.max(0) as u64);
}

/// 记录惰性过期
#[inline]
pub fn record_expire(points: i64) {
    metrics::counter!("points_expired_total").increment(points.max(0) as u64);
}

/// 记录幂等重放
#[inline]
pub fn record_replay(operation: &str) {
    metrics::counter!(
        "points_idempotent_replays_total",
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// 记录操作结果与耗时
///
/// `code` 为 None 表示成功
#[inline]
pub fn record_operation(operation: &str, code: Option<&str>, duration_secs: f64) {
    if let Some(code) = code {
        metrics::counter!(
            "points_operation_errors_total",
            "operation" => operation.to_string(),
            "code" => code.to_string()
        )
        .increment(1);
    }

    metrics::histogram!(
        "points_operation_duration_seconds",
        "operation" => operation.to_string()
    )
    .record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_functions_do_not_panic() {
        // 即使没有初始化 recorder，这些函数也不应该 panic
        record_earn("DAILY_LOGIN", 10);
        record_redeem("ITEM_A", 100);
        record_expire(20);
        record_expire(-1);
        record_replay("earn");
        record_operation("redeem", Some("INSUFFICIENT_POINTS"), 0.01);
        record_operation("earn", None, 0.002);
        assert!(get_handle().is_none());
    }
}
