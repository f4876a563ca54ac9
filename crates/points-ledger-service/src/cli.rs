//! 运维命令行
//!
//! 使用 clap derive 定义子命令，结果以 JSON 输出。
//! 仅供运维与联调使用，不承担 HTTP 接入职责。

use clap::{Parser, Subcommand};
use serde_json::{Value, json};

use crate::error::PointsError;
use crate::service::PointsLedger;

/// 积分账本命令行工具
#[derive(Parser, Debug)]
#[command(name = "points-ledger")]
#[command(version, about = "积分账本运维工具")]
#[command(propagate_version = true)]
pub struct Cli {
    /// 服务名，用于定位 config/{service}.toml
    #[arg(long, default_value = "points-ledger-service")]
    pub service_name: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// 子命令
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// 执行数据库迁移
    Migrate,

    /// 为用户获取积分
    Earn {
        #[arg(short, long)]
        user: String,

        /// 行为类型，如 DAILY_LOGIN
        #[arg(short, long)]
        action: String,

        /// 幂等 key
        #[arg(short, long)]
        key: Option<String>,
    },

    /// 兑换商品
    Redeem {
        #[arg(short, long)]
        user: String,

        #[arg(short, long)]
        item: String,

        #[arg(short, long)]
        key: Option<String>,
    },

    /// 查询余额（会结转已过期批次）
    Balance {
        #[arg(short, long)]
        user: String,
    },
}

/// 执行账本子命令
pub struct CommandRunner {
    ledger: PointsLedger,
}

impl CommandRunner {
    pub fn new(ledger: PointsLedger) -> Self {
        Self { ledger }
    }

    /// 执行账本命令，返回 JSON 结果
    ///
    /// 业务错误转为 `success: false` 的响应体，系统错误向上传递。
    /// `Migrate` 需要数据库连接，由入口直接处理。
    pub async fn run(&self, command: &Commands) -> anyhow::Result<Value> {
        let outcome = match command {
            Commands::Migrate => anyhow::bail!("migrate 命令由入口直接处理"),
            Commands::Earn { user, action, key } => self
                .ledger
                .earn(user, action, key.as_deref())
                .await
                .map(serde_json::to_value),
            Commands::Redeem { user, item, key } => self
                .ledger
                .redeem(user, item, key.as_deref())
                .await
                .map(serde_json::to_value),
            Commands::Balance { user } => self
                .ledger
                .get_balance(user)
                .await
                .map(serde_json::to_value),
        };

        match outcome {
            Ok(value) => Ok(value?),
            Err(err) if err.is_business_error() => Ok(error_response(&err)),
            Err(err) => Err(err.into()),
        }
    }
}

/// 业务错误的 JSON 表示，携带结构化上下文
pub fn error_response(err: &PointsError) -> Value {
    let mut body = json!({
        "success": false,
        "error": err.error_code(),
        "message": err.to_string(),
    });

    match err {
        PointsError::RateLimited { retry_after, .. } => {
            body["retryAfter"] = json!(retry_after);
        }
        PointsError::InsufficientPoints {
            current_balance,
            required,
        } => {
            body["currentBalance"] = json!(current_balance);
            body["required"] = json!(required);
        }
        _ => {}
    }

    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConflictReason;

    #[test]
    fn test_parse_earn_command() {
        let cli = Cli::parse_from([
            "points-ledger",
            "earn",
            "--user",
            "u1",
            "--action",
            "DAILY_LOGIN",
            "--key",
            "k1",
        ]);

        assert_eq!(
            cli.command,
            Commands::Earn {
                user: "u1".to_string(),
                action: "DAILY_LOGIN".to_string(),
                key: Some("k1".to_string()),
            }
        );
        assert_eq!(cli.service_name, "points-ledger-service");
    }

    #[test]
    fn test_parse_balance_command() {
        let cli = Cli::parse_from(["points-ledger", "balance", "-u", "u1"]);
        assert_eq!(
            cli.command,
            Commands::Balance {
                user: "u1".to_string()
            }
        );
    }

    #[test]
    fn test_error_response_context() {
        let body = error_response(&PointsError::InsufficientPoints {
            current_balance: 50,
            required: 100,
        });
        assert_eq!(body["error"], "INSUFFICIENT_POINTS");
        assert_eq!(body["currentBalance"], 50);
        assert_eq!(body["required"], 100);

        let body = error_response(&PointsError::RateLimited {
            action_type: "DAILY_LOGIN".to_string(),
            retry_after: 1_700_000_000,
        });
        assert_eq!(body["retryAfter"], 1_700_000_000i64);

        let body = error_response(&PointsError::IdempotencyConflict {
            key: "k1".to_string(),
            reason: ConflictReason::RequestInFlight,
        });
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "IDEMPOTENCY_CONFLICT");
    }
}
