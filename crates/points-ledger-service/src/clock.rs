//! 时钟抽象
//!
//! 过期判断、频率窗口和幂等有效期都依赖"当前时间"，
//! 通过注入时钟使这些逻辑可被确定性地测试。

use chrono::{DateTime, Duration, SubsecRound, Utc};
use parking_lot::Mutex;

/// 时钟接口
pub trait Clock: Send + Sync {
    /// 当前时间，精度截断到微秒（与数据库 TIMESTAMPTZ 一致）
    fn now(&self) -> DateTime<Utc>;
}

/// 系统时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now().trunc_subsecs(6)
    }
}

/// 可手动拨动的时钟，用于测试
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start.trunc_subsecs(6)),
        }
    }

    /// 以当前系统时间为起点
    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    /// 时钟前进
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to.trunc_subsecs(6);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
