//! 测试辅助函数

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, DurationRound, Utc};
use tokio::time::{sleep, Instant};

pub struct TestEnv;

impl TestEnv {
    /// 轮询直到条件成立或超时
    ///
    /// 使用tokio时钟，暂停时间的测试中也能推进。
    pub async fn wait_for<F, Fut>(mut condition: F, timeout: Duration) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition().await {
                return true;
            }
            sleep(Duration::from_millis(10)).await;
        }
        condition().await
    }

    /// 截断到整分钟
    pub fn truncate_to_minute(at: DateTime<Utc>) -> DateTime<Utc> {
        at.duration_trunc(chrono::Duration::minutes(1)).unwrap_or(at)
    }
}
