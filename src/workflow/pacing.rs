//! 请求节流闸门
//!
//! 一次运行里所有 worker 共享一个闸门，任意两次远程调用至少间隔 `interval`，
//! 重试的调用也不例外。

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::workflow::cancel::{sleep_cancellable, CancelHandle};

/// 节流闸门
///
/// "读取上次请求时间 → 计算等待 → 写入新的请求时间" 在同一把锁内完成，
/// 两个 worker 不会拿到同一个时间槽。
#[derive(Debug)]
pub struct PacingGate {
    interval: Duration,
    last_dispatch: Mutex<Option<Instant>>,
}

impl PacingGate {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms),
            last_dispatch: Mutex::new(None),
        }
    }

    /// 等到自己的时间槽；被取消时返回 `false`
    pub async fn wait(&self, poll: Duration, cancel: &CancelHandle) -> bool {
        if self.interval.is_zero() {
            return !cancel.is_cancelled();
        }
        let wait = {
            let mut last = self.last_dispatch.lock().await;
            let now = Instant::now();
            let wait = last
                .map(|t| (t + self.interval).saturating_duration_since(now))
                .unwrap_or(Duration::ZERO);
            *last = Some(now + wait);
            wait
        };
        sleep_cancellable(wait, poll, cancel).await
    }
}
