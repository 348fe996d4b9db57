//! 取消控制
//!
//! 每次运行一个 `CancelHandle`，由调用方持有并在需要时触发。
//! 所有等待都切成小段轮询，取消请求能在一个切片内生效。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 单次运行的取消开关，clone 后共享同一个标志
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// 请求取消（幂等）
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// 可取消的等待
///
/// 每个切片前后都检查取消标志。完整等待结束且未被取消时返回 `true`。
pub async fn sleep_cancellable(total: Duration, slice: Duration, cancel: &CancelHandle) -> bool {
    let slice = if slice.is_zero() { total } else { slice };
    let mut remaining = total;
    while !remaining.is_zero() {
        if cancel.is_cancelled() {
            return false;
        }
        let chunk = remaining.min(slice);
        tokio::time::sleep(chunk).await;
        remaining -= chunk;
    }
    !cancel.is_cancelled()
}
