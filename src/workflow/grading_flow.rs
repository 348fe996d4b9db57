//! 单个学生的评分流程 - 流程层
//!
//! 流程顺序：
//! 1. 调用评分客户端（调用期间轮询取消）
//! 2. 失败 → 按错误类别等待（限流冷却 / 普通重试间隔）→ 经节流闸门 → 再次调用
//! 3. 尝试次数用完 → 最后一次的错误作为最终结果
//!
//! 限流错误同样计入尝试次数。第一次调用前的节流由调度器在 `Started` 之前完成。

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::clients::GradingClient;
use crate::config::GradingConfig;
use crate::error::GradingError;
use crate::models::grading::GradingResult;
use crate::models::job::EncodedImage;
use crate::workflow::cancel::{sleep_cancellable, CancelHandle};
use crate::workflow::job_ctx::JobCtx;
use crate::workflow::pacing::PacingGate;

/// 重试与轮询的时间参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 限流后的冷却时间
    pub rate_limit_cooldown: Duration,
    pub rate_limit_poll: Duration,
    /// 其他错误的重试间隔
    pub retry_delay: Duration,
    pub retry_poll: Duration,
    /// 请求节流等待时的轮询切片
    pub pacing_poll: Duration,
    /// 请求进行中检查取消的间隔
    pub call_poll: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            rate_limit_cooldown: Duration::from_millis(2000),
            rate_limit_poll: Duration::from_millis(200),
            retry_delay: Duration::from_millis(500),
            retry_poll: Duration::from_millis(100),
            pacing_poll: Duration::from_millis(100),
            call_poll: Duration::from_millis(100),
        }
    }
}

/// 带重试的评分
///
/// 最多尝试 `max_retries` 次（至少一次）。给了 `pacing` 时，每次重试前都要重新拿节流时间槽。
/// 观察到取消时返回 `GradingError::Cancelled`，调用方不应为此产生终止事件。
#[allow(clippy::too_many_arguments)]
pub async fn grade_with_retry(
    client: Arc<dyn GradingClient>,
    image: Arc<EncodedImage>,
    grading: Arc<GradingConfig>,
    max_retries: u32,
    policy: &RetryPolicy,
    pacing: Option<&PacingGate>,
    cancel: &CancelHandle,
    ctx: &JobCtx,
) -> Result<GradingResult, GradingError> {
    let attempts = max_retries.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        if cancel.is_cancelled() {
            return Err(GradingError::Cancelled);
        }

        debug!("{} 第 {}/{} 次尝试", ctx, attempt, attempts);
        let outcome = call_cancellable(
            client.clone(),
            image.clone(),
            grading.clone(),
            policy.call_poll,
            cancel,
        )
        .await;

        // 调用期间被取消：结果作废
        if cancel.is_cancelled() {
            return Err(GradingError::Cancelled);
        }

        let error = match outcome {
            Ok(result) => {
                if let Some(delta) = result.score_mismatch() {
                    warn!(
                        "{} ⚠️ 总分 {} 与分项之和不一致（差值 {}），保留模型给出的总分",
                        ctx, result.total_score, delta
                    );
                }
                return Ok(result);
            }
            Err(e) => e,
        };

        if attempt >= attempts {
            warn!("{} ❌ 已尝试 {} 次，评分失败: {}", ctx, attempts, error);
            return Err(error);
        }

        let (delay, poll) = if error.is_rate_limited() {
            (policy.rate_limit_cooldown, policy.rate_limit_poll)
        } else {
            (policy.retry_delay, policy.retry_poll)
        };
        warn!(
            "{} 第 {}/{} 次评分失败 ({}): {}，{}ms 后重试",
            ctx,
            attempt,
            attempts,
            error.kind(),
            error,
            delay.as_millis()
        );

        if !sleep_cancellable(delay, poll, cancel).await {
            return Err(GradingError::Cancelled);
        }
        if let Some(gate) = pacing {
            if !gate.wait(policy.pacing_poll, cancel).await {
                return Err(GradingError::Cancelled);
            }
        }
        info!("{} 🔄 重试评分...", ctx);
    }
}

/// 在后台任务中发起调用，并按 `poll` 间隔检查取消
///
/// 取消后不等待请求结束；请求在后台自然完成，结果被丢弃。
async fn call_cancellable(
    client: Arc<dyn GradingClient>,
    image: Arc<EncodedImage>,
    grading: Arc<GradingConfig>,
    poll: Duration,
    cancel: &CancelHandle,
) -> Result<GradingResult, GradingError> {
    let mut call = tokio::spawn(async move { client.grade(&image, &grading).await });
    let poll = if poll.is_zero() {
        Duration::from_millis(100)
    } else {
        poll
    };

    loop {
        tokio::select! {
            joined = &mut call => {
                return joined.unwrap_or_else(|e| {
                    Err(GradingError::Api {
                        status: None,
                        message: format!("评分任务异常退出: {}", e),
                    })
                });
            }
            _ = tokio::time::sleep(poll) => {
                if cancel.is_cancelled() {
                    return Err(GradingError::Cancelled);
                }
            }
        }
    }
}
