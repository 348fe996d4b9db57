//! 批量评分调度器 - 编排层
//!
//! ## 职责
//!
//! 把一组互不相关的评分任务交给固定数量的 worker 执行：
//!
//! 1. **并发控制**：`min(concurrency, 任务数)` 个 worker 共享一个原子下标取任务
//! 2. **请求节流**：所有 worker 共享一个节流闸门，相邻两次请求（包括重试）至少间隔 `request_interval_ms`
//! 3. **重试**：委托 `workflow::grade_with_retry`
//! 4. **取消**：每个等待点都轮询 `CancelHandle`，被取消的任务不产生终止事件
//! 5. **进度**：每个任务一个 `Started` 加一个终止事件，通过回调交给调用方
//!
//! 调度器只持有簿记状态（下标、上次请求时间、取消标志），不修改任何业务数据。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::clients::GradingClientFactory;
use crate::config::{Config, GradingConfig};
use crate::error::{BatchError, GradingError};
use crate::infrastructure::load_payload;
use crate::models::api_log::{tagged_sink, LogSink};
use crate::models::grading::GradingResult;
use crate::models::job::Job;
use crate::models::progress::{now_millis, ProgressEvent};
use crate::utils::logging::truncate_text;
use crate::workflow::{grade_with_retry, CancelHandle, JobCtx, PacingGate, RetryPolicy};

/// 进度回调
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// 单次运行的调度参数，运行期间不变
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRunConfig {
    pub concurrency: usize,
    pub request_interval_ms: u64,
    pub max_retries: u32,
    pub retry: RetryPolicy,
}

impl BatchRunConfig {
    pub fn new(concurrency: usize, request_interval_ms: u64, max_retries: u32) -> Self {
        Self {
            concurrency,
            request_interval_ms,
            max_retries,
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.concurrency,
            config.request_interval_ms,
            config.max_retries,
        )
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for BatchRunConfig {
    fn default() -> Self {
        Self::new(5, 500, 3)
    }
}

/// 正常结束时的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// 单个任务的结局
enum JobOutcome {
    Succeeded(GradingResult),
    Failed(GradingError),
    /// 运行被取消，没有终止事件
    Abandoned,
}

/// 所有 worker 共享的运行上下文
struct RunContext {
    jobs: Vec<Job>,
    next_index: AtomicUsize,
    gate: PacingGate,
    config: BatchRunConfig,
    factory: Arc<dyn GradingClientFactory>,
    grading: Arc<GradingConfig>,
    on_progress: ProgressCallback,
    on_log: Option<LogSink>,
    cancel: CancelHandle,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

/// 批量评分
///
/// 没有任务时立即返回 `BatchError::NoJobs`；运行中任何时候被取消，
/// 等所有 worker 退出后返回 `BatchError::Cancelled`（已完成的任务保留真实结果）。
pub async fn run_batch(
    jobs: Vec<Job>,
    config: BatchRunConfig,
    factory: Arc<dyn GradingClientFactory>,
    grading: GradingConfig,
    on_progress: ProgressCallback,
    on_log: Option<LogSink>,
    cancel: CancelHandle,
) -> Result<BatchSummary, BatchError> {
    if jobs.is_empty() {
        return Err(BatchError::NoJobs);
    }

    let total = jobs.len();
    let worker_count = config.concurrency.max(1).min(total);
    info!(
        "📋 开始批量评分: {} 个任务, {} 个 worker, 请求间隔 {}ms",
        total, worker_count, config.request_interval_ms
    );

    let ctx = Arc::new(RunContext {
        jobs,
        next_index: AtomicUsize::new(0),
        gate: PacingGate::new(config.request_interval_ms),
        config,
        factory,
        grading: Arc::new(grading),
        on_progress,
        on_log,
        cancel,
        succeeded: AtomicUsize::new(0),
        failed: AtomicUsize::new(0),
    });

    let handles: Vec<_> = (0..worker_count)
        .map(|worker_id| {
            let ctx = ctx.clone();
            tokio::spawn(async move { worker(worker_id, ctx).await })
        })
        .collect();

    for (worker_id, joined) in join_all(handles).await.into_iter().enumerate() {
        if let Err(e) = joined {
            error!("worker #{} 异常退出: {}", worker_id, e);
        }
    }

    if ctx.cancel.is_cancelled() {
        warn!("⏹️ 批量评分已取消");
        return Err(BatchError::Cancelled);
    }

    let summary = BatchSummary {
        total,
        succeeded: ctx.succeeded.load(Ordering::SeqCst),
        failed: ctx.failed.load(Ordering::SeqCst),
    };
    info!(
        "✓ 批量评分结束: 成功 {}/{}, 失败 {}",
        summary.succeeded, summary.total, summary.failed
    );
    Ok(summary)
}

async fn worker(worker_id: usize, ctx: Arc<RunContext>) {
    let total = ctx.jobs.len();
    loop {
        if ctx.cancel.is_cancelled() {
            debug!("worker #{} 检测到取消，退出", worker_id);
            return;
        }
        let index = ctx.next_index.fetch_add(1, Ordering::SeqCst);
        let Some(job) = ctx.jobs.get(index) else {
            debug!("worker #{} 没有剩余任务，退出", worker_id);
            return;
        };

        // 首次调用的时间槽；重试的时间槽由 grade_with_retry 获取
        if !ctx.gate.wait(ctx.config.retry.pacing_poll, &ctx.cancel).await {
            return;
        }

        let job_ctx = JobCtx::new(job, index + 1, total);
        let outcome = execute_job(
            job,
            &job_ctx,
            ctx.factory.as_ref(),
            ctx.grading.clone(),
            ctx.config.max_retries,
            &ctx.config.retry,
            Some(&ctx.gate),
            &ctx.cancel,
            &ctx.on_progress,
            &ctx.on_log,
        )
        .await;

        match outcome {
            JobOutcome::Succeeded(_) => {
                ctx.succeeded.fetch_add(1, Ordering::SeqCst);
            }
            JobOutcome::Failed(_) => {
                ctx.failed.fetch_add(1, Ordering::SeqCst);
            }
            JobOutcome::Abandoned => return,
        }
    }
}

/// 处理一个任务：Started → 读取图片 → 评分 → 终止事件
#[allow(clippy::too_many_arguments)]
async fn execute_job(
    job: &Job,
    ctx: &JobCtx,
    factory: &dyn GradingClientFactory,
    grading: Arc<GradingConfig>,
    max_retries: u32,
    policy: &RetryPolicy,
    pacing: Option<&PacingGate>,
    cancel: &CancelHandle,
    on_progress: &ProgressCallback,
    on_log: &Option<LogSink>,
) -> JobOutcome {
    let start_time = now_millis();
    on_progress(ProgressEvent::Started {
        identity: job.identity.clone(),
        start_time,
    });
    info!("{} 📝 开始评分 ({}/{})", ctx, ctx.index, ctx.total);
    debug!("{} 图片: {}", ctx, job.payload.describe());

    let fail = |error: GradingError| {
        let end_time = now_millis();
        error!("{} ❌ 评分失败: {}", ctx, error);
        on_progress(ProgressEvent::failed(
            &job.identity,
            error.clone(),
            start_time,
            end_time,
        ));
        JobOutcome::Failed(error)
    };

    let image = match load_payload(&job.payload).await {
        Ok(image) => Arc::new(image),
        Err(e) => return fail(e),
    };

    let sink = on_log
        .clone()
        .map(|inner| tagged_sink(inner, job.identity.clone(), job.name.clone()));
    let client = factory.create(sink);

    let graded = grade_with_retry(
        client,
        image,
        grading,
        max_retries,
        policy,
        pacing,
        cancel,
        ctx,
    )
    .await;
    match graded {
        Ok(result) => {
            let end_time = now_millis();
            info!(
                "{} ✅ 评分完成: {} 分，耗时 {}ms",
                ctx,
                result.total_score,
                end_time - start_time
            );
            debug!(
                "{} 识别文本: {}",
                ctx,
                truncate_text(&result.transcribed_text, 80)
            );
            on_progress(ProgressEvent::succeeded(
                &job.identity,
                result.clone(),
                start_time,
                end_time,
            ));
            JobOutcome::Succeeded(result)
        }
        Err(GradingError::Cancelled) => {
            debug!("{} 评分已取消，不记录结果", ctx);
            JobOutcome::Abandoned
        }
        Err(e) => fail(e),
    }
}

/// 单个学生重新评分：只尝试一次，不节流，不重试
pub async fn grade_one(
    job: Job,
    factory: Arc<dyn GradingClientFactory>,
    grading: GradingConfig,
    on_progress: ProgressCallback,
    on_log: Option<LogSink>,
) -> Result<GradingResult, GradingError> {
    let ctx = JobCtx::new(&job, 1, 1);
    let outcome = execute_job(
        &job,
        &ctx,
        factory.as_ref(),
        Arc::new(grading),
        1,
        &RetryPolicy::default(),
        None,
        &CancelHandle::new(),
        &on_progress,
        &on_log,
    )
    .await;

    match outcome {
        JobOutcome::Succeeded(result) => Ok(result),
        JobOutcome::Failed(error) => Err(error),
        JobOutcome::Abandoned => Err(GradingError::Cancelled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_run_config_from_config() {
        let mut config = Config::default();
        config.concurrency = 2;
        config.request_interval_ms = 0;
        let run = BatchRunConfig::from_config(&config);
        assert_eq!(run.concurrency, 2);
        assert_eq!(run.request_interval_ms, 0);
        assert_eq!(run.max_retries, 3);
        assert_eq!(run.retry.rate_limit_cooldown, Duration::from_millis(2000));
    }
}
