//! 应用入口 - 编排层
//!
//! 加载配置和花名册 → 选择任务 → 批量评分 → 导出结果。
//! Ctrl-C 触发本次运行的取消，已完成的学生保留结果，处理中的学生恢复为待评分。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::clients::{GradingClientFactory, HttpClientFactory};
use crate::config::Config;
use crate::error::BatchError;
use crate::models::api_log::LogSink;
use crate::models::job::PayloadSource;
use crate::models::loaders::load_roster;
use crate::models::progress::ProgressEvent;
use crate::models::student::Student;
use crate::orchestrator::batch_processor::{run_batch, BatchRunConfig, BatchSummary, ProgressCallback};
use crate::orchestrator::job_builder::select_jobs;
use crate::services::{ApiLogWriter, RosterState};
use crate::utils::logging::{log_jobs_selected, log_startup, print_final_stats};
use crate::workflow::CancelHandle;

/// 应用主结构
pub struct App {
    config: Config,
    factory: Arc<HttpClientFactory>,
    log_writer: Option<Arc<ApiLogWriter>>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        config.validate().context("配置无效")?;
        log_startup(&config);

        let factory = HttpClientFactory::from_config(&config).context("无法创建评分客户端")?;
        let log_writer = if config.api_log_file.trim().is_empty() {
            None
        } else {
            info!("📝 API 日志写入: {}", config.api_log_file);
            Some(Arc::new(ApiLogWriter::with_path(config.api_log_file.clone())))
        };

        Ok(Self {
            config,
            factory: Arc::new(factory),
            log_writer,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<()> {
        info!("\n📁 正在加载花名册...");
        let students = load_roster(Path::new(&self.config.roster_file)).await?;
        let payloads = payload_map(&students);

        let subset = (!self.config.only.is_empty()).then_some(self.config.only.as_slice());
        let jobs = select_jobs(&students, &payloads, subset)?;
        if jobs.is_empty() {
            warn!("⚠️ 没有需要评分的学生，程序结束");
            return Ok(());
        }
        log_jobs_selected(jobs.len(), self.config.concurrency);

        let total = jobs.len();
        let state = Arc::new(Mutex::new(RosterState::new(students)));
        lock(&state)?.begin_run(total);

        let cancel = CancelHandle::new();
        let signal_task = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("⏹️ 收到中断信号，正在取消评分...");
                    cancel.cancel();
                }
            })
        };

        let result = run_batch(
            jobs,
            BatchRunConfig::from_config(&self.config),
            self.factory.clone() as Arc<dyn GradingClientFactory>,
            self.config.grading_config(),
            progress_callback(state.clone()),
            self.log_writer.clone().map(|w| -> LogSink { w.into_sink() }),
            cancel,
        )
        .await;
        signal_task.abort();

        let mut state = lock(&state)?;
        finish_run(result, &mut state, &self.config.output_file)
    }
}

/// 收尾：输出统计或恢复未完成的学生，写出结果
///
/// 被取消的运行同样写出结果，但返回 `BatchError::Cancelled`，进程以非零状态退出。
fn finish_run(
    result: Result<BatchSummary, BatchError>,
    state: &mut RosterState,
    output_file: &str,
) -> Result<()> {
    let cancelled = match result {
        Ok(summary) => {
            print_final_stats(summary.succeeded, summary.failed, summary.total, output_file);
            false
        }
        Err(BatchError::Cancelled) => {
            let reverted = state.revert_unfinished();
            let (completed, total) = state.progress();
            warn!(
                "⏹️ 评分已取消: 完成 {}/{}，{} 名学生恢复为待评分",
                completed,
                total,
                reverted.len()
            );
            true
        }
        Err(e) => return Err(e.into()),
    };

    write_results(Path::new(output_file), state.students())?;
    if cancelled {
        return Err(anyhow::Error::new(BatchError::Cancelled).context("评分未完成，已保存部分结果"));
    }
    Ok(())
}

fn lock(state: &Mutex<RosterState>) -> Result<std::sync::MutexGuard<'_, RosterState>> {
    state
        .lock()
        .map_err(|_| anyhow::anyhow!("花名册状态锁已损坏"))
}

/// 把进度事件应用到花名册并输出进度
fn progress_callback(state: Arc<Mutex<RosterState>>) -> ProgressCallback {
    Arc::new(move |event: ProgressEvent| {
        let Ok(mut state) = state.lock() else {
            warn!("花名册状态锁已损坏，丢弃进度事件: {}", event.identity());
            return;
        };
        state.apply(&event);
        if event.is_terminal() {
            let (completed, total) = state.progress();
            info!("📊 进度: {}/{}", completed, total);
        }
    })
}

/// 花名册里登记了图片的学生
fn payload_map(students: &[Student]) -> HashMap<String, PayloadSource> {
    students
        .iter()
        .filter_map(|s| {
            s.image
                .as_ref()
                .map(|image| (s.id.clone(), PayloadSource::File(PathBuf::from(image))))
        })
        .collect()
}

/// 导出评分结果（格式化 JSON）
pub fn write_results(path: &Path, students: &[Student]) -> Result<()> {
    let json = serde_json::to_string_pretty(students).context("无法序列化评分结果")?;
    std::fs::write(path, json)
        .with_context(|| format!("无法写入评分结果: {}", path.display()))?;
    info!("💾 评分结果已写入: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::student::StudentStatus;

    #[test]
    fn test_payload_map_only_includes_students_with_images() {
        let students = vec![
            Student::new("A", "Alice").with_image("/tmp/a.jpg"),
            Student::new("B", "Bob"),
        ];
        let map = payload_map(&students);
        assert_eq!(map.len(), 1);
        assert_eq!(map["A"], PayloadSource::File(PathBuf::from("/tmp/a.jpg")));
    }

    #[test]
    fn test_write_results_is_camel_case_json() {
        let path = std::env::temp_dir().join(format!("results-{}.json", std::process::id()));
        let students = vec![Student::new("A", "Alice").with_status(StudentStatus::Graded)];
        write_results(&path, &students).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value[0]["id"], "A");
        assert_eq!(value[0]["status"], "Graded");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_cancelled_run_saves_results_and_reports_error() {
        let path = std::env::temp_dir().join(format!("cancelled-{}.json", std::process::id()));
        let mut state = RosterState::new(vec![
            Student::new("A", "Alice").with_status(StudentStatus::Graded),
            Student::new("B", "Bob").with_status(StudentStatus::Processing),
        ]);

        let err = finish_run(Err(BatchError::Cancelled), &mut state, path.to_str().unwrap())
            .unwrap_err();

        assert_eq!(
            err.downcast_ref::<BatchError>(),
            Some(&BatchError::Cancelled)
        );
        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved[1]["status"], "Pending");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_completed_run_is_ok() {
        let path = std::env::temp_dir().join(format!("completed-{}.json", std::process::id()));
        let mut state = RosterState::new(vec![Student::new("A", "Alice")]);
        let summary = BatchSummary {
            total: 1,
            succeeded: 1,
            failed: 0,
        };
        assert!(finish_run(Ok(summary), &mut state, path.to_str().unwrap()).is_ok());
        assert!(path.exists());
        let _ = std::fs::remove_file(&path);
    }
}
