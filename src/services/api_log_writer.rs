//! API 日志写入服务
//!
//! 把每条 `ApiLogEntry` 追加到 JSON Lines 文件，供审计/监控工具读取。

use crate::error::{AppResult, FileError};
use crate::models::api_log::{ApiLogEntry, LogSink};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiLogRecord<'a> {
    id: u64,
    timestamp: i64,
    #[serde(flatten)]
    entry: &'a ApiLogEntry,
}

/// API 日志写入服务
pub struct ApiLogWriter {
    log_file_path: String,
    next_id: AtomicU64,
    // 多个 worker 同时写同一个文件
    file_lock: Mutex<()>,
}

impl ApiLogWriter {
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            log_file_path: path.into(),
            next_id: AtomicU64::new(1),
            file_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &str {
        &self.log_file_path
    }

    /// 追加一条日志
    pub fn write(&self, entry: &ApiLogEntry) -> AppResult<()> {
        let record = ApiLogRecord {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            timestamp: chrono::Utc::now().timestamp_millis(),
            entry,
        };
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let write_failed = |source| FileError::WriteFailed {
            path: self.log_file_path.clone(),
            source,
        };
        // 锁只保护写入顺序，中毒后照常使用
        let _guard = self.file_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file_path)
            .map_err(write_failed)?;
        file.write_all(line.as_bytes()).map_err(write_failed)?;

        debug!(
            "写入 API 日志 #{}: {:?} {}",
            record.id, entry.direction, entry.provider
        );
        Ok(())
    }

    /// 转换为日志回调；写入失败只记警告，不影响评分
    pub fn into_sink(self: Arc<Self>) -> LogSink {
        Arc::new(move |entry: ApiLogEntry| {
            if let Err(e) = self.write(&entry) {
                warn!("写入 API 日志失败: {}", e);
            }
        })
    }
}
