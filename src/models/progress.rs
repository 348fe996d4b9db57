//! 进度事件
//!
//! 每个学生在一次运行中：恰好一个 `Started`，以及恰好一个终止事件
//! （`Succeeded` 或 `Failed`）。运行被取消时，尚未开始的学生没有事件，
//! 正在处理的学生可能只有 `Started`，调用方需要把它们恢复为待评分。

use crate::error::GradingError;
use crate::models::grading::GradingResult;

/// 进度事件（时间戳均为毫秒级 Unix 时间）
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Started {
        identity: String,
        start_time: i64,
    },
    Succeeded {
        identity: String,
        result: GradingResult,
        start_time: i64,
        end_time: i64,
        duration: i64,
    },
    Failed {
        identity: String,
        error: GradingError,
        start_time: i64,
        end_time: i64,
        duration: i64,
    },
}

impl ProgressEvent {
    pub fn identity(&self) -> &str {
        match self {
            ProgressEvent::Started { identity, .. }
            | ProgressEvent::Succeeded { identity, .. }
            | ProgressEvent::Failed { identity, .. } => identity,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProgressEvent::Started { .. })
    }

    pub fn succeeded(identity: &str, result: GradingResult, start_time: i64, end_time: i64) -> Self {
        ProgressEvent::Succeeded {
            identity: identity.to_string(),
            result,
            start_time,
            end_time,
            duration: end_time - start_time,
        }
    }

    pub fn failed(identity: &str, error: GradingError, start_time: i64, end_time: i64) -> Self {
        ProgressEvent::Failed {
            identity: identity.to_string(),
            error,
            start_time,
            end_time,
            duration: end_time - start_time,
        }
    }
}

/// 当前时间（毫秒）
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
