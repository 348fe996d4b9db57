//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量评分调度器
//! - 固定数量的 worker 共享任务下标
//! - 全局请求节流闸门
//! - 取消后等所有 worker 退出再返回
//!
//! ### `job_builder` - 任务选择
//! - 按花名册状态 / 指定学号挑选任务
//!
//! ### `app` - 命令行入口
//! - 加载配置和花名册，驱动一次运行，导出结果
//!
//! ## 层次关系
//!
//! ```text
//! app (花名册 → Vec<Job>)
//!     ↓
//! batch_processor (处理 Vec<Job>)
//!     ↓
//! workflow::grade_with_retry (处理单个 Job)
//!     ↓
//! clients (Gemini / Poe)
//!     ↓
//! infrastructure (HTTP 客户端、图片读取)
//! ```

pub mod app;
pub mod batch_processor;
pub mod job_builder;

pub use app::App;
pub use batch_processor::{grade_one, run_batch, BatchRunConfig, BatchSummary, ProgressCallback};
pub use job_builder::select_jobs;
pub use crate::workflow::{CancelHandle, RetryPolicy};
