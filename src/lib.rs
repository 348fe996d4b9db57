//! # Essay Grader
//!
//! 手写英语作文批量评分：把作文图片发给多模态大模型，解析结构化评分结果。
//!
//! ## 架构设计
//!
//! 本系统采用四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - HTTP 客户端（带超时）、图片读取与 base64 编码
//!
//! ### ② 业务能力层（Clients / Services）
//! - `clients/` - `GradingClient` trait，Gemini 与 Poe 两个实现；错误在传输边界归类
//! - `services/` - 提示词构建、响应解析、花名册状态、API 日志写入
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 单个学生的评分流程：重试、限流冷却、共享节流闸门、可取消等待
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 并发 worker、请求节流、取消
//! - `orchestrator/job_builder` - 任务选择
//! - `orchestrator/app` - 命令行入口
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{GradingClient, GradingClientFactory, HttpClientFactory};
pub use config::{Config, GradingConfig};
pub use error::{AppError, AppResult, BatchError, GradingError};
pub use models::{EncodedImage, GradingResult, Job, PayloadSource, ProgressEvent, Student};
pub use orchestrator::{
    grade_one, run_batch, select_jobs, App, BatchRunConfig, BatchSummary, ProgressCallback,
};
pub use workflow::{CancelHandle, RetryPolicy};
