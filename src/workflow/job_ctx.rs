//! 评分任务上下文
//!
//! 封装"我正在给第几个学生评分"这一信息，只用于日志前缀。

use std::fmt::Display;

use crate::models::job::Job;

/// 评分任务上下文
#[derive(Debug, Clone)]
pub struct JobCtx {
    /// 学号
    pub identity: String,

    /// 学生姓名（可能缺失）
    pub name: Option<String>,

    /// 任务在本次运行中的序号（从1开始）
    pub index: usize,

    /// 本次运行的任务总数
    pub total: usize,
}

impl JobCtx {
    pub fn new(job: &Job, index: usize, total: usize) -> Self {
        Self {
            identity: job.identity.clone(),
            name: job.name.clone(),
            index,
            total,
        }
    }
}

impl Display for JobCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "[学生 {} {}]", self.identity, name),
            None => write!(f, "[学生 {}]", self.identity),
        }
    }
}
