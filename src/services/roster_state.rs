//! 花名册状态 - 进度事件的消费者
//!
//! 把调度器发出的 `ProgressEvent` 应用到学生记录上。

use crate::models::progress::ProgressEvent;
use crate::models::student::{Student, StudentStatus};
use std::collections::HashSet;
use tracing::{debug, warn};

/// 花名册状态
#[derive(Debug, Default)]
pub struct RosterState {
    students: Vec<Student>,
    /// 本次运行的学生总数
    run_total: usize,
    /// 本次运行已经到达终止状态的学生
    completed: HashSet<String>,
}

impl RosterState {
    pub fn new(students: Vec<Student>) -> Self {
        Self {
            students,
            run_total: 0,
            completed: HashSet::new(),
        }
    }

    pub fn students(&self) -> &[Student] {
        &self.students
    }

    pub fn get(&self, id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.id == id)
    }

    /// 开始新的一次运行，重置进度计数
    pub fn begin_run(&mut self, total: usize) {
        self.run_total = total;
        self.completed.clear();
    }

    /// (已完成, 总数)
    pub fn progress(&self) -> (usize, usize) {
        (self.completed.len(), self.run_total)
    }

    /// 应用一个进度事件
    pub fn apply(&mut self, event: &ProgressEvent) {
        let Some(student) = self.students.iter_mut().find(|s| s.id == event.identity()) else {
            warn!("收到未知学生的进度事件: {}", event.identity());
            return;
        };

        match event {
            ProgressEvent::Started { start_time, .. } => {
                student.status = StudentStatus::Processing;
                student.processing_start_time = Some(*start_time);
                student.processing_end_time = None;
                student.processing_duration = None;
            }
            ProgressEvent::Succeeded {
                result,
                start_time,
                end_time,
                duration,
                ..
            } => {
                student.status = StudentStatus::Graded;
                student.score = Some(result.total_score);
                student.grading_result = Some(result.clone());
                student.processing_start_time = Some(*start_time);
                student.processing_end_time = Some(*end_time);
                student.processing_duration = Some(*duration);
            }
            ProgressEvent::Failed {
                start_time,
                end_time,
                duration,
                ..
            } => {
                student.status = StudentStatus::Failed;
                student.processing_start_time = Some(*start_time);
                student.processing_end_time = Some(*end_time);
                student.processing_duration = Some(*duration);
            }
        }

        if event.is_terminal() {
            self.completed.insert(event.identity().to_string());
        }
        debug!(
            "[学生 {}] 状态更新为 {}",
            student.id,
            student.status.label()
        );
    }

    /// 取消后把仍在处理中的学生恢复为待评分
    ///
    /// 返回被恢复的学号
    pub fn revert_unfinished(&mut self) -> Vec<String> {
        let mut reverted = Vec::new();
        for student in self
            .students
            .iter_mut()
            .filter(|s| s.status == StudentStatus::Processing)
        {
            student.status = StudentStatus::Pending;
            student.processing_start_time = None;
            student.processing_end_time = None;
            student.processing_duration = None;
            reverted.push(student.id.clone());
        }
        reverted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GradingError;
    use crate::models::grading::{Comments, GradingResult};

    fn result(total: f64) -> GradingResult {
        GradingResult {
            total_score: total,
            content_score: 5.0,
            content_max: 6.0,
            language_score: 8.0,
            language_max: 9.0,
            transcribed_text: "text".into(),
            comments: Comments {
                content: "c".into(),
                language: "l".into(),
                general: None,
            },
        }
    }

    fn roster() -> RosterState {
        RosterState::new(vec![
            Student::new("A", "Alice"),
            Student::new("B", "Bob"),
            Student::new("C", "Carol").with_status(StudentStatus::Graded),
        ])
    }

    #[test]
    fn test_lifecycle_success_and_failure() {
        let mut state = roster();
        state.begin_run(2);

        state.apply(&ProgressEvent::Started {
            identity: "A".into(),
            start_time: 1000,
        });
        assert_eq!(state.get("A").unwrap().status, StudentStatus::Processing);
        assert_eq!(state.progress(), (0, 2));

        state.apply(&ProgressEvent::succeeded("A", result(13.0), 1000, 2500));
        let a = state.get("A").unwrap();
        assert_eq!(a.status, StudentStatus::Graded);
        assert_eq!(a.score, Some(13.0));
        assert_eq!(a.processing_duration, Some(1500));

        state.apply(&ProgressEvent::Started {
            identity: "B".into(),
            start_time: 1100,
        });
        state.apply(&ProgressEvent::failed(
            "B",
            GradingError::Transport { message: "reset".into() },
            1100,
            1200,
        ));
        assert_eq!(state.get("B").unwrap().status, StudentStatus::Failed);
        assert_eq!(state.progress(), (2, 2));
    }

    #[test]
    fn test_revert_unfinished_after_cancel() {
        let mut state = roster();
        state.apply(&ProgressEvent::Started {
            identity: "B".into(),
            start_time: 1000,
        });

        let reverted = state.revert_unfinished();
        assert_eq!(reverted, vec!["B".to_string()]);
        let b = state.get("B").unwrap();
        assert_eq!(b.status, StudentStatus::Pending);
        assert_eq!(b.processing_start_time, None);
        // 已评分的学生不受影响
        assert_eq!(state.get("C").unwrap().status, StudentStatus::Graded);
    }

    #[test]
    fn test_unknown_identity_is_ignored() {
        let mut state = roster();
        state.apply(&ProgressEvent::Started {
            identity: "Z".into(),
            start_time: 1,
        });
        assert!(state.students().iter().all(|s| s.id != "Z"));
    }
}
