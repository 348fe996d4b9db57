//! 评分任务选择
//!
//! 根据花名册状态和可用图片决定本次运行要评哪些学生。

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::error::BatchError;
use crate::models::job::{Job, PayloadSource};
use crate::models::student::{Student, StudentStatus};

/// 选择本次运行的任务
///
/// - 指定了 `subset`：选中的学生去掉缺考的；其中有人没有图片则整体报错，不启动任何 worker
/// - 未指定：所有待评分且有图片的学生，没有图片的跳过并警告
///
/// 任务顺序与花名册一致；同一学号只生成一个任务（保留第一次出现的学生）。
pub fn select_jobs(
    students: &[Student],
    payloads: &HashMap<String, PayloadSource>,
    subset: Option<&[String]>,
) -> Result<Vec<Job>, BatchError> {
    let job_for = |student: &Student, payload: &PayloadSource| {
        Job::new(student.id.clone(), payload.clone()).with_name(student.name.clone())
    };
    let students = unique_students(students);

    match subset.filter(|ids| !ids.is_empty()) {
        Some(ids) => {
            let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
            for id in &wanted {
                if !students.iter().any(|s| s.id == *id) {
                    warn!("花名册中没有学号 {}，已忽略", id);
                }
            }

            let selected: Vec<&Student> = students
                .iter()
                .copied()
                .filter(|s| wanted.contains(s.id.as_str()))
                .filter(|s| s.status != StudentStatus::Absent)
                .collect();

            let missing: Vec<String> = selected
                .iter()
                .filter(|s| !payloads.contains_key(&s.id))
                .map(|s| s.id.clone())
                .collect();
            if !missing.is_empty() {
                return Err(BatchError::MissingPayload {
                    identities: missing,
                });
            }

            Ok(selected
                .into_iter()
                .filter_map(|s| payloads.get(&s.id).map(|p| job_for(s, p)))
                .collect())
        }
        None => {
            let mut jobs = Vec::new();
            for &student in students.iter().filter(|s| s.status == StudentStatus::Pending) {
                match payloads.get(&student.id) {
                    Some(payload) => jobs.push(job_for(student, payload)),
                    None => warn!("[学生 {}] 没有图片文件，跳过", student.id),
                }
            }
            Ok(jobs)
        }
    }
}

/// 按学号去重，保留第一次出现的学生
fn unique_students(students: &[Student]) -> Vec<&Student> {
    let mut seen = HashSet::new();
    students
        .iter()
        .filter(|s| {
            let first = seen.insert(s.id.as_str());
            if !first {
                warn!("[学生 {}] 学号重复，只评分第一次出现的记录", s.id);
            }
            first
        })
        .collect()
}
