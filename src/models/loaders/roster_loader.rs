use crate::models::student::Student;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Deserialize)]
struct RosterFile {
    #[serde(default)]
    students: Vec<Student>,
}

/// 从 TOML 花名册加载学生列表
///
/// 相对的图片路径按花名册所在目录解析；重复学号只保留第一条。
pub async fn load_roster(roster_path: &Path) -> Result<Vec<Student>> {
    let content = fs::read_to_string(roster_path)
        .await
        .with_context(|| format!("无法读取花名册: {}", roster_path.display()))?;

    let roster: RosterFile = toml::from_str(&content)
        .with_context(|| format!("无法解析花名册: {}", roster_path.display()))?;

    let base_dir = roster_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let mut seen = HashSet::new();
    let mut students = Vec::with_capacity(roster.students.len());
    for mut student in roster.students {
        if !seen.insert(student.id.clone()) {
            tracing::warn!("花名册中学号重复，已忽略: {}", student.id);
            continue;
        }
        if let Some(image) = student.image.take() {
            student.image = Some(resolve_image_path(&base_dir, &image));
        }
        students.push(student);
    }

    tracing::info!("成功加载 {} 名学生", students.len());
    Ok(students)
}

fn resolve_image_path(base_dir: &Path, image: &str) -> String {
    let path = PathBuf::from(image);
    if path.is_absolute() {
        image.to_string()
    } else {
        base_dir.join(path).to_string_lossy().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::student::StudentStatus;

    #[tokio::test]
    async fn test_load_roster_resolves_images_and_dedupes() {
        let dir = std::env::temp_dir().join(format!("roster-test-{}", std::process::id()));
        fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("roster.toml");
        fs::write(
            &path,
            r#"
            [[students]]
            id = 2023001
            name = "Liu Wei"
            image = "img_001.jpg"

            [[students]]
            id = "2023002"
            name = "Chen Xinyi"
            status = "Absent"

            [[students]]
            id = "2023001"
            name = "Duplicate"
            "#,
        )
        .await
        .unwrap();

        let students = load_roster(&path).await.unwrap();
        assert_eq!(students.len(), 2);
        assert_eq!(students[0].id, "2023001");
        assert_eq!(students[0].status, StudentStatus::Pending);
        let expected = dir.join("img_001.jpg").to_string_lossy().to_string();
        assert_eq!(students[0].image.as_deref(), Some(expected.as_str()));
        assert_eq!(students[1].status, StudentStatus::Absent);

        let _ = fs::remove_dir_all(&dir).await;
    }
}
