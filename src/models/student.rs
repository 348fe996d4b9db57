use crate::models::grading::GradingResult;
use serde::{Deserialize, Serialize};

/// 学生评分状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StudentStatus {
    #[default]
    Pending,
    Processing,
    Graded,
    Absent,
    Failed,
}

impl StudentStatus {
    pub fn label(&self) -> &'static str {
        match self {
            StudentStatus::Pending => "待评分",
            StudentStatus::Processing => "处理中",
            StudentStatus::Graded => "已评分",
            StudentStatus::Absent => "缺考",
            StudentStatus::Failed => "失败",
        }
    }
}

/// 学生记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(deserialize_with = "deserialize_identity")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default)]
    pub status: StudentStatus,
    /// 作文图片路径
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grading_result: Option<GradingResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_start_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_end_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_duration: Option<i64>,
}

impl Student {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            class: None,
            status: StudentStatus::Pending,
            image: None,
            score: None,
            grading_result: None,
            processing_start_time: None,
            processing_end_time: None,
            processing_duration: None,
        }
    }

    pub fn with_status(mut self, status: StudentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}

// 花名册里的学号可能写成字符串，也可能写成整数
fn deserialize_identity<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Visitor;
    use std::fmt;

    struct IdentityVisitor;

    impl<'de> Visitor<'de> for IdentityVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or integer student id")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.trim().to_string())
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }
    }

    deserializer.deserialize_any(IdentityVisitor)
}
