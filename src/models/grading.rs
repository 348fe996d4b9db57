use serde::{Deserialize, Serialize};

/// API 返回的原始格式（字段名与提示词中的 JSON 示例一致）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingResultApi {
    pub recognized_text: String,
    pub content_score: f64,
    pub language_score: f64,
    pub total_score: f64,
    pub content_comment: String,
    pub language_comment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub general_comment: Option<String>,
}

/// 评语
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comments {
    pub content: String,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub general: Option<String>,
}

/// 内部使用的评分结果
///
/// `total_score` 直接采用模型给出的总分，不在本地重新计算。
/// 两个满分字段来自配置，不是模型输出。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingResult {
    pub total_score: f64,
    pub content_score: f64,
    pub content_max: f64,
    pub language_score: f64,
    pub language_max: f64,
    pub transcribed_text: String,
    pub comments: Comments,
}

impl GradingResult {
    /// 总分与分项之和不一致时返回差值（总分 - 分项之和）
    pub fn score_mismatch(&self) -> Option<f64> {
        let delta = self.total_score - (self.content_score + self.language_score);
        if delta.abs() > 1e-6 {
            Some(delta)
        } else {
            None
        }
    }
}

/// 将 API 返回的字段转换为内部格式
///
/// 只做字段改名并附加两个满分配置，不校验分数范围。
pub fn normalize_grading_result(
    api: GradingResultApi,
    content_max: f64,
    language_max: f64,
) -> GradingResult {
    GradingResult {
        total_score: api.total_score,
        content_score: api.content_score,
        content_max,
        language_score: api.language_score,
        language_max,
        transcribed_text: api.recognized_text,
        comments: Comments {
            content: api.content_comment,
            language: api.language_comment,
            general: api.general_comment,
        },
    }
}
