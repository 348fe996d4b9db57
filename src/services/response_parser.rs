//! 评分响应解析
//!
//! 模型不总是只返回 JSON：可能包在 ```json 代码块里，也可能前后带有思考过程。
//! 解析顺序：```json 代码块 → 去掉首尾 ``` → 第一个 `{` 到最后一个 `}`。

use crate::error::GradingError;
use crate::models::grading::GradingResultApi;
use regex::Regex;
use tracing::debug;

/// 解析模型返回的文本
pub fn parse_grading_response(text: &str) -> Result<GradingResultApi, GradingError> {
    let json_text = extract_json_text(text);
    serde_json::from_str::<GradingResultApi>(json_text).map_err(|e| {
        debug!("无法解析评分 JSON: {}", e);
        GradingError::MalformedResponse {
            message: e.to_string(),
        }
    })
}

/// 从模型输出中截取 JSON 对象文本
pub fn extract_json_text(text: &str) -> &str {
    let trimmed = text.trim();

    if let Some(inner) = fenced_json_block(trimmed) {
        return inner;
    }

    let unfenced = strip_fences(trimmed);
    match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(first), Some(last)) if last > first => &unfenced[first..=last],
        _ => unfenced,
    }
}

fn fenced_json_block(text: &str) -> Option<&str> {
    let re = Regex::new(r"(?s)```json\s*\n(.*?)\n?```").ok()?;
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
}

fn strip_fences(text: &str) -> &str {
    if !text.starts_with("```") {
        return text;
    }
    let body = text.trim_start_matches("```");
    let body = body.strip_prefix("json").unwrap_or(body);
    body.trim_end().trim_end_matches("```").trim()
}
