//! API 对话日志
//!
//! 字段与监控界面使用的 JSON 结构保持一致（camelCase）。

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogDirection {
    Request,
    Response,
}

/// token 用量，只有响应里带了用量统计时才存在
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub provider: String,
    pub model: String,
}

impl TokenUsage {
    /// 缺少 total 时用 prompt + completion 补齐；其余字段缺失则返回 None
    pub fn from_counts(
        prompt_tokens: Option<u64>,
        completion_tokens: Option<u64>,
        total_tokens: Option<u64>,
        provider: &str,
        model: &str,
    ) -> Option<Self> {
        let prompt_tokens = prompt_tokens?;
        let completion_tokens = completion_tokens?;
        let total_tokens = total_tokens.unwrap_or(prompt_tokens + completion_tokens);
        Some(Self {
            prompt_tokens,
            completion_tokens,
            total_tokens,
            provider: provider.to_string(),
            model: model.to_string(),
        })
    }
}

/// 一条 API 日志
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiLogEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
    pub direction: LogDirection,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 毫秒
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl ApiLogEntry {
    pub fn request(provider: &str, method: &str, url: &str) -> Self {
        Self::empty(LogDirection::Request, provider).with(|e| {
            e.method = Some(method.to_string());
            e.url = Some(url.to_string());
        })
    }

    pub fn response(provider: &str, status: Option<u16>, duration: u64) -> Self {
        Self::empty(LogDirection::Response, provider).with(|e| {
            e.status = status;
            e.duration = Some(duration);
        })
    }

    fn empty(direction: LogDirection, provider: &str) -> Self {
        Self {
            student_id: None,
            student_name: None,
            direction,
            provider: provider.to_string(),
            method: None,
            url: None,
            headers: None,
            body: None,
            response: None,
            status: None,
            error: None,
            duration: None,
            usage: None,
        }
    }

    /// 原地修改后返回自身，便于链式构建
    pub fn with(mut self, f: impl FnOnce(&mut Self)) -> Self {
        f(&mut self);
        self
    }
}

/// 日志回调
pub type LogSink = Arc<dyn Fn(ApiLogEntry) + Send + Sync>;

/// 给日志打上学生信息后再转发
pub fn tagged_sink(inner: LogSink, student_id: String, student_name: Option<String>) -> LogSink {
    Arc::new(move |mut entry: ApiLogEntry| {
        entry.student_id = Some(student_id.clone());
        entry.student_name = student_name.clone();
        inner(entry)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_usage_total_is_derived_only_when_parts_exist() {
        let usage = TokenUsage::from_counts(Some(100), Some(20), None, "poe", "m").unwrap();
        assert_eq!(usage.total_tokens, 120);

        assert!(TokenUsage::from_counts(Some(100), None, Some(120), "poe", "m").is_none());
        assert!(TokenUsage::from_counts(None, None, None, "gemini", "m").is_none());
    }

    #[test]
    fn test_log_entry_json_shape() {
        let entry = ApiLogEntry::response("gemini", Some(200), 1500);
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["direction"], "response");
        assert_eq!(value["status"], 200);
        assert_eq!(value["duration"], 1500);
        assert!(value.get("usage").is_none());
        assert!(value.get("url").is_none());
    }

    #[test]
    fn test_tagged_sink_adds_student() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let inner: LogSink = Arc::new(move |e: ApiLogEntry| seen_clone.lock().unwrap().push(e));
        let sink = tagged_sink(inner, "2023001".into(), Some("Liu Wei".into()));

        sink(ApiLogEntry::request("poe", "POST", "https://example.com"));

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].student_id.as_deref(), Some("2023001"));
        assert_eq!(seen[0].student_name.as_deref(), Some("Liu Wei"));
    }
}
