//! Gemini 评分客户端
//!
//! 调用 `generateContent` REST 接口：图片以 inlineData 形式和提示词放在同一个请求里，
//! 并要求返回 `application/json`。

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use crate::clients::http::{emit, exchange_grading, header_map, redact_key, ResponseShape};
use crate::clients::GradingClient;
use crate::config::{ApiProvider, GradingConfig};
use crate::error::GradingError;
use crate::models::api_log::{ApiLogEntry, LogSink, TokenUsage};
use crate::models::grading::{normalize_grading_result, GradingResult};
use crate::models::job::EncodedImage;
use crate::services::prompt_builder::build_grading_prompt;
use crate::utils::logging::truncate_marked;

const PROVIDER: &str = "gemini";
/// 日志中保留的图片 base64 前缀长度
const LOGGED_IMAGE_PREFIX: usize = 100;

/// Gemini 评分客户端
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    log_sink: Option<LogSink>,
}

impl GeminiClient {
    pub fn new(
        http: reqwest::Client,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            log_sink: None,
        }
    }

    pub fn with_log_sink(mut self, log_sink: Option<LogSink>) -> Self {
        self.log_sink = log_sink;
        self
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    fn headers(&self, api_key: String) -> Vec<(&'static str, String)> {
        vec![
            ("Content-Type", "application/json".to_string()),
            ("x-goog-api-key", api_key),
        ]
    }
}

/// 构建请求体；`image_data` 在写日志时传入截断后的数据
pub fn build_request_body(mime_type: &str, image_data: &str, prompt: &str) -> JsonValue {
    json!({
        "contents": [{
            "parts": [
                {
                    "inlineData": {
                        "mimeType": mime_type,
                        "data": image_data,
                    }
                },
                { "text": prompt }
            ]
        }],
        "generationConfig": {
            "responseMimeType": "application/json"
        }
    })
}

/// 拼接第一个候选的所有文本片段（跳过思考片段）
pub fn extract_text(response: &JsonValue) -> Option<String> {
    let parts = response
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter(|p| !p.get("thought").and_then(|t| t.as_bool()).unwrap_or(false))
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// 读取 token 用量，兼容 camelCase / snake_case 字段
pub fn extract_usage(response: &JsonValue, model: &str) -> Option<TokenUsage> {
    let usage = response
        .get("usageMetadata")
        .or_else(|| response.get("usage"))
        .or_else(|| response.get("usage_metadata"))?;
    let count = |keys: &[&str]| keys.iter().find_map(|k| usage.get(*k).and_then(|v| v.as_u64()));
    TokenUsage::from_counts(
        count(&["promptTokenCount", "prompt_tokens", "promptTokens"]),
        count(&["candidatesTokenCount", "completion_tokens", "completionTokens"]),
        count(&["totalTokenCount", "total_tokens", "totalTokens"]),
        PROVIDER,
        model,
    )
}

#[async_trait]
impl GradingClient for GeminiClient {
    fn provider(&self) -> ApiProvider {
        ApiProvider::Gemini
    }

    async fn grade(
        &self,
        image: &EncodedImage,
        config: &GradingConfig,
    ) -> Result<GradingResult, GradingError> {
        let prompt = build_grading_prompt(config);
        let url = self.endpoint();
        let body = build_request_body(&image.mime_type, &image.data, &prompt);

        let logged_data = truncate_marked(&image.data, LOGGED_IMAGE_PREFIX, "...[truncated]");
        emit(
            &self.log_sink,
            ApiLogEntry::request(PROVIDER, "POST", &url).with(|e| {
                e.headers = Some(header_map(&self.headers(redact_key(&self.api_key))));
                e.body = Some(build_request_body(&image.mime_type, &logged_data, &prompt));
            }),
        );

        debug!("调用 Gemini API，模型: {}", self.model);
        let shape = ResponseShape {
            provider: PROVIDER,
            label: "Gemini",
            model: &self.model,
            model_field: "modelVersion",
            extract_text,
            extract_usage,
        };
        let api_result = exchange_grading(
            &self.http,
            &url,
            &self.headers(self.api_key.clone()),
            &body,
            &shape,
            &self.log_sink,
        )
        .await?;
        Ok(normalize_grading_result(
            api_result,
            config.content_max,
            config.language_max,
        ))
    }
}
