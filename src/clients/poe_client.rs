//! Poe 评分客户端
//!
//! Poe 提供 OpenAI 兼容的 `/chat/completions` 接口。请求消息用 `async-openai`
//! 的类型构建，再补上 Poe 特有的 `response_format` 和 `extra_body` 字段。

use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
    ChatCompletionRequestMessageContentPartText, ChatCompletionRequestUserMessageArgs,
    ChatCompletionRequestUserMessageContent, ChatCompletionRequestUserMessageContentPart,
    CreateChatCompletionRequestArgs, ImageUrl,
};
use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use crate::clients::http::{emit, exchange_grading, header_map, redact_key, ResponseShape};
use crate::clients::GradingClient;
use crate::config::{ApiProvider, GradingConfig, ThinkingLevel};
use crate::error::GradingError;
use crate::models::api_log::{ApiLogEntry, LogSink, TokenUsage};
use crate::models::grading::{normalize_grading_result, GradingResult};
use crate::models::job::EncodedImage;
use crate::services::prompt_builder::build_grading_prompt;
use crate::utils::logging::truncate_marked;

const PROVIDER: &str = "poe";
const LOGGED_IMAGE_PREFIX: usize = 50;

/// Poe 评分客户端
pub struct PoeClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    thinking_level: ThinkingLevel,
    log_sink: Option<LogSink>,
}

impl PoeClient {
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
            thinking_level: ThinkingLevel::default(),
            log_sink: None,
        }
    }

    pub fn with_thinking_level(mut self, level: ThinkingLevel) -> Self {
        self.thinking_level = level;
        self
    }

    pub fn with_log_sink(mut self, log_sink: Option<LogSink>) -> Self {
        self.log_sink = log_sink;
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn headers(&self, bearer: String) -> Vec<(&'static str, String)> {
        vec![
            ("Content-Type", "application/json".to_string()),
            ("Authorization", format!("Bearer {}", bearer)),
        ]
    }
}

/// 构建请求体
///
/// 用户消息先放图片（data URI）再放提示词。思考等级为默认值时不发送 `extra_body`。
pub fn build_request_body(
    model: &str,
    image_uri: &str,
    prompt: &str,
    thinking_level: ThinkingLevel,
) -> Result<JsonValue, GradingError> {
    let invalid = |e: async_openai::error::OpenAIError| GradingError::InvalidRequest {
        message: format!("构建 Poe 请求失败: {}", e),
    };

    let content_parts = vec![
        ChatCompletionRequestUserMessageContentPart::ImageUrl(
            ChatCompletionRequestMessageContentPartImage {
                image_url: ImageUrl {
                    url: image_uri.to_string(),
                    detail: None,
                },
            },
        ),
        ChatCompletionRequestUserMessageContentPart::Text(
            ChatCompletionRequestMessageContentPartText {
                text: prompt.to_string(),
            },
        ),
    ];

    let user_msg = ChatCompletionRequestUserMessageArgs::default()
        .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
        .build()
        .map_err(invalid)?;

    let request = CreateChatCompletionRequestArgs::default()
        .model(model)
        .messages(vec![ChatCompletionRequestMessage::User(user_msg)])
        .build()
        .map_err(invalid)?;

    let mut body = serde_json::to_value(&request).map_err(|e| GradingError::InvalidRequest {
        message: format!("序列化 Poe 请求失败: {}", e),
    })?;
    if let Some(obj) = body.as_object_mut() {
        obj.insert("response_format".into(), json!({ "type": "json_object" }));
        if !thinking_level.is_default() {
            obj.insert(
                "extra_body".into(),
                json!({ "thinking_level": thinking_level.as_str() }),
            );
        }
    }
    Ok(body)
}

/// 第一个 choice 的消息内容
pub fn extract_text(response: &JsonValue) -> Option<String> {
    response
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

pub fn extract_usage(response: &JsonValue, model: &str) -> Option<TokenUsage> {
    let usage = response.get("usage")?;
    let count = |key: &str| usage.get(key).and_then(|v| v.as_u64());
    TokenUsage::from_counts(
        count("prompt_tokens"),
        count("completion_tokens"),
        count("total_tokens"),
        PROVIDER,
        model,
    )
}

#[async_trait]
impl GradingClient for PoeClient {
    fn provider(&self) -> ApiProvider {
        ApiProvider::Poe
    }

    async fn grade(
        &self,
        image: &EncodedImage,
        config: &GradingConfig,
    ) -> Result<GradingResult, GradingError> {
        let prompt = build_grading_prompt(config);
        let url = self.endpoint();
        let body = build_request_body(&self.model, &image.data_uri(), &prompt, self.thinking_level)?;

        let logged_uri = format!(
            "data:{};base64,{}",
            image.mime_type,
            truncate_marked(&image.data, LOGGED_IMAGE_PREFIX, "...[truncated]")
        );
        let logged_body = build_request_body(&self.model, &logged_uri, &prompt, self.thinking_level)?;
        emit(
            &self.log_sink,
            ApiLogEntry::request(PROVIDER, "POST", &url).with(|e| {
                e.headers = Some(header_map(&self.headers(redact_key(&self.api_key))));
                e.body = Some(logged_body);
            }),
        );

        debug!(
            "调用 Poe API，模型: {}，思考等级: {}",
            self.model,
            self.thinking_level.as_str()
        );
        let shape = ResponseShape {
            provider: PROVIDER,
            label: "Poe",
            model: &self.model,
            model_field: "model",
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_default_thinking_level() {
        let body = build_request_body(
            "gemini-3-pro",
            "data:image/jpeg;base64,AAAA",
            "grade it",
            ThinkingLevel::Low,
        )
        .unwrap();

        assert_eq!(body["model"], "gemini-3-pro");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert!(body.get("extra_body").is_none());

        let content = &body["messages"][0]["content"];
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(content[0]["type"], "image_url");
        assert_eq!(content[0]["image_url"]["url"], "data:image/jpeg;base64,AAAA");
        assert_eq!(content[1]["type"], "text");
        assert_eq!(content[1]["text"], "grade it");
    }

    #[test]
    fn test_request_body_with_thinking_level() {
        let body = build_request_body("m", "data:image/png;base64,BB", "p", ThinkingLevel::High)
            .unwrap();
        assert_eq!(body["extra_body"]["thinking_level"], "high");
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = PoeClient::new(reqwest::Client::new(), "k", "https://api.poe.com/v1/", "m");
        assert_eq!(client.endpoint(), "https://api.poe.com/v1/chat/completions");
    }

    #[test]
    fn test_extract_text_and_usage() {
        let response = json!({
            "model": "gemini-3-pro",
            "choices": [{"message": {"role": "assistant", "content": "{\"total_score\": 12}"}}],
            "usage": {"prompt_tokens": 900, "completion_tokens": 200}
        });
        assert_eq!(
            extract_text(&response).as_deref(),
            Some("{\"total_score\": 12}")
        );
        let usage = extract_usage(&response, "gemini-3-pro").unwrap();
        assert_eq!(usage.total_tokens, 1100);

        let empty = json!({"choices": [{"message": {"content": "  "}}]});
        assert_eq!(extract_text(&empty), None);
    }

    mod over_http {
        use super::*;
        use crate::config::Config;
        use crate::models::api_log::LogDirection;
        use httpmock::prelude::*;
        use std::sync::{Arc, Mutex};

        const KEY: &str = "test-key-1234567890";

        fn client(server: &MockServer) -> (PoeClient, Arc<Mutex<Vec<ApiLogEntry>>>) {
            let logs = Arc::new(Mutex::new(Vec::<ApiLogEntry>::new()));
            let collected = logs.clone();
            let sink: LogSink = Arc::new(move |e: ApiLogEntry| collected.lock().unwrap().push(e));
            let client = PoeClient::new(reqwest::Client::new(), KEY, server.base_url(), "gemini-3-pro")
                .with_thinking_level(ThinkingLevel::High)
                .with_log_sink(Some(sink));
            (client, logs)
        }

        fn image() -> EncodedImage {
            EncodedImage::jpeg("B".repeat(200))
        }

        fn answer(content: &str) -> JsonValue {
            json!({
                "model": "gemini-3-pro",
                "choices": [{"message": {"role": "assistant", "content": content}}],
                "usage": {"prompt_tokens": 1, "completion_tokens": 2}
            })
        }

        #[tokio::test]
        async fn test_fenced_success_is_parsed_and_logged() {
            let server = MockServer::start_async().await;
            let content = "Here is the grading:\n```json\n{\"recognized_text\":\"My weekend.\",\"content_score\":4,\"language_score\":6.5,\"total_score\":10.5,\"content_comment\":\"ok\",\"language_comment\":\"fine\",\"general_comment\":\"keep going\"}\n```";
            let mock = server
                .mock_async(|when, then| {
                    when.method(POST)
                        .path("/chat/completions")
                        .header("authorization", "Bearer test-key-1234567890");
                    then.status(200).json_body(answer(content));
                })
                .await;

            let (client, logs) = client(&server);
            let result = client
                .grade(&image(), &Config::default().grading_config())
                .await
                .unwrap();
            mock.assert_async().await;

            assert_eq!(result.total_score, 10.5);
            assert_eq!(result.comments.general.as_deref(), Some("keep going"));

            let logs = logs.lock().unwrap();
            assert_eq!(logs.len(), 2);
            let request = &logs[0];
            assert_eq!(
                request.headers.as_ref().unwrap()["Authorization"],
                "Bearer test-key-1...[hidden]"
            );
            let body = request.body.as_ref().unwrap();
            assert_eq!(body["extra_body"]["thinking_level"], "high");
            assert_eq!(
                body["messages"][0]["content"][0]["image_url"]["url"],
                format!("data:image/jpeg;base64,{}...[truncated]", "B".repeat(50))
            );

            assert_eq!(logs[1].status, Some(200));
            assert_eq!(logs[1].usage.as_ref().unwrap().total_tokens, 3);
        }

        #[tokio::test]
        async fn test_rate_limit_is_classified() {
            let server = MockServer::start_async().await;
            server
                .mock_async(|when, then| {
                    when.method(POST).path("/chat/completions");
                    then.status(429)
                        .json_body(json!({"error": {"message": "Too many requests", "type": "rate_limit"}}));
                })
                .await;

            let (client, logs) = client(&server);
            let err = client
                .grade(&image(), &Config::default().grading_config())
                .await
                .unwrap_err();

            assert_eq!(
                err,
                GradingError::RateLimited {
                    message: "Too many requests".to_string()
                }
            );
            let logs = logs.lock().unwrap();
            assert_eq!(logs.len(), 2);
            assert_eq!(logs[1].direction, LogDirection::Response);
            assert_eq!(logs[1].status, Some(429));
        }

        #[tokio::test]
        async fn test_unparseable_model_text() {
            let server = MockServer::start_async().await;
            server
                .mock_async(|when, then| {
                    when.method(POST).path("/chat/completions");
                    then.status(200).json_body(answer("Sorry, I cannot read this image."));
                })
                .await;

            let (client, logs) = client(&server);
            let err = client
                .grade(&image(), &Config::default().grading_config())
                .await
                .unwrap_err();

            assert!(matches!(err, GradingError::MalformedResponse { .. }));
            let logs = logs.lock().unwrap();
            assert_eq!(logs.len(), 2);
            let response = logs[1].response.as_ref().unwrap();
            assert_eq!(response["text"], "Sorry, I cannot read this image.");
            assert!(logs[1].error.is_some());
        }
    }
}
