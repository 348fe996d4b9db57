//! 传输边界
//!
//! 发送 JSON 请求、测量耗时，并且在这里一次性把 HTTP 状态码和错误响应体
//! 归类成 `GradingError`。上层只匹配枚举，不再检查错误字符串。

use crate::error::GradingError;
use crate::models::api_log::{ApiLogEntry, LogSink, TokenUsage};
use crate::models::grading::GradingResultApi;
use crate::services::response_parser::parse_grading_response;
use crate::utils::logging::truncate_marked;
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, warn};

/// 日志中保留的响应文本长度
pub const LOGGED_TEXT_LIMIT: usize = 500;
/// 日志中 API Key 保留的前缀长度
const LOGGED_KEY_PREFIX: usize = 10;

/// 一次成功完成的 HTTP 往返（状态码可能是错误码）
#[derive(Debug)]
pub struct HttpExchange {
    pub status: u16,
    pub body: String,
    pub duration_ms: u64,
}

impl HttpExchange {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// 传输层失败（没有拿到 HTTP 响应）
#[derive(Debug)]
pub struct TransportFailure {
    pub error: GradingError,
    pub duration_ms: u64,
}

/// POST 一个 JSON 请求体，读取完整响应
pub async fn post_json(
    client: &reqwest::Client,
    url: &str,
    headers: &[(&str, String)],
    body: &JsonValue,
) -> Result<HttpExchange, TransportFailure> {
    let started = Instant::now();
    let mut request = client.post(url).json(body);
    for (name, value) in headers {
        request = request.header(*name, value.as_str());
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            return Err(TransportFailure {
                error: classify_transport_error(&e),
                duration_ms: elapsed_ms(started),
            })
        }
    };

    let status = response.status().as_u16();
    match response.text().await {
        Ok(body) => Ok(HttpExchange {
            status,
            body,
            duration_ms: elapsed_ms(started),
        }),
        Err(e) => Err(TransportFailure {
            error: classify_transport_error(&e),
            duration_ms: elapsed_ms(started),
        }),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// 网络层错误统一归为 `Transport`
pub fn classify_transport_error(err: &reqwest::Error) -> GradingError {
    let message = if err.is_timeout() {
        format!("请求超时: {}", err)
    } else if err.is_connect() {
        format!("连接失败: {}", err)
    } else {
        err.to_string()
    };
    GradingError::Transport { message }
}

/// 根据 HTTP 状态码和错误响应体归类错误
///
/// 兼容两种错误体：
/// - Gemini: `{"error": {"code": 400, "message": "...", "status": "INVALID_ARGUMENT"}}`
/// - OpenAI 兼容: `{"error": {"message": "...", "type": "..."}}`
pub fn classify_http_failure(status: u16, body: &str) -> GradingError {
    let parsed: Option<JsonValue> = serde_json::from_str(body).ok();
    let error_obj = parsed.as_ref().and_then(|v| v.get("error"));
    let message = error_obj
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("API 请求失败: {}", status));
    let error_status = error_obj
        .and_then(|e| e.get("status"))
        .and_then(|s| s.as_str())
        .unwrap_or_default();

    let auth_message = message.contains("API key not valid")
        || message.contains("API_KEY_INVALID")
        || body.contains("API_KEY_INVALID");

    if status == 401
        || status == 403
        || matches!(error_status, "UNAUTHENTICATED" | "PERMISSION_DENIED")
        || auth_message
    {
        return GradingError::Auth { message };
    }
    if status == 429 || error_status == "RESOURCE_EXHAUSTED" {
        return GradingError::RateLimited { message };
    }
    GradingError::Api {
        status: Some(status),
        message,
    }
}

/// 错误响应体写入日志的形式：能解析成 JSON 就保留结构，否则截断文本
pub fn error_body_for_log(body: &str) -> Option<JsonValue> {
    if body.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<JsonValue>(body) {
        Ok(value) => Some(value),
        Err(_) => Some(JsonValue::String(truncate_marked(
            body,
            LOGGED_TEXT_LIMIT,
            "...[truncated]",
        ))),
    }
}

/// API Key 只保留前缀
pub fn redact_key(key: &str) -> String {
    let prefix: String = key.chars().take(LOGGED_KEY_PREFIX).collect();
    format!("{}...[hidden]", prefix)
}

pub fn header_map(pairs: &[(&str, String)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// 发送日志（未配置回调时忽略）
pub fn emit(sink: &Option<LogSink>, entry: ApiLogEntry) {
    if let Some(sink) = sink {
        sink(entry);
    }
}

/// 失败时的唯一一条 response 日志
pub fn failure_entry(
    provider: &str,
    status: Option<u16>,
    error: &GradingError,
    duration_ms: u64,
    response: Option<JsonValue>,
) -> ApiLogEntry {
    ApiLogEntry::response(provider, status, duration_ms).with(|e| {
        e.error = Some(error.to_string());
        e.response = response;
    })
}

/// 后端响应信封的读取方式
pub struct ResponseShape<'a> {
    /// 日志里的 provider 名
    pub provider: &'static str,
    /// 人读的后端名
    pub label: &'static str,
    /// 响应里没有模型名时使用的配置值
    pub model: &'a str,
    /// 响应里模型名所在的字段
    pub model_field: &'static str,
    pub extract_text: fn(&JsonValue) -> Option<String>,
    pub extract_usage: fn(&JsonValue, &str) -> Option<TokenUsage>,
}

/// 发送评分请求并解析模型输出
///
/// 无论成功与否都只写一条 response 日志；request 日志由调用方在此之前写入。
pub async fn exchange_grading(
    client: &reqwest::Client,
    url: &str,
    headers: &[(&str, String)],
    body: &JsonValue,
    shape: &ResponseShape<'_>,
    sink: &Option<LogSink>,
) -> Result<GradingResultApi, GradingError> {
    let provider = shape.provider;
    let exchange = match post_json(client, url, headers, body).await {
        Ok(exchange) => exchange,
        Err(failure) => {
            warn!("{} API 调用失败: {}", shape.label, failure.error);
            emit(
                sink,
                failure_entry(provider, None, &failure.error, failure.duration_ms, None),
            );
            return Err(failure.error);
        }
    };

    let fail_raw = |error: GradingError| {
        emit(
            sink,
            failure_entry(
                provider,
                Some(exchange.status),
                &error,
                exchange.duration_ms,
                error_body_for_log(&exchange.body),
            ),
        );
        Err(error)
    };

    if !exchange.is_success() {
        let error = classify_http_failure(exchange.status, &exchange.body);
        warn!("{} API 返回错误 ({}): {}", shape.label, exchange.status, error);
        return fail_raw(error);
    }

    let envelope: JsonValue = match serde_json::from_str(&exchange.body) {
        Ok(value) => value,
        Err(e) => {
            return fail_raw(GradingError::MalformedResponse {
                message: format!("响应不是合法 JSON: {}", e),
            })
        }
    };

    let model = envelope
        .get(shape.model_field)
        .and_then(|m| m.as_str())
        .unwrap_or(shape.model)
        .to_string();
    let usage = (shape.extract_usage)(&envelope, &model);

    let Some(text) = (shape.extract_text)(&envelope) else {
        let error = GradingError::MalformedResponse {
            message: format!("No response from {}", shape.label),
        };
        emit(sink, text_entry(provider, &exchange, "", usage, Some(&error)));
        return Err(error);
    };

    let parsed = parse_grading_response(&text);
    emit(
        sink,
        text_entry(provider, &exchange, &text, usage, parsed.as_ref().err()),
    );
    if parsed.is_ok() {
        debug!("{} API 调用成功，耗时 {}ms", shape.label, exchange.duration_ms);
    }
    parsed
}

/// 拿到模型文本后的 response 日志
fn text_entry(
    provider: &str,
    exchange: &HttpExchange,
    text: &str,
    usage: Option<TokenUsage>,
    error: Option<&GradingError>,
) -> ApiLogEntry {
    ApiLogEntry::response(provider, Some(exchange.status), exchange.duration_ms).with(|e| {
        e.usage = usage;
        e.response = Some(json!({
            "text": truncate_marked(text, LOGGED_TEXT_LIMIT, "...[truncated]"),
            "fullLength": text.chars().count(),
        }));
        e.error = error.map(|err| err.to_string());
    })
}
