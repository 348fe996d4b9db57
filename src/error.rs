//! 错误类型
//!
//! 分为两层：
//! - `GradingError`：单个评分请求的错误，只影响当前学生，可重试
//! - `BatchError`：批量运行级别的错误，直接结束整个 `run_batch`
//!
//! HTTP 状态码和错误响应体只在传输边界（`clients::http`）解析一次，
//! 之后所有逻辑都只匹配枚举变体。

use thiserror::Error;

/// 单次评分请求的错误
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GradingError {
    /// API Key 无效或无权限
    #[error("API Key 无效，请检查配置: {message}")]
    Auth { message: String },

    /// 请求频率限制（HTTP 429）
    #[error("Rate Limit 超出，请稍后重试: {message}")]
    RateLimited { message: String },

    /// 返回内容不是合法的评分 JSON
    #[error("API 返回格式错误，请重试: {message}")]
    MalformedResponse { message: String },

    /// 网络层失败（连接失败、超时、读取响应体失败）
    #[error("网络请求失败: {message}")]
    Transport { message: String },

    /// 其他 API 错误，保留原始信息
    #[error("API 请求失败 (状态码: {status:?}): {message}")]
    Api { status: Option<u16>, message: String },

    /// 图片载荷无法读取
    #[error("图片读取失败 ({source_name}): {message}")]
    Payload { source_name: String, message: String },

    /// 请求体构建失败
    #[error("请求构建失败: {message}")]
    InvalidRequest { message: String },

    /// 评分已取消（只在重试循环内部使用，不会成为学生的最终状态）
    #[error("评分已取消")]
    Cancelled,
}

impl GradingError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, GradingError::RateLimited { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, GradingError::Cancelled)
    }

    /// 错误类别名称（写入审计日志）
    pub fn kind(&self) -> &'static str {
        match self {
            GradingError::Auth { .. } => "auth",
            GradingError::RateLimited { .. } => "rate_limit",
            GradingError::MalformedResponse { .. } => "malformed_response",
            GradingError::Transport { .. } => "transport",
            GradingError::Api { .. } => "api",
            GradingError::Payload { .. } => "payload",
            GradingError::InvalidRequest { .. } => "invalid_request",
            GradingError::Cancelled => "cancelled",
        }
    }
}

/// 批量运行级别的错误
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BatchError {
    /// 没有可评分的学生
    #[error("没有需要评分的学生")]
    NoJobs,

    /// 运行被取消（在所有 worker 退出之后返回）
    #[error("批量处理已取消")]
    Cancelled,

    /// 选中的学生缺少图片文件
    #[error("{} 名学生没有图片文件，无法处理: {}", identities.len(), identities.join(", "))]
    MissingPayload { identities: Vec<String> },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },

    /// 当前 API 提供方缺少 Key
    #[error("{provider} API Key 未设置")]
    MissingApiKey { provider: String },

    /// 字段取值非法
    #[error("配置项 {field} 非法: {reason}")]
    Invalid { field: String, reason: String },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    #[error("文件不存在: {path}")]
    NotFound { path: String },

    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    #[error("评分错误: {0}")]
    Grading(#[from] GradingError),

    #[error("批处理错误: {0}")]
    Batch(#[from] BatchError),

    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    #[error("文件错误: {0}")]
    File(#[from] FileError),

    #[error("JSON 处理失败: {0}")]
    Json(#[from] serde_json::Error),
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_payload_message_lists_identities() {
        let err = BatchError::MissingPayload {
            identities: vec!["2023001".to_string(), "2023003".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("2 名学生"));
        assert!(msg.contains("2023001, 2023003"));
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(
            GradingError::RateLimited { message: String::new() }.kind(),
            "rate_limit"
        );
        assert!(GradingError::Cancelled.is_cancelled());
        assert!(!GradingError::Transport { message: "x".into() }.is_rate_limited());
    }
}
