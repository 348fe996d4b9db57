//! 程序配置
//!
//! 加载顺序：默认值 → TOML 配置文件（可选，`GRADER_CONFIG`）→ 环境变量

use crate::error::{ConfigError, FileError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// 内容要点最多数量
pub const MAX_CONTENT_POINTS: usize = 6;

/// API 提供方
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiProvider {
    #[default]
    Gemini,
    Poe,
}

impl ApiProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiProvider::Gemini => "gemini",
            ApiProvider::Poe => "poe",
        }
    }
}

impl fmt::Display for ApiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ApiProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(ApiProvider::Gemini),
            "poe" => Ok(ApiProvider::Poe),
            other => Err(ConfigError::EnvVarParseFailed {
                var_name: "GRADER_API_PROVIDER".to_string(),
                value: other.to_string(),
                expected_type: "gemini | poe".to_string(),
            }),
        }
    }
}

/// Poe 推理强度
///
/// `low` 是服务端默认值，只有 `minimal` / `high` 才会写进请求体
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingLevel {
    Minimal,
    #[default]
    Low,
    High,
}

impl ThinkingLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThinkingLevel::Minimal => "minimal",
            ThinkingLevel::Low => "low",
            ThinkingLevel::High => "high",
        }
    }

    pub fn is_default(&self) -> bool {
        *self == ThinkingLevel::Low
    }
}

impl std::str::FromStr for ThinkingLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minimal" => Ok(ThinkingLevel::Minimal),
            "low" => Ok(ThinkingLevel::Low),
            "high" => Ok(ThinkingLevel::High),
            other => Err(ConfigError::EnvVarParseFailed {
                var_name: "POE_THINKING_LEVEL".to_string(),
                value: other.to_string(),
                expected_type: "minimal | low | high".to_string(),
            }),
        }
    }
}

/// 内容评分模式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentPointsMode {
    /// 最多 6 个独立要点
    #[default]
    Points,
    /// 一整段评分标准文本
    Text,
}

/// 解析后的内容评分标准
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentRubric {
    Points(Vec<String>),
    Text(String),
}

/// 评分提示词所需的配置
#[derive(Clone, Debug, PartialEq)]
pub struct GradingConfig {
    pub task_prompt: String,
    pub content_rubric: ContentRubric,
    pub content_max: f64,
    pub language_max: f64,
}

impl GradingConfig {
    pub fn total_max(&self) -> f64 {
        self.content_max + self.language_max
    }
}

/// 程序配置
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- API 配置 ---
    pub api_provider: ApiProvider,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub poe_api_key: String,
    pub poe_model: String,
    pub poe_base_url: String,
    pub poe_thinking_level: ThinkingLevel,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,

    // --- 批处理配置 ---
    /// 同时评分的学生数量
    pub concurrency: usize,
    /// 两次请求之间的最小间隔（毫秒），所有 worker 共享
    pub request_interval_ms: u64,
    /// 每个学生的最大尝试次数
    pub max_retries: u32,

    // --- 评分标准 ---
    pub task_prompt: String,
    pub content_points: Vec<String>,
    pub content_points_mode: ContentPointsMode,
    pub content_points_text: String,
    pub content_max: f64,
    pub language_max: f64,

    // --- 文件 ---
    pub roster_file: String,
    pub output_file: String,
    /// API 审计日志（JSON Lines），为空则不写
    pub api_log_file: String,
    /// 只评分这些学号（为空则评分所有待评分学生）
    pub only: Vec<String>,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_provider: ApiProvider::Gemini,
            gemini_api_key: String::new(),
            gemini_model: "gemini-3-pro".to_string(),
            gemini_base_url: "https://generativelanguage.googleapis.com".to_string(),
            poe_api_key: String::new(),
            poe_model: "gemini-3-pro".to_string(),
            poe_base_url: "https://api.poe.com/v1".to_string(),
            poe_thinking_level: ThinkingLevel::Low,
            request_timeout_secs: 120,
            concurrency: 5,
            request_interval_ms: 500,
            max_retries: 3,
            task_prompt: "Write a passage about \"My Favorite Weekend Activity\". You should include: 1. What the activity is. 2. Who you do it with. 3. Why you enjoy it.".to_string(),
            content_points: vec![
                "Must mention activity name".to_string(),
                "Must mention partners".to_string(),
                "Must mention reason for enjoyment".to_string(),
            ],
            content_points_mode: ContentPointsMode::Points,
            content_points_text: String::new(),
            content_max: 6.0,
            language_max: 9.0,
            roster_file: "roster.toml".to_string(),
            output_file: "grading_results.json".to_string(),
            api_log_file: "api_log.jsonl".to_string(),
            only: Vec::new(),
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 默认值 + 可选配置文件（`GRADER_CONFIG`）+ 环境变量
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match std::env::var("GRADER_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::from_toml_file(Path::new(path.trim()))?,
            _ => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// 从 TOML 文件加载，缺失的字段使用默认值
    pub fn from_toml_file(path: &Path) -> Result<Self, FileError> {
        let display = path.display().to_string();
        if !path.exists() {
            return Err(FileError::NotFound { path: display });
        }
        let content = std::fs::read_to_string(path).map_err(|source| FileError::ReadFailed {
            path: display.clone(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| FileError::TomlParseFailed {
            path: display,
            source,
        })
    }

    /// 用环境变量覆盖配置
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(v) = env_string("GRADER_API_PROVIDER") {
            self.api_provider = v.parse()?;
        }
        override_string(&mut self.gemini_api_key, "GEMINI_API_KEY");
        override_string(&mut self.gemini_model, "GEMINI_MODEL");
        override_string(&mut self.gemini_base_url, "GEMINI_BASE_URL");
        override_string(&mut self.poe_api_key, "POE_API_KEY");
        override_string(&mut self.poe_model, "POE_MODEL");
        override_string(&mut self.poe_base_url, "POE_BASE_URL");
        if let Some(v) = env_string("POE_THINKING_LEVEL") {
            self.poe_thinking_level = v.parse()?;
        }
        override_parsed(&mut self.request_timeout_secs, "GRADER_REQUEST_TIMEOUT_SECS", "u64")?;
        override_parsed(&mut self.concurrency, "GRADER_CONCURRENCY", "usize")?;
        override_parsed(&mut self.request_interval_ms, "GRADER_REQUEST_INTERVAL_MS", "u64")?;
        override_parsed(&mut self.max_retries, "GRADER_MAX_RETRIES", "u32")?;
        override_string(&mut self.roster_file, "GRADER_ROSTER_FILE");
        override_string(&mut self.output_file, "GRADER_OUTPUT_FILE");
        override_string(&mut self.api_log_file, "GRADER_API_LOG_FILE");
        if let Some(v) = env_string("GRADER_ONLY") {
            self.only = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        override_parsed(&mut self.verbose_logging, "VERBOSE_LOGGING", "bool")?;
        Ok(())
    }

    /// 检查配置是否可用于评分
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.api_provider {
            ApiProvider::Gemini if self.gemini_api_key.trim().is_empty() => {
                return Err(ConfigError::MissingApiKey {
                    provider: "Gemini".to_string(),
                });
            }
            ApiProvider::Poe if self.poe_api_key.trim().is_empty() => {
                return Err(ConfigError::MissingApiKey {
                    provider: "Poe".to_string(),
                });
            }
            _ => {}
        }
        if self.concurrency == 0 {
            return Err(invalid("concurrency", "必须大于 0"));
        }
        if self.max_retries == 0 {
            return Err(invalid("max_retries", "必须大于 0"));
        }
        if self.content_points.len() > MAX_CONTENT_POINTS {
            return Err(invalid(
                "content_points",
                &format!("最多 {} 个要点", MAX_CONTENT_POINTS),
            ));
        }
        if !(self.content_max > 0.0) {
            return Err(invalid("content_max", "必须大于 0"));
        }
        if !(self.language_max > 0.0) {
            return Err(invalid("language_max", "必须大于 0"));
        }
        Ok(())
    }

    /// 文本模式只有在文本非空时才生效，否则回退到要点模式
    pub fn content_rubric(&self) -> ContentRubric {
        if self.content_points_mode == ContentPointsMode::Text
            && !self.content_points_text.trim().is_empty()
        {
            return ContentRubric::Text(self.content_points_text.clone());
        }
        ContentRubric::Points(
            self.content_points
                .iter()
                .filter(|p| !p.trim().is_empty())
                .take(MAX_CONTENT_POINTS)
                .cloned()
                .collect(),
        )
    }

    pub fn grading_config(&self) -> GradingConfig {
        GradingConfig {
            task_prompt: self.task_prompt.clone(),
            content_rubric: self.content_rubric(),
            content_max: self.content_max,
            language_max: self.language_max,
        }
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn override_string(target: &mut String, name: &str) {
    if let Some(v) = env_string(name) {
        *target = v;
    }
}

fn override_parsed<T: std::str::FromStr>(
    target: &mut T,
    name: &str,
    expected_type: &str,
) -> Result<(), ConfigError> {
    if let Some(v) = env_string(name) {
        *target = v
            .trim()
            .parse()
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: name.to_string(),
                value: v.clone(),
                expected_type: expected_type.to_string(),
            })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_mode_falls_back_to_points_when_blank() {
        let config = Config {
            content_points_mode: ContentPointsMode::Text,
            content_points_text: "   ".to_string(),
            content_points: vec!["a".into(), "".into(), "b".into()],
            ..Default::default()
        };
        assert_eq!(
            config.content_rubric(),
            ContentRubric::Points(vec!["a".into(), "b".into()])
        );
    }

    #[test]
    fn test_text_mode() {
        let config = Config {
            content_points_mode: ContentPointsMode::Text,
            content_points_text: "覆盖三个要点".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.content_rubric(),
            ContentRubric::Text("覆盖三个要点".into())
        );
    }

    #[test]
    fn test_validate_requires_key_for_selected_provider() {
        let mut config = Config::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingApiKey { .. })
        ));

        config.gemini_api_key = "key".into();
        assert!(config.validate().is_ok());

        config.api_provider = ApiProvider::Poe;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency_and_too_many_points() {
        let mut config = Config {
            gemini_api_key: "key".into(),
            concurrency: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));

        config.concurrency = 2;
        config.content_points = (0..7).map(|i| format!("p{}", i)).collect();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            api_provider = "poe"
            poe_thinking_level = "high"
            concurrency = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.api_provider, ApiProvider::Poe);
        assert_eq!(config.poe_thinking_level, ThinkingLevel::High);
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.request_interval_ms, 500);
    }

    #[test]
    fn test_thinking_level_default() {
        assert!(ThinkingLevel::Low.is_default());
        assert!(!"high".parse::<ThinkingLevel>().unwrap().is_default());
        assert!("medium".parse::<ThinkingLevel>().is_err());
    }
}
