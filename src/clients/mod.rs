//! 评分 API 客户端
//!
//! 调度器只依赖 `GradingClient` / `GradingClientFactory` 两个 trait，
//! 具体用 Gemini 还是 Poe 在构建工厂时决定一次。

pub mod gemini_client;
pub mod http;
pub mod poe_client;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{ApiProvider, Config, GradingConfig, ThinkingLevel};
use crate::error::GradingError;
use crate::infrastructure::build_http_client;
use crate::models::api_log::LogSink;
use crate::models::grading::GradingResult;
use crate::models::job::EncodedImage;

pub use gemini_client::GeminiClient;
pub use http::{classify_http_failure, classify_transport_error};
pub use poe_client::PoeClient;

/// 评分客户端：一次调用评一张作文图片
///
/// 每次调用恰好产生一条 request 日志和一条 response 日志（配置了日志回调时）。
#[async_trait]
pub trait GradingClient: Send + Sync {
    fn provider(&self) -> ApiProvider;

    async fn grade(
        &self,
        image: &EncodedImage,
        config: &GradingConfig,
    ) -> Result<GradingResult, GradingError>;
}

/// 为每个任务创建客户端，日志回调已经带上学生信息
pub trait GradingClientFactory: Send + Sync {
    fn create(&self, log_sink: Option<LogSink>) -> Arc<dyn GradingClient>;
}

#[derive(Clone, Debug)]
enum Backend {
    Gemini {
        api_key: String,
        base_url: String,
        model: String,
    },
    Poe {
        api_key: String,
        base_url: String,
        model: String,
        thinking_level: ThinkingLevel,
    },
}

/// 基于 HTTP 的客户端工厂，所有客户端共享一个连接池
pub struct HttpClientFactory {
    http: reqwest::Client,
    backend: Backend,
}

impl HttpClientFactory {
    pub fn from_config(config: &Config) -> Result<Self, GradingError> {
        let backend = match config.api_provider {
            ApiProvider::Gemini => Backend::Gemini {
                api_key: config.gemini_api_key.clone(),
                base_url: config.gemini_base_url.clone(),
                model: config.gemini_model.clone(),
            },
            ApiProvider::Poe => Backend::Poe {
                api_key: config.poe_api_key.clone(),
                base_url: config.poe_base_url.clone(),
                model: config.poe_model.clone(),
                thinking_level: config.poe_thinking_level,
            },
        };
        Ok(Self {
            http: build_http_client(config.request_timeout_secs)?,
            backend,
        })
    }

    pub fn provider(&self) -> ApiProvider {
        match self.backend {
            Backend::Gemini { .. } => ApiProvider::Gemini,
            Backend::Poe { .. } => ApiProvider::Poe,
        }
    }
}

impl GradingClientFactory for HttpClientFactory {
    fn create(&self, log_sink: Option<LogSink>) -> Arc<dyn GradingClient> {
        match &self.backend {
            Backend::Gemini {
                api_key,
                base_url,
                model,
            } => Arc::new(
                GeminiClient::new(self.http.clone(), api_key, base_url, model)
                    .with_log_sink(log_sink),
            ),
            Backend::Poe {
                api_key,
                base_url,
                model,
                thinking_level,
            } => Arc::new(
                PoeClient::new(self.http.clone(), api_key, base_url, model)
                    .with_thinking_level(*thinking_level)
                    .with_log_sink(log_sink),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_picks_backend_from_config() {
        let mut config = Config::default();
        config.api_provider = ApiProvider::Poe;
        let factory = HttpClientFactory::from_config(&config).unwrap();
        assert_eq!(factory.provider(), ApiProvider::Poe);
        assert_eq!(factory.create(None).provider(), ApiProvider::Poe);

        config.api_provider = ApiProvider::Gemini;
        let factory = HttpClientFactory::from_config(&config).unwrap();
        assert_eq!(factory.create(None).provider(), ApiProvider::Gemini);
    }
}
