use crate::error::GradingError;
use std::time::Duration;

/// 创建带超时的 HTTP 客户端
///
/// 超时在传输层生效，超时错误会被归类为 `Transport` 并参与重试。
pub fn build_http_client(timeout_secs: u64) -> Result<reqwest::Client, GradingError> {
    let mut builder = reqwest::Client::builder();
    if timeout_secs > 0 {
        builder = builder.timeout(Duration::from_secs(timeout_secs));
    }
    builder.build().map_err(|e| GradingError::InvalidRequest {
        message: format!("无法创建 HTTP 客户端: {}", e),
    })
}
