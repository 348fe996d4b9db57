//! 基础设施层
//!
//! 持有 HTTP 客户端和图片文件这类外部资源，只暴露能力，不认识学生和评分流程。

pub mod http;
pub mod image_payload;

pub use http::build_http_client;
pub use image_payload::load_payload;
