//! 图片载荷读取
//!
//! 解码、裁剪、压缩都在外部完成；这里只负责把文件读成 base64。

use crate::error::GradingError;
use crate::models::job::{EncodedImage, PayloadSource};
use base64::Engine as _;
use std::path::Path;
use tracing::debug;

/// 把图片来源解析成可发送的编码图片
pub async fn load_payload(source: &PayloadSource) -> Result<EncodedImage, GradingError> {
    match source {
        PayloadSource::Encoded(image) => Ok(image.clone()),
        PayloadSource::File(path) => {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| GradingError::Payload {
                    source_name: path.display().to_string(),
                    message: e.to_string(),
                })?;
            debug!("读取图片 {} ({} 字节)", path.display(), bytes.len());
            Ok(EncodedImage {
                mime_type: mime_type_for(path).to_string(),
                data: base64::engine::general_purpose::STANDARD.encode(bytes),
            })
        }
    }
}

fn mime_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_file_is_base64_encoded() {
        let path = std::env::temp_dir().join(format!("payload-{}.png", std::process::id()));
        tokio::fs::write(&path, b"hello").await.unwrap();

        let image = load_payload(&PayloadSource::File(path.clone())).await.unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data, "aGVsbG8=");

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_missing_file_is_payload_error() {
        let err = load_payload(&PayloadSource::File(PathBuf::from("/nonexistent/essay.jpg")))
            .await
            .unwrap_err();
        assert!(matches!(err, GradingError::Payload { .. }));
    }

    #[tokio::test]
    async fn test_encoded_passthrough() {
        let image = EncodedImage::jpeg("abcd");
        let loaded = load_payload(&PayloadSource::Encoded(image.clone())).await.unwrap();
        assert_eq!(loaded, image);
    }
}
