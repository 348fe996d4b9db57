use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// 已编码、可直接发送的图片
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedImage {
    pub mime_type: String,
    /// base64 编码后的图片数据
    pub data: String,
}

impl EncodedImage {
    pub fn jpeg(data: impl Into<String>) -> Self {
        Self {
            mime_type: "image/jpeg".to_string(),
            data: data.into(),
        }
    }

    /// data URI 形式（OpenAI 兼容接口使用）
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

// 图片数据可能有几 MB，Debug 只打印长度
impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedImage")
            .field("mime_type", &self.mime_type)
            .field("data_len", &self.data.len())
            .finish()
    }
}

/// 图片来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadSource {
    /// 已经编码好的图片
    Encoded(EncodedImage),
    /// 本地文件，由 worker 在评分前读取并编码
    File(PathBuf),
}

impl PayloadSource {
    /// 用于日志的简短描述
    pub fn describe(&self) -> String {
        match self {
            PayloadSource::Encoded(img) => format!("<{} {} bytes>", img.mime_type, img.data.len()),
            PayloadSource::File(path) => path.display().to_string(),
        }
    }
}

/// 一个评分任务
///
/// 入队后不可变；同一次运行中每个学号只有一个 Job。
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub identity: String,
    /// 学生姓名（只用于日志）
    pub name: Option<String>,
    pub payload: PayloadSource,
}

impl Job {
    pub fn new(identity: impl Into<String>, payload: PayloadSource) -> Self {
        Self {
            identity: identity.into(),
            name: None,
            payload,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}
