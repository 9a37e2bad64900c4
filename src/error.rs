// 转换错误类型
//
// 库内部统一使用 ConvertError，应用入口（run/main）再转换为 anyhow

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// 保留的词条缺少必需字段（汉字表记或读音）
    #[error("词条 {sequence} 缺少 {missing}")]
    MalformedEntry {
        sequence: String,
        missing: &'static str,
    },

    /// 本地读取或远程下载失败
    #[error("数据源不可用 ({source_name}): {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// XML 格式不合法
    #[error("XML 解析失败 (字节位置 {position}): {message}")]
    Parse { position: u64, message: String },

    /// 输出文件无法创建、写入或替换
    #[error("写入输出失败 ({path:?}): {source}")]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConvertError {
    pub fn source_unavailable(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn write_failure(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::WriteFailure {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;
