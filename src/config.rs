// src/config.rs

use std::path::PathBuf;

use crate::jmdict::FilterPolicy;

// ============================================================================
// 固定参数
// ============================================================================

/// JMdict 英文版下载地址（gzip）
pub const DEFAULT_DOWNLOAD_URL: &str = "http://ftp.edrdg.org/pub/Nihongo/JMdict_e.gz";

/// 下载超时
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// 压缩包大小上限
pub const DEFAULT_MAX_DOWNLOAD_BYTES: u64 = 256 * 1024 * 1024;

// ============================================================================
// 输出配置
// ============================================================================

/// 输出表格格式
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    /// 输出文件路径
    pub path: PathBuf,
    /// 是否写入表头（word,normalized,glossary）
    pub include_header: bool,
    /// 字段引号字符
    pub quote: char,
    /// 转义字符
    pub escape: char,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("words.csv"),
            include_header: false,
            quote: '\'',
            escape: '\\',
        }
    }
}

impl OutputConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.path.as_os_str().is_empty() {
            anyhow::bail!("输出路径不能为空");
        }
        for (name, c) in [("quote", self.quote), ("escape", self.escape)] {
            if !c.is_ascii() {
                anyhow::bail!("{} 必须是 ASCII 字符: {:?}", name, c);
            }
            if c == ',' || c == crate::jmdict::GLOSS_SEPARATOR {
                anyhow::bail!("{} 不能与分隔符相同: {:?}", name, c);
            }
        }
        if self.quote == self.escape {
            anyhow::bail!("quote 与 escape 不能相同");
        }
        Ok(())
    }
}

// ============================================================================
// 数据源配置
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    /// 本地词典文件（XML 或 gzip），存在时优先使用
    pub input_path: PathBuf,
    /// 下载缓存路径
    pub download_cache_path: PathBuf,
    /// 是否缓存下载的压缩包
    pub cache_download: bool,
    /// 远程地址
    pub download_url: String,
    pub request_timeout_secs: u64,
    pub max_download_bytes: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("JMdict_e"),
            download_cache_path: PathBuf::from("JMdict_e.gz"),
            cache_download: true,
            download_url: DEFAULT_DOWNLOAD_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_download_bytes: DEFAULT_MAX_DOWNLOAD_BYTES,
        }
    }
}

// ============================================================================
// 总配置
// ============================================================================

/// 运行参数全部取固定值；库调用方可以自行构造
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertConfig {
    pub source: SourceConfig,
    pub filter: FilterPolicy,
    pub output: OutputConfig,
}

impl ConvertConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.filter.frequency_markers.is_empty() {
            anyhow::bail!("frequency_markers 不能为空");
        }
        if self.source.download_url.trim().is_empty() {
            anyhow::bail!("download_url 不能为空");
        }
        if self.source.max_download_bytes == 0 {
            anyhow::bail!("max_download_bytes 必须大于 0");
        }
        self.output.validate()
    }
}
