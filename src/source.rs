use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use flate2::read::GzDecoder;
use futures_util::StreamExt;

use crate::config::SourceConfig;
use crate::error::{ConvertError, Result};

/// gzip 魔数
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// 词典数据来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// 本地文件（XML 或 gzip）
    Local(PathBuf),
    /// 之前下载并缓存的压缩包
    Cache(PathBuf),
    /// 远程压缩包
    Remote(String),
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceLocation::Local(path) => write!(f, "{}", path.display()),
            SourceLocation::Cache(path) => write!(f, "{} (缓存)", path.display()),
            SourceLocation::Remote(url) => write!(f, "{}", url),
        }
    }
}

/// 已打开的数据源
pub struct OpenedSource {
    pub location: SourceLocation,
    /// 必要时已解压的字节流
    pub reader: Box<dyn BufRead>,
    /// 下载内容的待提交缓存，转换成功后才替换缓存文件
    pub pending_cache: Option<PendingCache>,
}

/// 选择数据源：本地文件 → 下载缓存 → 远程地址
pub fn resolve_source(config: &SourceConfig) -> SourceLocation {
    if config.input_path.is_file() {
        return SourceLocation::Local(config.input_path.clone());
    }
    if config.download_cache_path.is_file() {
        return SourceLocation::Cache(config.download_cache_path.clone());
    }
    SourceLocation::Remote(config.download_url.clone())
}

pub async fn open_source(config: &SourceConfig) -> Result<OpenedSource> {
    let location = resolve_source(config);
    tracing::info!("词典数据源: {}", location);

    match &location {
        SourceLocation::Local(path) | SourceLocation::Cache(path) => {
            let reader = open_local(path)?;
            Ok(OpenedSource {
                location,
                reader,
                pending_cache: None,
            })
        }
        SourceLocation::Remote(url) => {
            let bytes = fetch_remote(url, config).await?;
            let pending_cache = if config.cache_download {
                // 缓存失败不影响本次转换
                match stage_cache(&config.download_cache_path, &bytes) {
                    Ok(pending) => Some(pending),
                    Err(err) => {
                        tracing::warn!("不缓存本次下载: {}", err);
                        None
                    }
                }
            } else {
                None
            };
            let reader = open_reader(Cursor::new(bytes), url)?;
            Ok(OpenedSource {
                location,
                reader,
                pending_cache,
            })
        }
    }
}

/// 缓存文件读取失败时提示删除缓存
///
/// 否则后续每次运行都会优先选中同一个损坏的缓存
pub fn explain_cache_failure(location: &SourceLocation, err: ConvertError) -> ConvertError {
    match (location, err) {
        (SourceLocation::Cache(path), err @ (ConvertError::Parse { .. }
        | ConvertError::SourceUnavailable { .. })) => ConvertError::SourceUnavailable {
            source_name: path.display().to_string(),
            reason: format!(
                "{}；缓存可能已损坏，请删除 {} 后重新下载",
                err,
                path.display()
            ),
        },
        (_, err) => err,
    }
}

pub fn open_local(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path)
        .map_err(|err| ConvertError::source_unavailable(path.display().to_string(), err))?;
    open_reader(file, &path.display().to_string())
}

/// 按魔数识别 gzip，必要时包一层解压
pub fn open_reader<R: Read + 'static>(source: R, name: &str) -> Result<Box<dyn BufRead>> {
    let mut reader = BufReader::new(source);
    let head = reader
        .fill_buf()
        .map_err(|err| ConvertError::source_unavailable(name, err))?;

    if head.starts_with(&GZIP_MAGIC) {
        tracing::debug!("{} 为 gzip 格式", name);
        Ok(Box::new(BufReader::new(GzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}

pub async fn fetch_remote(url: &str, config: &SourceConfig) -> Result<Vec<u8>> {
    let client = build_http_client(config.request_timeout_secs)
        .map_err(|err| ConvertError::source_unavailable(url, err))?;

    tracing::info!("开始下载词典: {}", url);
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|err| ConvertError::source_unavailable(url, err))?;

    if !response.status().is_success() {
        let status = response.status();
        return Err(ConvertError::source_unavailable(url, format!("HTTP {}", status)));
    }

    let bytes = read_response_with_limit(response, config.max_download_bytes)
        .await
        .map_err(|err| ConvertError::source_unavailable(url, err))?;
    tracing::info!("下载完成: {} bytes", bytes.len());
    Ok(bytes)
}

/// 每次下载单独构建，超时取当次配置
fn build_http_client(timeout_secs: u64) -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?;
    Ok(client)
}

pub(crate) fn validate_response_content_length(
    content_length: Option<u64>,
    max_bytes: u64,
) -> anyhow::Result<()> {
    if let Some(content_length) = content_length {
        if content_length > max_bytes {
            anyhow::bail!("内容过大: {} > {} bytes", content_length, max_bytes);
        }
    }
    Ok(())
}

pub(crate) fn append_chunk_with_limit(
    buffer: &mut Vec<u8>,
    chunk: &[u8],
    max_bytes: u64,
) -> anyhow::Result<()> {
    if (buffer.len() as u64).saturating_add(chunk.len() as u64) > max_bytes {
        anyhow::bail!("内容超过 {} bytes 上限", max_bytes);
    }
    buffer.extend_from_slice(chunk);
    Ok(())
}

async fn read_response_with_limit(
    response: reqwest::Response,
    max_bytes: u64,
) -> anyhow::Result<Vec<u8>> {
    validate_response_content_length(response.content_length(), max_bytes)?;

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result?;
        append_chunk_with_limit(&mut bytes, &chunk, max_bytes)?;
    }

    if bytes.is_empty() {
        anyhow::bail!("响应内容为空");
    }
    Ok(bytes)
}

/// 临时文件路径：与目标同目录，保证 rename 不跨文件系统
pub(crate) fn temp_path_for(path: &Path) -> PathBuf {
    let unique_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".tmp.{}", unique_suffix));
    path.with_file_name(name)
}

/// 已写入临时文件、尚未替换目标的缓存
///
/// `commit` 之前被丢弃时删除临时文件
pub struct PendingCache {
    tmp_path: Option<PathBuf>,
    path: PathBuf,
}

impl PendingCache {
    pub fn commit(mut self) -> anyhow::Result<PathBuf> {
        let tmp_path = self
            .tmp_path
            .take()
            .ok_or_else(|| anyhow::anyhow!("缓存已提交"))?;

        if let Err(err) = std::fs::rename(&tmp_path, &self.path) {
            if let Err(cleanup_err) = std::fs::remove_file(&tmp_path) {
                tracing::warn!("替换缓存失败后清理临时文件失败: {}", cleanup_err);
            }
            return Err(err.into());
        }
        Ok(self.path.clone())
    }
}

impl Drop for PendingCache {
    fn drop(&mut self) {
        if let Some(tmp_path) = self.tmp_path.take() {
            if let Err(err) = std::fs::remove_file(&tmp_path) {
                tracing::warn!("清理缓存临时文件失败 {:?}: {}", tmp_path, err);
            }
        }
    }
}

/// 校验并暂存下载内容；只接受 gzip
pub(crate) fn stage_cache(path: &Path, content: &[u8]) -> anyhow::Result<PendingCache> {
    if !content.starts_with(&GZIP_MAGIC) {
        anyhow::bail!("下载内容不是 gzip 格式");
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = temp_path_for(path);
    if let Err(err) = write_and_sync(&tmp_path, content) {
        if tmp_path.exists() {
            if let Err(cleanup_err) = std::fs::remove_file(&tmp_path) {
                tracing::warn!("写入缓存失败后清理临时文件失败: {}", cleanup_err);
            }
        }
        return Err(err.into());
    }

    Ok(PendingCache {
        tmp_path: Some(tmp_path),
        path: path.to_path_buf(),
    })
}

fn write_and_sync(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content)?;
    file.sync_all()
}
