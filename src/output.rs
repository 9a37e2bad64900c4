// 输出表格写入
//
// 先写入同目录临时文件，全部写完后原子替换目标文件；
// 中途失败或未提交时删除临时文件，下游不会读到截断的表格

use std::borrow::Cow;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::config::OutputConfig;
use crate::error::{ConvertError, Result};
use crate::jmdict::WordRow;
use crate::source::temp_path_for;

/// 表头
pub const HEADER: [&str; 3] = ["word", "normalized", "glossary"];

/// 行输出目标
pub trait RowSink {
    fn write_row(&mut self, row: &WordRow) -> Result<()>;
}

impl RowSink for Vec<WordRow> {
    fn write_row(&mut self, row: &WordRow) -> Result<()> {
        self.push(row.clone());
        Ok(())
    }
}

pub struct CsvRowWriter {
    writer: Option<csv::Writer<BufWriter<File>>>,
    tmp_path: PathBuf,
    path: PathBuf,
    escape: char,
    rows: usize,
}

impl CsvRowWriter {
    pub fn create(config: &OutputConfig) -> Result<Self> {
        let path = config.path.clone();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|err| ConvertError::write_failure(parent, err))?;
        }

        let tmp_path = temp_path_for(&path);
        let file =
            File::create(&tmp_path).map_err(|err| ConvertError::write_failure(&tmp_path, err))?;
        tracing::debug!("写入临时文件: {:?}", tmp_path);

        let mut writer = csv::WriterBuilder::new()
            .delimiter(b',')
            .quote_style(csv::QuoteStyle::Always)
            .quote(config.quote as u8)
            .double_quote(false)
            .escape(config.escape as u8)
            .from_writer(BufWriter::new(file));

        if config.include_header {
            if let Err(err) = writer.write_record(HEADER) {
                let _ = std::fs::remove_file(&tmp_path);
                return Err(ConvertError::write_failure(&tmp_path, err.into()));
            }
        }

        Ok(Self {
            writer: Some(writer),
            tmp_path,
            path,
            escape: config.escape,
            rows: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows_written(&self) -> usize {
        self.rows
    }

    /// 刷新、落盘并原子替换目标文件
    pub fn commit(mut self) -> Result<PathBuf> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| ConvertError::write_failure(&self.tmp_path, closed_error()))?;

        if let Err(err) = finish_and_replace(writer, &self.tmp_path, &self.path) {
            if let Err(cleanup_err) = std::fs::remove_file(&self.tmp_path) {
                tracing::warn!("提交失败后清理临时文件失败: {}", cleanup_err);
            }
            return Err(err);
        }

        tracing::info!("已写入 {} 行到 {:?}", self.rows, self.path);
        Ok(self.path.clone())
    }
}

fn finish_and_replace(
    writer: csv::Writer<BufWriter<File>>,
    tmp_path: &Path,
    path: &Path,
) -> Result<()> {
    let buffered = writer
        .into_inner()
        .map_err(|err| ConvertError::write_failure(tmp_path, err.into_error()))?;
    let file = buffered
        .into_inner()
        .map_err(|err| ConvertError::write_failure(tmp_path, err.into_error()))?;
    file.sync_all()
        .map_err(|err| ConvertError::write_failure(tmp_path, err))?;
    drop(file);

    std::fs::rename(tmp_path, path).map_err(|err| ConvertError::write_failure(path, err))
}

impl RowSink for CsvRowWriter {
    fn write_row(&mut self, row: &WordRow) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| ConvertError::write_failure(&self.tmp_path, closed_error()))?;
        let escape = self.escape;
        writer
            .write_record([
                escape_field(&row.word, escape).as_ref(),
                escape_field(&row.normalized, escape).as_ref(),
                escape_field(&row.glossary, escape).as_ref(),
            ])
            .map_err(|err| ConvertError::write_failure(&self.tmp_path, err.into()))?;
        self.rows += 1;
        Ok(())
    }
}

impl Drop for CsvRowWriter {
    fn drop(&mut self) {
        // 未提交：丢弃临时文件
        if self.writer.take().is_some() {
            if let Err(err) = std::fs::remove_file(&self.tmp_path) {
                tracing::warn!("清理临时文件失败 {:?}: {}", self.tmp_path, err);
            } else {
                tracing::warn!("输出未完成，已丢弃临时文件: {:?}", self.tmp_path);
            }
        }
    }
}

/// csv 只在引号前加转义符，字段中原有的转义符需要自行加倍，
/// 否则读回时会吞掉其后的字符（结尾的 `\` 甚至会吞掉收尾引号）
fn escape_field(field: &str, escape: char) -> Cow<'_, str> {
    if field.contains(escape) {
        Cow::Owned(field.replace(escape, &format!("{escape}{escape}")))
    } else {
        Cow::Borrowed(field)
    }
}

fn closed_error() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, "writer 已关闭")
}
