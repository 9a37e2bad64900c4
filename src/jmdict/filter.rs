//! 词条筛选与字段抽取
//!
//! 纯函数：同一词条总是得到同样的判断与输出

use crate::error::{ConvertError, Result};
use crate::jmdict::types::Entry;

/// 译文列表的连接符（不会与 CSV 的逗号转义冲突）
pub const GLOSS_SEPARATOR: char = '|';

/// 译文内部出现连接符时的替换字符
const GLOSS_SEPARATOR_REPLACEMENT: char = '/';

/// 用法标注的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassificationPolicy {
    /// 仅记录诊断日志，不影响保留判断（默认）
    #[default]
    Advisory,
    /// 带有排除类别标注的词条直接跳过
    Exclude,
}

/// 筛选策略
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPolicy {
    /// 高频标记：首个表记至少带有其中之一才保留
    pub frequency_markers: Vec<String>,
    /// 需要关注的用法标注类别
    pub excluded_classifications: Vec<String>,
    /// 对上述类别的处理方式
    pub classification_policy: ClassificationPolicy,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            // 每日新闻语料前两档，约 24000 个最常用词
            frequency_markers: vec!["news1".to_string(), "news2".to_string()],
            excluded_classifications: ["field", "misc", "pos", "re_inf"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            classification_policy: ClassificationPolicy::default(),
        }
    }
}

/// 跳过原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// 没有汉字表记
    NoForm,
    /// 首个表记没有任何频度标记
    NoPriority,
    /// 频度标记均不在高频标记之列
    NotFrequent,
    /// 带有被排除的用法标注
    ExcludedClassification(String),
}

/// 输出行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordRow {
    pub word: String,
    pub normalized: String,
    pub glossary: String,
}

impl WordRow {
    /// 拆分译文字段
    pub fn glosses(&self) -> Vec<&str> {
        if self.glossary.is_empty() {
            return Vec::new();
        }
        self.glossary.split(GLOSS_SEPARATOR).collect()
    }
}

/// 判断是否保留词条，并给出跳过原因
pub fn keep_decision(entry: &Entry, policy: &FilterPolicy) -> std::result::Result<(), SkipReason> {
    let form = entry.forms.first().ok_or(SkipReason::NoForm)?;

    if form.priorities.is_empty() {
        return Err(SkipReason::NoPriority);
    }

    let frequent = form
        .priorities
        .iter()
        .any(|tag| policy.frequency_markers.iter().any(|marker| marker == tag));
    if !frequent {
        return Err(SkipReason::NotFrequent);
    }

    if let Some(found) = entry.find_classification(policy.excluded_classifications.as_slice()) {
        match policy.classification_policy {
            ClassificationPolicy::Advisory => {
                tracing::debug!(
                    "词条 {} 带有标注 {}={}，仅提示",
                    entry.label(),
                    found.kind,
                    found.value
                );
            }
            ClassificationPolicy::Exclude => {
                tracing::debug!("词条 {} 带有标注 {}，跳过", entry.label(), found.kind);
                return Err(SkipReason::ExcludedClassification(found.kind.clone()));
            }
        }
    }

    Ok(())
}

/// 是否保留词条
pub fn should_keep(entry: &Entry, policy: &FilterPolicy) -> bool {
    keep_decision(entry, policy).is_ok()
}

/// 抽取输出行
///
/// 只取首个表记与首个读音；其余表记、读音被丢弃。
/// 调用前应先通过 `should_keep`，缺少表记或读音时立即失败。
pub fn extract(entry: &Entry) -> Result<WordRow> {
    let form = entry
        .forms
        .first()
        .ok_or_else(|| ConvertError::MalformedEntry {
            sequence: entry.label(),
            missing: "汉字表记 (keb)",
        })?;
    let reading = entry
        .readings
        .first()
        .ok_or_else(|| ConvertError::MalformedEntry {
            sequence: entry.label(),
            missing: "读音 (reb)",
        })?;

    let glossary = entry
        .glosses()
        .map(|gloss| {
            if gloss.contains(GLOSS_SEPARATOR) {
                tracing::warn!(
                    "词条 {} 的译文包含连接符 '{}'，已替换: {}",
                    entry.label(),
                    GLOSS_SEPARATOR,
                    gloss
                );
                gloss.replace(GLOSS_SEPARATOR, &GLOSS_SEPARATOR_REPLACEMENT.to_string())
            } else {
                gloss.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(&GLOSS_SEPARATOR.to_string());

    Ok(WordRow {
        word: form.text.clone(),
        normalized: reading.clone(),
        glossary,
    })
}
