// Pipeline 核心类型定义
//
// - 转换统计 (ConvertStats)

use crate::jmdict::SkipReason;

/// 一次转换的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertStats {
    /// 读取的词条总数
    pub total: usize,
    /// 保留并输出的词条数
    pub kept: usize,
    /// 没有汉字表记
    pub skipped_no_form: usize,
    /// 首个表记没有频度标记
    pub skipped_no_priority: usize,
    /// 频度不够高
    pub skipped_not_frequent: usize,
    /// 带有被排除的用法标注
    pub skipped_classification: usize,
}

impl ConvertStats {
    pub fn record_skip(&mut self, reason: &SkipReason) {
        match reason {
            SkipReason::NoForm => self.skipped_no_form += 1,
            SkipReason::NoPriority => self.skipped_no_priority += 1,
            SkipReason::NotFrequent => self.skipped_not_frequent += 1,
            SkipReason::ExcludedClassification(_) => self.skipped_classification += 1,
        }
    }

    pub fn skipped(&self) -> usize {
        self.skipped_no_form
            + self.skipped_no_priority
            + self.skipped_not_frequent
            + self.skipped_classification
    }
}
