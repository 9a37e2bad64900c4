pub mod config;
pub mod error;
pub mod jmdict;
pub mod output;
pub mod pipeline;
pub mod source;

use config::ConvertConfig;
use jmdict::EntryReader;
use output::CsvRowWriter;
use pipeline::ConvertStats;

/// 执行一次完整转换：打开数据源 → 流式筛选 → 原子写出
pub async fn convert(config: &ConvertConfig) -> error::Result<ConvertStats> {
    let opened = source::open_source(&config.source).await?;
    let location = opened.location;

    // 数据源就绪后才创建输出，失败时不会产生任何文件
    let mut writer = CsvRowWriter::create(&config.output)?;
    let stats = pipeline::convert_entries(EntryReader::new(opened.reader), &config.filter, &mut writer)
        .map_err(|err| source::explain_cache_failure(&location, err))?;
    writer.commit()?;

    // 下载内容完整解析后才写入缓存
    if let Some(pending) = opened.pending_cache {
        match pending.commit() {
            Ok(path) => tracing::info!("已缓存下载内容: {:?}", path),
            Err(err) => tracing::warn!("保存下载缓存失败: {}", err),
        }
    }

    Ok(stats)
}

pub async fn run() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt::init();

    let config = ConvertConfig::default();
    config.validate()?;
    tracing::info!(
        "高频标记: {:?}，用法标注策略: {:?}",
        config.filter.frequency_markers,
        config.filter.classification_policy
    );

    let stats = convert(&config).await?;
    tracing::info!(
        "转换完成: 共 {} 条，保留 {} 条，跳过 {} 条 (无表记 {}，无频度标记 {}，频度不足 {}，用法标注 {})",
        stats.total,
        stats.kept,
        stats.skipped(),
        stats.skipped_no_form,
        stats.skipped_no_priority,
        stats.skipped_not_frequent,
        stats.skipped_classification
    );

    Ok(())
}
