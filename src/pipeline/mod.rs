// Pipeline 模块 - 批量转换
//
// 按源顺序逐条处理：筛选 → 抽取 → 写入；不重排、不去重。
// 任一错误立即中止整个批次。

mod types;

pub use types::*;

use crate::error::Result;
use crate::jmdict::{extract, keep_decision, Entry, FilterPolicy};
use crate::output::RowSink;

/// 每处理多少条输出一次进度
const PROGRESS_INTERVAL: usize = 50_000;

pub fn convert_entries<I, S>(entries: I, policy: &FilterPolicy, sink: &mut S) -> Result<ConvertStats>
where
    I: IntoIterator<Item = Result<Entry>>,
    S: RowSink + ?Sized,
{
    let mut stats = ConvertStats::default();

    for entry in entries {
        let entry = entry?;
        stats.total += 1;

        match keep_decision(&entry, policy) {
            Ok(()) => {
                let row = extract(&entry)?;
                sink.write_row(&row)?;
                stats.kept += 1;
            }
            Err(reason) => stats.record_skip(&reason),
        }

        if stats.total % PROGRESS_INTERVAL == 0 {
            tracing::info!("已处理 {} 条，保留 {} 条", stats.total, stats.kept);
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConvertError;
    use crate::jmdict::{EntryReader, KanjiForm, Sense, WordRow};

    fn entry(seq: u64, word: &str, priorities: &[&str], reading: Option<&str>) -> Entry {
        Entry {
            sequence: Some(seq),
            forms: vec![KanjiForm {
                text: word.to_string(),
                priorities: priorities.iter().map(|p| p.to_string()).collect(),
            }],
            readings: reading.into_iter().map(|r| r.to_string()).collect(),
            senses: vec![Sense {
                glosses: vec![format!("gloss {}", seq)],
            }],
            classifications: Vec::new(),
        }
    }

    #[test]
    fn test_rows_preserve_source_order() {
        let entries = vec![
            entry(1, "一", &["news1"], Some("いち")),
            entry(2, "二", &["spec2"], Some("に")),
            entry(3, "三", &["news2"], Some("さん")),
            entry(4, "四", &[], Some("よん")),
            entry(5, "五", &["news1"], Some("ご")),
        ];

        let mut rows: Vec<WordRow> = Vec::new();
        let stats =
            convert_entries(entries.into_iter().map(Ok), &FilterPolicy::default(), &mut rows)
                .unwrap();

        let words: Vec<&str> = rows.iter().map(|r| r.word.as_str()).collect();
        assert_eq!(words, vec!["一", "三", "五"]);
        assert_eq!(stats.total, 5);
        assert_eq!(stats.kept, 3);
        assert_eq!(stats.skipped_not_frequent, 1);
        assert_eq!(stats.skipped_no_priority, 1);
        assert_eq!(stats.skipped(), 2);
    }

    #[test]
    fn test_duplicates_are_kept() {
        let entries = vec![
            entry(1, "一", &["news1"], Some("いち")),
            entry(2, "一", &["news1"], Some("いち")),
        ];
        let mut rows: Vec<WordRow> = Vec::new();
        convert_entries(entries.into_iter().map(Ok), &FilterPolicy::default(), &mut rows).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_kept_entry_without_reading_aborts() {
        let entries = vec![
            entry(1, "一", &["news1"], Some("いち")),
            entry(2, "二", &["news1"], None),
            entry(3, "三", &["news1"], Some("さん")),
        ];
        let mut rows: Vec<WordRow> = Vec::new();
        let result =
            convert_entries(entries.into_iter().map(Ok), &FilterPolicy::default(), &mut rows);

        assert!(matches!(result, Err(ConvertError::MalformedEntry { .. })));
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_skipped_entry_without_reading_is_fine() {
        let entries = vec![entry(1, "一", &["ichi1"], None)];
        let mut rows: Vec<WordRow> = Vec::new();
        let stats =
            convert_entries(entries.into_iter().map(Ok), &FilterPolicy::default(), &mut rows)
                .unwrap();
        assert!(rows.is_empty());
        assert_eq!(stats.skipped_not_frequent, 1);
    }

    #[test]
    fn test_converts_xml_stream() {
        let xml = r#"<JMdict>
<entry><ent_seq>1</ent_seq>
<k_ele><keb>走る</keb><ke_pri>news1</ke_pri></k_ele>
<k_ele><keb>奔る</keb></k_ele>
<r_ele><reb>はしる</reb></r_ele>
<sense><gloss>to run</gloss><gloss>to dash</gloss></sense>
</entry>
<entry><ent_seq>2</ent_seq>
<k_ele><keb>仕様</keb><ke_pri>spec2</ke_pri></k_ele>
<r_ele><reb>しよう</reb></r_ele>
<sense><gloss>specification</gloss></sense>
</entry>
<entry><ent_seq>3</ent_seq>
<r_ele><reb>ああ</reb></r_ele>
<sense><gloss>ah!</gloss></sense>
</entry>
</JMdict>"#;

        let mut rows: Vec<WordRow> = Vec::new();
        let stats = convert_entries(
            EntryReader::new(xml.as_bytes()),
            &FilterPolicy::default(),
            &mut rows,
        )
        .unwrap();

        assert_eq!(
            rows,
            vec![WordRow {
                word: "走る".to_string(),
                normalized: "はしる".to_string(),
                glossary: "to run|to dash".to_string(),
            }]
        );
        assert_eq!(stats.total, 3);
        assert_eq!(stats.skipped_no_form, 1);
        assert_eq!(stats.skipped_not_frequent, 1);
    }

    #[test]
    fn test_parse_error_aborts_batch() {
        let xml = "<JMdict><entry><k_ele><keb>走る</keb></k_ele></wrong></JMdict>";
        let mut rows: Vec<WordRow> = Vec::new();
        let result = convert_entries(
            EntryReader::new(xml.as_bytes()),
            &FilterPolicy::default(),
            &mut rows,
        );
        assert!(matches!(result, Err(ConvertError::Parse { .. })));
    }
}
