//! JMdict 流式读取器
//!
//! 基于 quick-xml 的事件流逐个产出 `Entry`，内存占用与词典大小无关。
//! DOCTYPE 内部子集中的 `<!ENTITY name "value">` 会被收集，用于展开
//! `<pos>&n;</pos>` 这类实体引用。

use std::collections::HashMap;
use std::io::BufRead;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{ConvertError, Result};
use crate::jmdict::types::{Classification, Entry, KanjiForm, Sense, CLASSIFICATION_KINDS};

/// 读取器产出的单步事件（已脱离缓冲区借用）
enum Step {
    Open(Vec<u8>),
    Close(Vec<u8>),
    Text(String),
    Eof,
    Skip,
}

/// JMdict 词条迭代器
pub struct EntryReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    entities: HashMap<String, String>,
    /// 当前元素的文本
    text: String,
    entry: Option<Entry>,
    form: Option<KanjiForm>,
    reading: Option<String>,
    sense: Option<Sense>,
    finished: bool,
}

impl<R: BufRead> EntryReader<R> {
    pub fn new(source: R) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.config_mut().trim_text(true);

        Self {
            reader,
            buf: Vec::new(),
            entities: HashMap::new(),
            text: String::new(),
            entry: None,
            form: None,
            reading: None,
            sense: None,
            finished: false,
        }
    }

    fn next_entry(&mut self) -> Result<Option<Entry>> {
        loop {
            let step = read_step(&mut self.reader, &mut self.buf, &mut self.entities)?;
            match step {
                Step::Open(name) => self.open(&name),
                Step::Close(name) => {
                    if let Some(entry) = self.close(&name) {
                        return Ok(Some(entry));
                    }
                }
                Step::Text(text) => self.text.push_str(&text),
                Step::Eof => {
                    if self.entry.is_some() {
                        return Err(ConvertError::Parse {
                            position: self.reader.buffer_position() as u64,
                            message: "文件在 <entry> 内部结束".to_string(),
                        });
                    }
                    return Ok(None);
                }
                Step::Skip => {}
            }
        }
    }

    fn open(&mut self, name: &[u8]) {
        self.text.clear();
        match name {
            b"entry" => self.entry = Some(Entry::default()),
            b"k_ele" => self.form = Some(KanjiForm::default()),
            b"r_ele" => self.reading = None,
            b"sense" => self.sense = Some(Sense::default()),
            _ => {}
        }
    }

    fn close(&mut self, name: &[u8]) -> Option<Entry> {
        let text = std::mem::take(&mut self.text);
        let entry = self.entry.as_mut()?;

        match name {
            b"ent_seq" => entry.sequence = text.parse().ok(),
            b"keb" => {
                if let Some(form) = self.form.as_mut() {
                    form.text = text;
                }
            }
            b"ke_pri" => {
                if let Some(form) = self.form.as_mut() {
                    form.priorities.push(text);
                }
            }
            b"k_ele" => {
                // 没有 keb 的表记不计入
                if let Some(form) = self.form.take().filter(|f| !f.text.is_empty()) {
                    entry.forms.push(form);
                }
            }
            b"reb" => self.reading = Some(text),
            b"r_ele" => {
                if let Some(reading) = self.reading.take().filter(|r| !r.is_empty()) {
                    entry.readings.push(reading);
                }
            }
            b"gloss" => {
                if let Some(sense) = self.sense.as_mut() {
                    if !text.is_empty() {
                        sense.glosses.push(text);
                    }
                }
            }
            b"sense" => {
                if let Some(sense) = self.sense.take() {
                    entry.senses.push(sense);
                }
            }
            b"entry" => return self.entry.take(),
            other => {
                if let Some(kind) = CLASSIFICATION_KINDS
                    .iter()
                    .find(|kind| kind.as_bytes() == other)
                {
                    entry.classifications.push(Classification {
                        kind: kind.to_string(),
                        value: text,
                    });
                }
            }
        }
        None
    }
}

impl<R: BufRead> Iterator for EntryReader<R> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(err) => {
                // 出错后不再继续读取
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

fn read_step<R: BufRead>(
    reader: &mut Reader<R>,
    buf: &mut Vec<u8>,
    entities: &mut HashMap<String, String>,
) -> Result<Step> {
    buf.clear();
    let event = match reader.read_event_into(buf) {
        Ok(event) => event,
        // 底层读取失败（如压缩流损坏）不是 XML 格式问题
        Err(quick_xml::Error::Io(err)) => {
            return Err(ConvertError::source_unavailable("输入流", err))
        }
        Err(err) => {
            return Err(ConvertError::Parse {
                position: reader.error_position() as u64,
                message: err.to_string(),
            })
        }
    };
    let position = reader.buffer_position() as u64;

    let step = match event {
        Event::Start(e) => Step::Open(e.name().as_ref().to_vec()),
        Event::End(e) => Step::Close(e.name().as_ref().to_vec()),
        Event::Text(e) => {
            let raw = utf8(e.into_inner().into_owned(), position)?;
            let expanded = expand_entities(&raw, entities).map_err(|message| {
                ConvertError::Parse { position, message }
            })?;
            Step::Text(expanded)
        }
        Event::CData(e) => Step::Text(utf8(e.into_inner().into_owned(), position)?),
        Event::DocType(e) => {
            let raw = utf8(e.into_inner().into_owned(), position)?;
            let declared = parse_entity_declarations(&raw);
            tracing::debug!("从 DOCTYPE 读取到 {} 个实体", declared.len());
            entities.extend(declared);
            Step::Skip
        }
        Event::Eof => Step::Eof,
        _ => Step::Skip,
    };
    Ok(step)
}

fn utf8(bytes: Vec<u8>, position: u64) -> Result<String> {
    String::from_utf8(bytes).map_err(|err| ConvertError::Parse {
        position,
        message: format!("文本编码不合法: {}", err),
    })
}

/// 从 DOCTYPE 内部子集提取通用实体声明
///
/// 参数实体（`<!ENTITY % ...>`）被忽略。
pub(crate) fn parse_entity_declarations(doctype: &str) -> HashMap<String, String> {
    let mut entities = HashMap::new();
    let mut rest = doctype;

    while let Some(start) = rest.find("<!ENTITY") {
        rest = rest[start + "<!ENTITY".len()..].trim_start();
        if rest.starts_with('%') {
            continue;
        }

        let name_end = rest
            .find(|c: char| c.is_whitespace())
            .unwrap_or(rest.len());
        let name = &rest[..name_end];
        rest = rest[name_end..].trim_start();

        let Some(quote) = rest.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            continue;
        };
        let Some(value_len) = rest[1..].find(quote) else {
            break;
        };
        let value = &rest[1..1 + value_len];
        if !name.is_empty() {
            entities.insert(name.to_string(), value.to_string());
        }
        rest = &rest[1 + value_len + 1..];
    }

    entities
}

/// 展开文本中的实体引用
///
/// 依次尝试：数字字符引用、XML 预定义实体、DOCTYPE 声明的实体；
/// 未声明的实体展开为其名称本身。
pub(crate) fn expand_entities(
    raw: &str,
    entities: &HashMap<String, String>,
) -> std::result::Result<String, String> {
    if !raw.contains('&') {
        return Ok(raw.to_string());
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let semi = after
            .find(';')
            .ok_or_else(|| format!("实体引用未结束: {}", rest))?;
        let name = &after[..semi];

        if let Some(code) = name.strip_prefix('#') {
            let parsed = match code.strip_prefix('x') {
                Some(hex) => u32::from_str_radix(hex, 16),
                None => code.parse::<u32>(),
            };
            let ch = parsed
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| format!("非法字符引用: &{};", name))?;
            out.push(ch);
        } else {
            match name {
                "lt" => out.push('<'),
                "gt" => out.push('>'),
                "amp" => out.push('&'),
                "apos" => out.push('\''),
                "quot" => out.push('"'),
                _ => match entities.get(name) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(name),
                },
            }
        }
        rest = &after[semi + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE JMdict [
<!ELEMENT JMdict (entry*)>
<!ENTITY v5r "Godan verb with 'ru' ending">
<!ENTITY n "noun (common) (futsuumeishi)">
<!ENTITY % local.test "IGNORE">
]>
<JMdict>
<entry>
<ent_seq>1596340</ent_seq>
<k_ele>
<keb>走る</keb>
<ke_pri>ichi1</ke_pri>
<ke_pri>news1</ke_pri>
</k_ele>
<k_ele>
<keb>奔る</keb>
</k_ele>
<r_ele>
<reb>はしる</reb>
<re_pri>ichi1</re_pri>
</r_ele>
<sense>
<pos>&v5r;</pos>
<gloss>to run</gloss>
<gloss>to dash</gloss>
</sense>
<sense>
<gloss>to travel (of a vehicle)</gloss>
</sense>
</entry>
<entry>
<ent_seq>1000000</ent_seq>
<r_ele>
<reb>ヽ</reb>
</r_ele>
<sense>
<pos>&n;</pos>
<gloss>repetition mark in katakana</gloss>
</sense>
</entry>
</JMdict>
"#;

    fn read_all(xml: &str) -> Vec<Result<Entry>> {
        EntryReader::new(xml.as_bytes()).collect()
    }

    #[test]
    fn test_reads_entries_in_order() {
        let entries: Vec<Entry> = read_all(SAMPLE).into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(entries.len(), 2);

        let first = &entries[0];
        assert_eq!(first.sequence, Some(1596340));
        assert_eq!(first.forms.len(), 2);
        assert_eq!(first.forms[0].text, "走る");
        assert_eq!(first.forms[0].priorities, vec!["ichi1", "news1"]);
        assert!(first.forms[1].priorities.is_empty());
        assert_eq!(first.readings, vec!["はしる"]);
        assert_eq!(first.senses.len(), 2);
        assert_eq!(first.senses[0].glosses, vec!["to run", "to dash"]);
        assert_eq!(first.senses[1].glosses, vec!["to travel (of a vehicle)"]);

        let second = &entries[1];
        assert_eq!(second.sequence, Some(1000000));
        assert!(second.forms.is_empty());
        assert_eq!(second.readings, vec!["ヽ"]);
    }

    #[test]
    fn test_classifications_use_declared_entities() {
        let entries: Vec<Entry> = read_all(SAMPLE).into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(
            entries[0].classifications,
            vec![Classification {
                kind: "pos".to_string(),
                value: "Godan verb with 'ru' ending".to_string(),
            }]
        );
        assert_eq!(entries[1].classifications[0].value, "noun (common) (futsuumeishi)");
    }

    #[test]
    fn test_classifications_collected_from_nested_elements() {
        // JMdict 的标注都在 k_ele / r_ele / sense 之下，而不是 entry 的直接子元素
        let xml = "<JMdict><entry>\
                   <k_ele><keb>鮨</keb><ke_inf>rK</ke_inf><ke_pri>news1</ke_pri></k_ele>\
                   <r_ele><reb>すし</reb><re_inf>ok</re_inf></r_ele>\
                   <sense><pos>n</pos><misc>uk</misc><gloss>sushi</gloss></sense>\
                   </entry></JMdict>";
        let entries = read_all(xml);
        let kinds: Vec<&str> = entries[0]
            .as_ref()
            .unwrap()
            .classifications
            .iter()
            .map(|c| c.kind.as_str())
            .collect();
        assert_eq!(kinds, vec!["ke_inf", "re_inf", "pos", "misc"]);
    }

    #[test]
    fn test_broken_stream_is_source_error() {
        struct BrokenStream;

        impl std::io::Read for BrokenStream {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "corrupt deflate stream",
                ))
            }
        }

        let mut reader = EntryReader::new(std::io::BufReader::new(BrokenStream));
        assert!(matches!(
            reader.next(),
            Some(Err(ConvertError::SourceUnavailable { .. }))
        ));
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_k_ele_without_keb_is_dropped() {
        let xml = "<JMdict><entry><k_ele><ke_pri>news1</ke_pri></k_ele>\
                   <r_ele><reb>あ</reb></r_ele></entry></JMdict>";
        let entries = read_all(xml);
        let entry = entries[0].as_ref().unwrap();
        assert!(entry.forms.is_empty());
        assert_eq!(entry.readings, vec!["あ"]);
    }

    #[test]
    fn test_malformed_xml_is_parse_error() {
        let xml = "<JMdict><entry><k_ele><keb>走る</k_ele></entry></JMdict>";
        let results = read_all(xml);
        assert!(matches!(results.last(), Some(Err(ConvertError::Parse { .. }))));
    }

    #[test]
    fn test_truncated_document_is_parse_error() {
        let xml = "<JMdict><entry><k_ele><keb>走る</keb></k_ele>";
        let results = read_all(xml);
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(ConvertError::Parse { .. })));
    }

    #[test]
    fn test_iterator_stops_after_error() {
        let xml = "<JMdict><entry></wrong></JMdict>";
        let mut reader = EntryReader::new(xml.as_bytes());
        assert!(matches!(reader.next(), Some(Err(_))));
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_parse_entity_declarations() {
        let entities = parse_entity_declarations(
            r#"JMdict [ <!ENTITY n "noun"> <!ENTITY % skip "x"> <!ENTITY adj-i 'adjective (keiyoushi)'> ]"#,
        );
        assert_eq!(entities.len(), 2);
        assert_eq!(entities["n"], "noun");
        assert_eq!(entities["adj-i"], "adjective (keiyoushi)");
    }

    #[test]
    fn test_expand_entities() {
        let mut entities = HashMap::new();
        entities.insert("n".to_string(), "noun".to_string());

        assert_eq!(expand_entities("plain", &entities).unwrap(), "plain");
        assert_eq!(expand_entities("&n;", &entities).unwrap(), "noun");
        assert_eq!(
            expand_entities("a &amp; b &lt;c&gt; &quot;d&quot; &apos;", &entities).unwrap(),
            "a & b <c> \"d\" '"
        );
        assert_eq!(expand_entities("&#x8D70;&#12427;", &entities).unwrap(), "走る");
        // 未声明实体保留名称
        assert_eq!(expand_entities("&uk;", &entities).unwrap(), "uk");
        assert!(expand_entities("broken & text", &entities).is_err());
    }
}
