//! JMdict 词条类型定义

/// 一个 `<entry>`：同一词头的表记、读音与释义
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    /// `<ent_seq>` 序号（仅用于诊断）
    pub sequence: Option<u64>,
    /// 汉字表记（`<k_ele>`），按源顺序
    pub forms: Vec<KanjiForm>,
    /// 读音（`<r_ele>/<reb>`），按源顺序
    pub readings: Vec<String>,
    /// 义项（`<sense>`），按源顺序
    pub senses: Vec<Sense>,
    /// 用法标注（词性、领域、语域等）
    pub classifications: Vec<Classification>,
}

/// 汉字表记
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KanjiForm {
    /// `<keb>` 文本
    pub text: String,
    /// `<ke_pri>` 频度标记（如 news1、ichi1、nf05）
    pub priorities: Vec<String>,
}

/// 义项
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sense {
    /// `<gloss>` 译文
    pub glosses: Vec<String>,
}

/// 用法标注
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// 元素名：field / misc / pos / re_inf / ke_inf / dial
    pub kind: String,
    /// 实体展开后的内容
    pub value: String,
}

/// 解析器识别的用法标注元素
pub const CLASSIFICATION_KINDS: &[&str] = &["field", "misc", "pos", "re_inf", "ke_inf", "dial"];

impl Entry {
    /// 诊断用标识：优先使用 ent_seq，其次首个表记
    pub fn label(&self) -> String {
        match (self.sequence, self.forms.first()) {
            (Some(seq), _) => seq.to_string(),
            (None, Some(form)) => form.text.clone(),
            (None, None) => "<unknown>".to_string(),
        }
    }

    /// 所有义项的译文，按源顺序展平
    pub fn glosses(&self) -> impl Iterator<Item = &str> {
        self.senses
            .iter()
            .flat_map(|sense| sense.glosses.iter().map(String::as_str))
    }

    /// 首个带有指定类别的用法标注
    pub fn find_classification<S: AsRef<str>>(&self, kinds: &[S]) -> Option<&Classification> {
        self.classifications
            .iter()
            .find(|c| kinds.iter().any(|kind| kind.as_ref() == c.kind))
    }
}
