//! JMdict 词条读取与筛选
//!
//! ## 处理流程
//! 1. 流式读取 XML，逐个产出 `Entry`（不构建整棵树）
//! 2. 按频度标记判断是否保留
//! 3. 抽取首个表记、首个读音与全部译文，生成一行输出

mod filter;
mod parser;
mod types;

pub use filter::{
    extract, keep_decision, should_keep, ClassificationPolicy, FilterPolicy, SkipReason, WordRow,
    GLOSS_SEPARATOR,
};
pub use parser::EntryReader;
pub use types::{Classification, Entry, KanjiForm, Sense, CLASSIFICATION_KINDS};
