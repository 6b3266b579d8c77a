//! # 文档分段
//!
//! 按 `STORY_TITLE:` / `FINAL_TEXT:` / `CHARACTER_GUIDE:` / `BACKGROUND_MUSIC:`
//! 四个标题把文档切成四段，并记录每段在原文中的行号。
//!
//! 每个标题取第一次出现的位置；段落内容延伸到其后出现的、顺序更靠后的
//! 任一标题之前（或文末）。缺失的标题不是错误，对应段落为空。

use serde::{Deserialize, Serialize};
use tracing::debug;

/// 段落标题
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SectionHeader {
    StoryTitle,
    FinalText,
    CharacterGuide,
    BackgroundMusic,
}

impl SectionHeader {
    /// 按文档顺序排列的全部标题
    pub const ALL: [Self; 4] = [
        Self::StoryTitle,
        Self::FinalText,
        Self::CharacterGuide,
        Self::BackgroundMusic,
    ];

    /// 带冒号的标题标记，如 `FINAL_TEXT:`
    pub fn marker(self) -> &'static str {
        match self {
            Self::StoryTitle => "STORY_TITLE:",
            Self::FinalText => "FINAL_TEXT:",
            Self::CharacterGuide => "CHARACTER_GUIDE:",
            Self::BackgroundMusic => "BACKGROUND_MUSIC:",
        }
    }

    /// 标题关键字（不含冒号）
    pub fn keyword(self) -> &'static str {
        let marker = self.marker();
        &marker[..marker.len() - 1]
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for SectionHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

/// 一个段落
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section<'a> {
    /// 标题所在行（从 1 开始）
    pub header_line: usize,
    /// 去掉首尾空白后的内容
    pub content: &'a str,
    /// 内容第一个字符所在行；内容为空时等于 `header_line`
    pub content_line: usize,
}

/// 分段结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sections<'a> {
    sections: [Option<Section<'a>>; 4],
}

impl<'a> Sections<'a> {
    /// 获取指定段落（标题缺失时返回 `None`）
    pub fn get(&self, header: SectionHeader) -> Option<&Section<'a>> {
        self.sections[header.index()].as_ref()
    }

    /// 段落内容（标题缺失时为空字符串）
    pub fn content(&self, header: SectionHeader) -> &'a str {
        self.sections[header.index()].map_or("", |s| s.content)
    }

    /// 标题所在行
    pub fn header_line(&self, header: SectionHeader) -> Option<usize> {
        self.get(header).map(|s| s.header_line)
    }

    /// 是否包含指定标题
    pub fn has(&self, header: SectionHeader) -> bool {
        self.get(header).is_some()
    }
}

/// 计算字节偏移所在的行号（从 1 开始）
pub fn line_of(text: &str, offset: usize) -> usize {
    text.as_bytes()[..offset.min(text.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        + 1
}

/// 分段
pub fn segment_document(text: &str) -> Sections<'_> {
    let mut result = Sections::default();

    for (index, header) in SectionHeader::ALL.into_iter().enumerate() {
        let Some(start) = text.find(header.marker()) else {
            continue;
        };
        let body_start = start + header.marker().len();
        let body = &text[body_start..];

        let body_end = SectionHeader::ALL[index + 1..]
            .iter()
            .filter_map(|later| body.find(later.marker()))
            .min()
            .unwrap_or(body.len());
        let raw = &body[..body_end];

        let content = raw.trim();
        let header_line = line_of(text, start);
        let content_line = if content.is_empty() {
            header_line
        } else {
            let lead = raw.len() - raw.trim_start().len();
            line_of(text, body_start + lead)
        };

        result.sections[index] = Some(Section {
            header_line,
            content,
            content_line,
        });
    }

    debug!(
        title = result.has(SectionHeader::StoryTitle),
        script = result.has(SectionHeader::FinalText),
        guide = result.has(SectionHeader::CharacterGuide),
        music = result.has(SectionHeader::BackgroundMusic),
        "文档分段完成"
    );

    result
}
