//! # Document 模块
//!
//! 整份剧本文档的分段，以及角色指南段的解析。
//!
//! ## 文档结构
//!
//! ```text
//! STORY_TITLE:
//! 标题
//!
//! FINAL_TEXT:
//! 正文（见 `script` 模块）
//!
//! CHARACTER_GUIDE:
//! 角色指南
//!
//! BACKGROUND_MUSIC:
//! 背景音乐说明
//! ```
//!
//! ## 模块结构
//!
//! - [`segment`]：按标题关键字分段
//! - [`guide`]：角色指南解析

pub mod guide;
pub mod segment;

pub use guide::{CharacterProfile, GuideAttribute, parse_character_guide};
pub use segment::{Section, SectionHeader, Sections, segment_document};

/// 元数据标题关键字（修复与缩进时会把这些行视为顶层）
///
/// 比 [`SectionHeader`] 多一个 `ENHANCED_TEXT`，上游导入流程会产生这一段。
pub const METADATA_HEADERS: [&str; 5] = [
    "STORY_TITLE",
    "FINAL_TEXT",
    "CHARACTER_GUIDE",
    "BACKGROUND_MUSIC",
    "ENHANCED_TEXT",
];

/// 该行是否以元数据标题开头（如 `FINAL_TEXT:`）
pub fn is_metadata_header(line: &str) -> bool {
    let line = line.trim_start();
    METADATA_HEADERS.iter().any(|header| {
        line.strip_prefix(header)
            .is_some_and(|rest| rest.starts_with(':'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_metadata_header() {
        assert!(is_metadata_header("FINAL_TEXT:"));
        assert!(is_metadata_header("  ENHANCED_TEXT: extra"));
        assert!(!is_metadata_header("FINAL_TEXT"));
        assert!(!is_metadata_header("final_text:"));
        assert!(!is_metadata_header("Narration: FINAL_TEXT:"));
    }
}
