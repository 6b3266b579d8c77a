//! # Drama Core
//!
//! 音频剧剧本 DSL 的解析与修复库。
//!
//! ## 架构概述
//!
//! `drama-core` 是纯逻辑核心，不依赖 IO。整份文档的处理流程：
//!
//! ```text
//! 文档文本
//!   │ (可选) RepairEngine::repair   修复格式混乱的文本
//!   ▼
//! segment_document                  按标题拆成四段
//!   ├── FINAL_TEXT      → ScriptParser → Vec<ScriptNode>
//!   ├── CHARACTER_GUIDE → parse_character_guide → Vec<CharacterProfile>
//!   └── STORY_TITLE / BACKGROUND_MUSIC 原文保留
//!   ▼
//! ParsedStory
//!   ├── parse_dialogue   按需解析单行对白
//!   ├── ScriptStats      统计与角色名单
//!   └── analyze_parsed   诊断
//! ```
//!
//! 解析与修复永远不会失败，异常输入以 [`ParseIssue`] 记录。
//!
//! ## 使用示例
//!
//! ```ignore
//! use drama_core::{parse_story, repair};
//!
//! let story = parse_story(text);
//! for node in &story.script_nodes {
//!     println!("{}", node.shape());
//! }
//!
//! let clean = repair(messy_text);
//! ```
//!
//! ## 模块结构
//!
//! - [`document`]：文档分段与角色指南
//! - [`script`]：正文词法分析与解析（AST 和 Parser）
//! - [`dialogue`]：单行对白解析
//! - [`repair`]：修复引擎
//! - [`story`]：整份文档的解析入口
//! - [`stats`]：统计与角色名单
//! - [`diagnostic`]：诊断
//! - [`config`]：配置
//! - [`error`]：错误类型定义
//! - [`id`]：节点 ID 生成

pub mod config;
pub mod dialogue;
pub mod diagnostic;
pub mod document;
pub mod error;
pub mod id;
pub mod repair;
pub mod script;
pub mod stats;
pub mod story;

// 重导出核心类型
pub use config::{DramaConfig, ParseConfig, RepairConfig};
pub use dialogue::{DialogueLine, NARRATION_ROLE, parse_dialogue, speaker_prefix};
pub use diagnostic::{
    Diagnostic, DiagnosticLevel, DiagnosticResult, analyze_parsed, analyze_story,
    analyze_story_with_config,
};
pub use document::{CharacterProfile, SectionHeader, parse_character_guide, segment_document};
pub use error::{ConfigError, ConfigResult, ParseIssue};
pub use id::{IdGenerator, NodeId, SequentialIds};
pub use repair::RepairEngine;
pub use script::{ContainerKind, NodeKind, ScriptNode, ScriptParser, SoundAttributes};
pub use stats::{RosterEntry, RosterOrigin, ScriptStats, roster};
pub use story::{ParsedStory, StoryParser};

/// 使用默认配置解析整份文档
pub fn parse_story(text: &str) -> ParsedStory {
    StoryParser::default().parse(text)
}

/// 使用默认配置修复文本
pub fn repair(text: &str) -> String {
    RepairEngine::default().repair(text)
}
