//! # Story 模块
//!
//! 整份文档的解析入口：分段 → 正文解析 + 角色指南解析。

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DramaConfig;
use crate::document::{CharacterProfile, SectionHeader, parse_character_guide, segment_document};
use crate::error::ParseIssue;
use crate::id::{IdGenerator, SequentialIds};
use crate::repair::RepairEngine;
use crate::script::{ScriptNode, ScriptParser};

/// 解析后的剧本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedStory {
    /// 标题（缺失时为配置中的占位标题）
    pub title: String,
    /// 正文节点（隐式根容器的子节点）
    pub script_nodes: Vec<ScriptNode>,
    /// 角色指南原文
    pub character_guide: String,
    /// 角色档案
    pub characters: Vec<CharacterProfile>,
    /// 背景音乐说明原文
    pub background_music: String,
    /// `STORY_TITLE:` 所在行
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub title_line: Option<usize>,
    /// 正文第一个字符所在行
    pub script_line: usize,
    /// `CHARACTER_GUIDE:` 所在行
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub guide_line: Option<usize>,
    /// `BACKGROUND_MUSIC:` 所在行
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub music_line: Option<usize>,
}

impl ParsedStory {
    /// 按名字查找角色档案
    pub fn character(&self, name: &str) -> Option<&CharacterProfile> {
        self.characters.iter().find(|c| c.name == name)
    }
}

/// 剧本解析器
#[derive(Debug)]
pub struct StoryParser<G = SequentialIds> {
    config: DramaConfig,
    ids: G,
    issues: Vec<ParseIssue>,
    missing: Vec<SectionHeader>,
}

impl Default for StoryParser {
    fn default() -> Self {
        Self::new(DramaConfig::default())
    }
}

impl StoryParser {
    /// 使用默认的顺序 ID 生成器
    pub fn new(config: DramaConfig) -> Self {
        Self::with_ids(config, SequentialIds::new())
    }
}

impl<G: IdGenerator> StoryParser<G> {
    /// 注入自定义的 ID 生成器
    pub fn with_ids(config: DramaConfig, ids: G) -> Self {
        Self {
            config,
            ids,
            issues: Vec::new(),
            missing: Vec::new(),
        }
    }

    pub fn config(&self) -> &DramaConfig {
        &self.config
    }

    /// 解析整份文档
    pub fn parse(&mut self, text: &str) -> ParsedStory {
        if self.config.parse.auto_repair {
            let repaired = RepairEngine::new(&self.config.repair).repair(text);
            return self.parse_segments(&repaired);
        }
        self.parse_segments(text)
    }

    fn parse_segments(&mut self, text: &str) -> ParsedStory {
        let sections = segment_document(text);

        self.missing = SectionHeader::ALL
            .into_iter()
            .filter(|h| !sections.has(*h))
            .collect();

        let title = match sections.get(SectionHeader::StoryTitle) {
            Some(section) => section.content.to_string(),
            None => self.config.parse.untitled_title.clone(),
        };

        let script_line = sections
            .get(SectionHeader::FinalText)
            .map_or(1, |s| s.content_line);
        let mut parser = ScriptParser::new();
        let script_nodes = parser.parse(
            sections.content(SectionHeader::FinalText),
            script_line,
            &mut self.ids,
        );
        self.issues = parser.issues().to_vec();

        let character_guide = sections.content(SectionHeader::CharacterGuide);
        let characters = parse_character_guide(character_guide);

        debug!(
            title = %title,
            nodes = script_nodes.len(),
            characters = characters.len(),
            issues = self.issues.len(),
            "剧本解析完成"
        );

        ParsedStory {
            title,
            script_nodes,
            character_guide: character_guide.to_string(),
            characters,
            background_music: sections
                .content(SectionHeader::BackgroundMusic)
                .to_string(),
            title_line: sections.header_line(SectionHeader::StoryTitle),
            script_line,
            guide_line: sections.header_line(SectionHeader::CharacterGuide),
            music_line: sections.header_line(SectionHeader::BackgroundMusic),
        }
    }

    /// 上一次解析正文时记录的问题
    pub fn issues(&self) -> &[ParseIssue] {
        &self.issues
    }

    /// 上一次解析时缺失的段落标题
    pub fn missing_sections(&self) -> &[SectionHeader] {
        &self.missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::NodeId;
    use crate::script::shape_of;

    const DOC: &str = r#"STORY_TITLE:
The Crystal Cavern

FINAL_TEXT:
<parallel>
    Narration: Elena stepped into the cavern.
    <sound name="footsteps">Echoing footsteps</sound>
</parallel>
Elena(whisper): "It must be here."

CHARACTER_GUIDE:
Elena:
Gender: Female

BACKGROUND_MUSIC:
Orchestral"#;

    #[test]
    fn test_parse_story() {
        let mut parser = StoryParser::default();
        let story = parser.parse(DOC);

        assert_eq!(story.title, "The Crystal Cavern");
        assert_eq!(shape_of(&story.script_nodes), "par(text,sound),text");
        assert_eq!(story.script_nodes[0].line_number, Some(5));
        assert_eq!(story.script_nodes[1].line_number, Some(9));
        assert_eq!(story.characters.len(), 1);
        assert_eq!(story.character("Elena").unwrap().gender.as_deref(), Some("Female"));
        assert_eq!(story.background_music, "Orchestral");
        assert_eq!(story.title_line, Some(1));
        assert_eq!(story.script_line, 5);
        assert_eq!(story.guide_line, Some(11));
        assert_eq!(story.music_line, Some(15));
        assert!(parser.issues().is_empty());
        assert!(parser.missing_sections().is_empty());
    }

    #[test]
    fn test_missing_title_uses_placeholder() {
        let mut config = DramaConfig::default();
        config.parse.untitled_title = "无题".to_string();
        let mut parser = StoryParser::new(config);
        let story = parser.parse("FINAL_TEXT:\nA: hi");

        assert_eq!(story.title, "无题");
        assert_eq!(story.title_line, None);
        assert_eq!(story.script_line, 2);
        assert_eq!(
            parser.missing_sections(),
            &[
                SectionHeader::StoryTitle,
                SectionHeader::CharacterGuide,
                SectionHeader::BackgroundMusic
            ]
        );
    }

    #[test]
    fn test_no_script_section() {
        let story = StoryParser::default().parse("A: hi");
        assert!(story.script_nodes.is_empty());
        assert_eq!(story.title, "Untitled Story");
        assert_eq!(story.script_line, 1);
    }

    #[test]
    fn test_custom_id_generator() {
        let mut next = 1000;
        let ids = move || {
            next += 1;
            NodeId(next)
        };
        let mut parser = StoryParser::with_ids(DramaConfig::default(), ids);
        let story = parser.parse("FINAL_TEXT:\nA: hi");
        // 根容器占用 1001
        assert_eq!(story.script_nodes[0].id, NodeId(1002));
    }

    #[test]
    fn test_issues_are_collected() {
        let mut parser = StoryParser::default();
        parser.parse("FINAL_TEXT:\n<parallel>\nA: hi\n<#x#>");
        assert_eq!(parser.issues().len(), 2);
        assert!(matches!(parser.issues()[0], ParseIssue::UnclosedContainer { line: 2, .. }));
        assert!(matches!(parser.issues()[1], ParseIssue::InvalidPause { line: 4, .. }));
    }

    #[test]
    fn test_auto_repair() {
        let mut config = DramaConfig::default();
        config.parse.auto_repair = true;
        let mut parser = StoryParser::new(config);
        let story = parser.parse("FINAL_TEXT:\n<paralel>\nA: one\nA: two");

        assert_eq!(shape_of(&story.script_nodes), "par(seq(text,text))");
        assert!(parser.issues().is_empty());
    }

    #[test]
    fn test_serialize_story() {
        let story = StoryParser::default().parse(DOC);
        let json = serde_json::to_value(&story).unwrap();
        assert_eq!(json["title"], "The Crystal Cavern");
        assert_eq!(json["scriptNodes"][0]["type"], "PARALLEL");
        assert_eq!(json["scriptNodes"][0]["children"][1]["attributes"]["name"], "footsteps");
        assert_eq!(json["characters"][0]["name"], "Elena");
    }
}
