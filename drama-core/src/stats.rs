//! # Stats 模块
//!
//! 正文统计（各角色台词数、音效数、语气效果数）与角色名单。
//!
//! 对白行在这里才按需解析，节点树本身只保存原文。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dialogue::{NARRATION_ROLE, parse_dialogue};
use crate::document::CharacterProfile;
use crate::script::{NodeKind, ScriptNode};
use crate::story::ParsedStory;

/// 没有说话人的对白行计入的角色名
pub const UNKNOWN_ROLE: &str = "Unknown";

/// 正文统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptStats {
    /// 每个角色的台词行数
    pub line_counts: BTreeMap<String, usize>,
    /// 每种音效（按名称）出现的次数
    pub sound_counts: BTreeMap<String, usize>,
    /// 每种语气效果（去掉尖括号）出现的次数
    pub effect_counts: BTreeMap<String, usize>,
    /// 按首次出现顺序排列的角色
    pub speakers: Vec<String>,
}

impl ScriptStats {
    /// 遍历节点树收集统计
    pub fn collect(nodes: &[ScriptNode]) -> Self {
        let mut stats = Self::default();
        for node in nodes {
            node.walk(&mut |n| stats.visit(n));
        }
        stats
    }

    fn visit(&mut self, node: &ScriptNode) {
        match &node.kind {
            NodeKind::Text { content } => {
                let line = parse_dialogue(content);
                let role = if line.role.is_empty() {
                    UNKNOWN_ROLE.to_string()
                } else {
                    line.role
                };
                if !self.line_counts.contains_key(&role) {
                    self.speakers.push(role.clone());
                }
                *self.line_counts.entry(role).or_default() += 1;

                for effect in &line.voice_effects {
                    let name = effect.trim_matches(['<', '>']).to_string();
                    *self.effect_counts.entry(name).or_default() += 1;
                }
            }
            NodeKind::Sound { attrs } => {
                *self.sound_counts.entry(attrs.name.clone()).or_default() += 1;
            }
            _ => {}
        }
    }

    /// 台词总行数
    pub fn total_lines(&self) -> usize {
        self.line_counts.values().sum()
    }

    /// 某角色的台词行数
    pub fn lines_of(&self, role: &str) -> usize {
        self.line_counts.get(role).copied().unwrap_or(0)
    }
}

/// 名单条目的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RosterOrigin {
    /// 角色指南中描述的角色
    Guide,
    /// 只在正文中出现的角色
    Detected,
    /// 旁白
    Narrator,
}

/// 名单条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub profile: CharacterProfile,
    pub origin: RosterOrigin,
}

/// 角色名单
///
/// 顺序：（旁白）→ 指南中的角色 → 正文中检测到、指南里没有的角色。
pub fn roster(story: &ParsedStory, stats: &ScriptStats) -> Vec<RosterEntry> {
    let in_guide = |name: &str| story.characters.iter().any(|c| c.name == name);

    let mut entries = Vec::new();
    if stats.lines_of(NARRATION_ROLE) > 0 && !in_guide(NARRATION_ROLE) {
        entries.push(RosterEntry {
            profile: placeholder(NARRATION_ROLE, "Narrator"),
            origin: RosterOrigin::Narrator,
        });
    }

    entries.extend(story.characters.iter().map(|c| RosterEntry {
        profile: c.clone(),
        origin: RosterOrigin::Guide,
    }));

    entries.extend(
        stats
            .speakers
            .iter()
            .filter(|name| name.as_str() != NARRATION_ROLE && !in_guide(name))
            .map(|name| RosterEntry {
                profile: placeholder(name, "Detected in script"),
                origin: RosterOrigin::Detected,
            }),
    );
    entries
}

fn placeholder(name: &str, voice: &str) -> CharacterProfile {
    CharacterProfile {
        name: name.to_string(),
        voice: Some(voice.to_string()),
        ..Default::default()
    }
}
