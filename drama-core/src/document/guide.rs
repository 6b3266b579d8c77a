//! # 角色指南解析
//!
//! 从 `CHARACTER_GUIDE` 段提取角色档案。
//!
//! ```text
//! Elena:
//! Gender: Female
//! Age: 20s
//! Voice: Soft but determined
//! ```
//!
//! 以冒号结尾、且冒号前不是已知属性名的行开始一个新角色；
//! 之后的行（直到下一个角色）都属于这个角色的档案。

use serde::{Deserialize, Serialize};
use tracing::debug;

/// 角色档案
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterProfile {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub age: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub personality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub voice: Option<String>,
    /// 档案原文（各行去掉首尾空白后以换行连接）
    pub raw_profile: String,
}

/// 档案属性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuideAttribute {
    Gender,
    Age,
    Personality,
    Voice,
    Role,
    Description,
}

/// 属性标签（中英双语，精确匹配，英文大小写不敏感）
const LABELS: &[(&str, GuideAttribute)] = &[
    ("性别", GuideAttribute::Gender),
    ("gender", GuideAttribute::Gender),
    ("年龄", GuideAttribute::Age),
    ("age", GuideAttribute::Age),
    ("个性", GuideAttribute::Personality),
    ("personality", GuideAttribute::Personality),
    ("声音推荐", GuideAttribute::Voice),
    ("voice", GuideAttribute::Voice),
    ("sound", GuideAttribute::Voice),
    ("role", GuideAttribute::Role),
    ("desc", GuideAttribute::Description),
];

impl GuideAttribute {
    /// 按标签识别属性
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        LABELS
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(label))
            .map(|&(_, attr)| attr)
    }
}

/// 拆分 `标签: 值`，冒号可以是半角或全角
fn split_label(line: &str) -> Option<(&str, &str)> {
    let pos = line.find([':', '：'])?;
    let colon_len = line[pos..].chars().next().map_or(1, char::len_utf8);
    Some((&line[..pos], &line[pos + colon_len..]))
}

/// 取第一个标签匹配的行的值；值为空时返回 `None`
fn attribute_value(lines: &[&str], attr: GuideAttribute) -> Option<String> {
    let value = lines.iter().find_map(|line| {
        let (label, value) = split_label(line)?;
        (GuideAttribute::from_label(label) == Some(attr)).then_some(value.trim())
    })?;
    (!value.is_empty()).then(|| value.to_string())
}

/// 行尾冒号前的角色名；属性标签或空名返回 `None`
fn character_name(line: &str) -> Option<&str> {
    let key = line
        .strip_suffix(':')
        .or_else(|| line.strip_suffix('：'))?
        .trim();
    if key.is_empty() || GuideAttribute::from_label(key).is_some() {
        return None;
    }
    Some(key)
}

fn build_profile(name: &str, lines: &[&str]) -> CharacterProfile {
    CharacterProfile {
        name: name.to_string(),
        gender: attribute_value(lines, GuideAttribute::Gender),
        age: attribute_value(lines, GuideAttribute::Age),
        personality: attribute_value(lines, GuideAttribute::Personality),
        voice: attribute_value(lines, GuideAttribute::Voice),
        raw_profile: lines.join("\n"),
    }
}

/// 解析角色指南
///
/// 第一个角色之前的行会被丢弃。
pub fn parse_character_guide(text: &str) -> Vec<CharacterProfile> {
    let mut profiles = Vec::new();
    let mut current: Option<(&str, Vec<&str>)> = None;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(name) = character_name(line) {
            if let Some((prev, lines)) = current.take() {
                profiles.push(build_profile(prev, &lines));
            }
            current = Some((name, Vec::new()));
        } else if let Some((_, lines)) = current.as_mut() {
            lines.push(line);
        }
    }
    if let Some((name, lines)) = current {
        profiles.push(build_profile(name, &lines));
    }

    debug!(count = profiles.len(), "角色指南解析完成");
    profiles
}
