//! # Dialogue 模块
//!
//! 单行对白解析：把 `Text` 节点的内容拆成角色、情绪、语音效果与纯文本。
//!
//! ## 格式
//!
//! ```text
//! 角色[(情绪)]: [<效果>...]["引号文本"]
//! ```
//!
//! 冒号可以是半角 `:` 或全角 `：`。任何输入都会得到一个 [`DialogueLine`]。

use serde::{Deserialize, Serialize};

use crate::script::parser::helpers::starts_with_ignore_case;

/// 旁白角色名
pub const NARRATION_ROLE: &str = "Narration";

/// 一行对白
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogueLine {
    /// 角色名（无法识别时为空）
    pub role: String,
    /// 情绪（括号内的内容）
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub emotion: Option<String>,
    /// 去掉效果标签与引号后的文本
    pub text: String,
    /// 语音效果标签名，按出现顺序
    #[serde(default)]
    pub voice_effects: Vec<String>,
    /// 是否为旁白
    pub is_narration: bool,
}

impl DialogueLine {
    /// 旁白行
    fn narration(role: &str, text: &str) -> Self {
        Self {
            role: role.to_string(),
            text: text.to_string(),
            is_narration: true,
            ..Self::default()
        }
    }
}

/// 解析一行对白
///
/// # 示例
///
/// ```ignore
/// let line = parse_dialogue(r#"Elena(whisper): "Hello there""#);
/// assert_eq!(line.role, "Elena");
/// assert_eq!(line.emotion.as_deref(), Some("whisper"));
/// assert_eq!(line.text, "Hello there");
/// ```
pub fn parse_dialogue(line: &str) -> DialogueLine {
    let line = line.trim();

    let Some((role, emotion, body)) = split_speaker(line) else {
        if starts_with_ignore_case(line, NARRATION_ROLE) {
            let rest = line[NARRATION_ROLE.len()..].trim_start();
            let rest = strip_colon(rest).unwrap_or(rest);
            return DialogueLine::narration(NARRATION_ROLE, rest.trim());
        }
        return DialogueLine::narration("", line);
    };

    let role = role.trim();
    let (voice_effects, display) = take_effects(body.trim());
    let display = display.trim();
    let display = display.strip_prefix('"').unwrap_or(display);
    let display = display.strip_suffix('"').unwrap_or(display);

    DialogueLine {
        role: role.to_string(),
        emotion: emotion.map(|e| e.trim().to_string()),
        text: display.trim().to_string(),
        voice_effects,
        is_narration: role == NARRATION_ROLE,
    }
}

/// 说话人前缀中的角色名（不含情绪），无法识别时返回 `None`
///
/// 只看第一个 `:` / `：` / `(` 之前的内容，不要求后面真的有冒号。
pub fn speaker_prefix(line: &str) -> Option<&str> {
    let line = line.trim();
    let end = line.find([':', '：', '(']).unwrap_or(line.len());
    let role = line[..end].trim();
    (!role.is_empty()).then_some(role)
}

fn strip_colon(s: &str) -> Option<&str> {
    s.strip_prefix(':').or_else(|| s.strip_prefix('：'))
}

/// 拆分 `角色[(情绪)]:` 前缀，返回 `(角色, 情绪, 冒号后的内容)`
fn split_speaker(line: &str) -> Option<(&str, Option<&str>, &str)> {
    let role_end = line.find([':', '：', '('])?;
    if role_end == 0 {
        return None;
    }
    let role = &line[..role_end];
    let mut rest = &line[role_end..];

    let mut emotion = None;
    if let Some(inner) = rest.strip_prefix('(') {
        let close = inner.find(')')?;
        if close == 0 {
            return None;
        }
        emotion = Some(&inner[..close]);
        rest = &inner[close + 1..];
    }

    let body = strip_colon(rest)?;
    Some((role, emotion, body))
}

/// 取出所有 `<...>` 效果标签，返回 `(标签名列表, 剩余文本)`
fn take_effects(text: &str) -> (Vec<String>, String) {
    let mut effects = Vec::new();
    let mut clean = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(lt) = rest.find('<') {
        let after = &rest[lt + 1..];
        match after.find('>') {
            Some(gt) if gt > 0 => {
                effects.push(after[..gt].to_string());
                clean.push_str(&rest[..lt]);
                rest = &after[gt + 1..];
            }
            _ => {
                clean.push_str(&rest[..=lt]);
                rest = after;
            }
        }
    }
    clean.push_str(rest);

    (effects, clean)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_with_emotion() {
        let line = parse_dialogue(r#"Elena(whisper): "Hello there""#);
        assert_eq!(line.role, "Elena");
        assert_eq!(line.emotion.as_deref(), Some("whisper"));
        assert_eq!(line.text, "Hello there");
        assert!(line.voice_effects.is_empty());
        assert!(!line.is_narration);
    }

    #[test]
    fn test_narration() {
        let line = parse_dialogue("Narration: She walked away.");
        assert_eq!(line.role, "Narration");
        assert_eq!(line.text, "She walked away.");
        assert_eq!(line.emotion, None);
        assert!(line.is_narration);
    }

    #[test]
    fn test_voice_effects_are_collected_and_removed() {
        let line = parse_dialogue(r#"Guardian(echo): <ghost_spirit>"Who disturbs the slumber?""#);
        assert_eq!(line.role, "Guardian");
        assert_eq!(line.voice_effects, vec!["ghost_spirit"]);
        assert_eq!(line.text, "Who disturbs the slumber?");

        let line = parse_dialogue("Bob: <phone_call> hi <radio> there");
        assert_eq!(line.voice_effects, vec!["phone_call", "radio"]);
        assert_eq!(line.text, "hi  there");
    }

    #[test]
    fn test_full_width_colon() {
        let line = parse_dialogue("艾琳（低语）：你好");
        // 全角括号不是情绪分隔符
        assert_eq!(line.role, "艾琳（低语）");
        assert_eq!(line.text, "你好");

        let line = parse_dialogue("艾琳(低语)：\"你好\"");
        assert_eq!(line.role, "艾琳");
        assert_eq!(line.emotion.as_deref(), Some("低语"));
        assert_eq!(line.text, "你好");
    }

    #[test]
    fn test_only_one_quote_pair_is_stripped() {
        let line = parse_dialogue(r#"A: ""quoted"""#);
        assert_eq!(line.text, r#""quoted""#);
    }

    #[test]
    fn test_narration_role_is_case_sensitive() {
        let line = parse_dialogue("narration: quiet");
        assert_eq!(line.role, "narration");
        assert!(!line.is_narration);
    }

    #[test]
    fn test_unmatched_narration_prefix() {
        // 空情绪括号不匹配 role(emotion): 格式
        let line = parse_dialogue("Narration(): The wind howls");
        assert_eq!(line.role, "Narration");
        assert_eq!(line.text, "(): The wind howls");
        assert!(line.is_narration);

        let line = parse_dialogue("NARRATION the end");
        assert_eq!(line.role, "Narration");
        assert_eq!(line.text, "the end");
    }

    #[test]
    fn test_plain_line_is_unnamed_narration() {
        let line = parse_dialogue("  The Crystal Cavern  ");
        assert_eq!(line.role, "");
        assert_eq!(line.text, "The Crystal Cavern");
        assert!(line.is_narration);

        // 括号未闭合
        let line = parse_dialogue("Elena(whisper: hi");
        assert_eq!(line.role, "");
        assert!(line.is_narration);

        // 冒号开头
        let line = parse_dialogue(": hi");
        assert_eq!(line.role, "");
        assert_eq!(line.text, ": hi");
    }

    #[test]
    fn test_empty_line() {
        let line = parse_dialogue("");
        assert_eq!(line, DialogueLine::narration("", ""));
    }

    #[test]
    fn test_speaker_prefix() {
        assert_eq!(speaker_prefix("Elena(whisper): hi"), Some("Elena"));
        assert_eq!(speaker_prefix("  Bob : hi"), Some("Bob"));
        assert_eq!(speaker_prefix("just text"), Some("just text"));
        assert_eq!(speaker_prefix(": hi"), None);
    }

    #[test]
    fn test_serialize_camel_case() {
        let json = serde_json::to_value(parse_dialogue("Narration: hi")).unwrap();
        assert_eq!(json["isNarration"], true);
        assert!(json.get("emotion").is_none());
        assert_eq!(json["voiceEffects"], serde_json::json!([]));
    }
}
