//! # 诊断模块
//!
//! 把解析过程中收集到的问题转换为分级、带行号的诊断，不依赖 IO。
//!
//! 诊断分级：Error（必须修复）、Warn（建议修复）、Info（信息提示）。
//! 解析本身永远成功，诊断只是对结果的补充说明。

use std::collections::HashSet;

use serde::Serialize;

use crate::config::DramaConfig;
use crate::dialogue::{NARRATION_ROLE, parse_dialogue};
use crate::document::SectionHeader;
use crate::error::ParseIssue;
use crate::repair::RepairEngine;
use crate::script::ScriptNode;
use crate::story::{ParsedStory, StoryParser};

/// 诊断级别，按严重程度排序
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DiagnosticLevel {
    Info,
    /// 建议修复
    Warn,
    /// 必须修复
    Error,
}

impl DiagnosticLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一条诊断
///
/// 显示格式：`[LEVEL] 剧本:行号: 消息`，有详情时另起一行 `  | 详情`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    /// 剧本文件路径或调用方给的 ID
    pub script_id: String,
    /// 从 1 开始；缺失段落这类问题没有行号
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub message: String,
    /// 通常是该行原文
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Diagnostic {
    pub fn new(
        level: DiagnosticLevel,
        script_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            level,
            script_id: script_id.into(),
            line: None,
            message: message.into(),
            detail: None,
        }
    }

    pub fn error(script_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Error, script_id, message)
    }

    pub fn warn(script_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Warn, script_id, message)
    }

    pub fn info(script_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Info, script_id, message)
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.level, self.script_id)?;
        if let Some(line) = self.line {
            write!(f, ":{line}")?;
        }
        write!(f, ": {}", self.message)?;
        match &self.detail {
            Some(detail) => write!(f, "\n  | {detail}"),
            None => Ok(()),
        }
    }
}

/// 一次或多次分析得到的诊断集合
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiagnosticResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnosticResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// 追加另一个结果（多个剧本文件的诊断汇总到一起）
    pub fn merge(&mut self, other: DiagnosticResult) {
        self.diagnostics.extend(other.diagnostics);
    }

    /// 某一级别的诊断数量
    pub fn count(&self, level: DiagnosticLevel) -> usize {
        self.diagnostics.iter().filter(|d| d.level == level).count()
    }

    pub fn error_count(&self) -> usize {
        self.count(DiagnosticLevel::Error)
    }

    pub fn warn_count(&self) -> usize {
        self.count(DiagnosticLevel::Warn)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.level == DiagnosticLevel::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// 不低于 `min_level` 的诊断
    pub fn filter_by_level(&self, min_level: DiagnosticLevel) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.level >= min_level)
            .collect()
    }
}

//=============================================================================
// 剧本分析 API
//=============================================================================

/// 使用默认配置解析并分析整份剧本
pub fn analyze_story(script_id: &str, text: &str) -> DiagnosticResult {
    analyze_story_with_config(script_id, text, &DramaConfig::default())
}

/// 解析并分析整份剧本
///
/// 带行号的诊断会附上该行原文作为详情。开启 `auto_repair` 时行号指向修复后的文本。
pub fn analyze_story_with_config(
    script_id: &str,
    text: &str,
    config: &DramaConfig,
) -> DiagnosticResult {
    let mut parser = StoryParser::new(config.clone());
    let story = parser.parse(text);
    let mut result = analyze_parsed(script_id, &story, parser.issues(), parser.missing_sections());

    let repaired;
    let source = if config.parse.auto_repair {
        repaired = RepairEngine::new(&config.repair).repair(text);
        repaired.as_str()
    } else {
        text
    };
    let lines: Vec<&str> = source.lines().collect();
    for diag in &mut result.diagnostics {
        if diag.detail.is_some() {
            continue;
        }
        let index = diag.line.and_then(|l| l.checked_sub(1));
        if let Some(raw) = index.and_then(|i| lines.get(i)) {
            let raw = raw.trim();
            if !raw.is_empty() {
                diag.detail = Some(raw.to_string());
            }
        }
    }
    result
}

/// 分析已解析的剧本
///
/// 执行以下检查：
/// - 缺失的段落标题（`FINAL_TEXT` 为警告，`STORY_TITLE` 为提示）
/// - 解析问题
/// - 角色指南中没有描述的说话人（仅在指南非空时检查）
pub fn analyze_parsed(
    script_id: &str,
    story: &ParsedStory,
    issues: &[ParseIssue],
    missing: &[SectionHeader],
) -> DiagnosticResult {
    let mut result = DiagnosticResult::new();

    for header in missing {
        match header {
            SectionHeader::FinalText => result.push(Diagnostic::warn(
                script_id,
                format!("缺少 {} 段，正文为空", header.marker()),
            )),
            SectionHeader::StoryTitle => result.push(Diagnostic::info(
                script_id,
                format!("缺少 {} 段，使用占位标题 '{}'", header.marker(), story.title),
            )),
            _ => {}
        }
    }

    for issue in issues {
        result.push(issue_diagnostic(script_id, issue));
    }

    if !story.characters.is_empty() {
        check_speakers(script_id, story, &mut result);
    }

    result
}

/// 解析问题对应的诊断
fn issue_diagnostic(script_id: &str, issue: &ParseIssue) -> Diagnostic {
    let message = issue.to_string();
    // 行号单独显示，去掉消息里的"第 N 行："前缀
    let message = message
        .split_once('：')
        .map_or(message.as_str(), |(_, rest)| rest)
        .to_string();

    let diag = match issue {
        ParseIssue::InvalidPause { .. } => Diagnostic::error(script_id, message)
            .with_detail("停顿时长按 NaN 处理"),
        ParseIssue::StraySoundClose { .. } | ParseIssue::StrayClose { .. } => {
            Diagnostic::info(script_id, message)
        }
        _ => Diagnostic::warn(script_id, message),
    };
    diag.with_line(issue.line())
}

/// 检查指南中没有描述的说话人，每个角色只报告第一次出现
fn check_speakers(script_id: &str, story: &ParsedStory, result: &mut DiagnosticResult) {
    let mut reported = HashSet::new();
    let mut visit = |node: &ScriptNode| {
        let Some(content) = node.as_text() else {
            return;
        };
        let line = parse_dialogue(content);
        if line.role.is_empty() || line.role == NARRATION_ROLE {
            return;
        }
        if story.character(&line.role).is_some() || !reported.insert(line.role.clone()) {
            return;
        }
        let mut diag = Diagnostic::info(
            script_id,
            format!("角色 '{}' 未在 CHARACTER_GUIDE 中描述", line.role),
        );
        if let Some(n) = node.line_number {
            diag = diag.with_line(n);
        }
        result.push(diag);
    };
    for node in &story.script_nodes {
        node.walk(&mut visit);
    }
}
