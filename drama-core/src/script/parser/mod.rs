//! # Parser 模块
//!
//! 剧本正文解析器：词法分析 + 栈式状态机（手写，无 regex 依赖）。
//!
//! ## 架构
//!
//! ```text
//! 正文文本 → [Lexer] → Vec<Token> → [栈式状态机] → 根 Sequential 节点
//! ```
//!
//! ## 设计原则
//!
//! - 容错解析：任何输入都能得到结构合法的树，异常记录为 [`ParseIssue`]
//! - 闭合标签总是关闭最内层的容器，不检查名字是否一致
//! - 行号由词法分析器统一计算
//!
//! ## 模块结构
//!
//! - `helpers`: 辅助解析函数

pub(crate) mod helpers;

#[cfg(test)]
mod tests;

use tracing::debug;

use crate::error::ParseIssue;
use crate::id::IdGenerator;
use crate::script::ast::{ContainerKind, NodeKind, ScriptNode};
use crate::script::lexer::{LexNote, Lexer, Token, TokenKind};

// 重新导出辅助函数供测试使用
pub use helpers::{extract_attr, parse_loop_flag, parse_pause_duration, split_tag};

/// 构建中的树：隐式根节点 + 打开的容器栈
struct TreeBuilder {
    root: ScriptNode,
    open: Vec<ScriptNode>,
}

impl TreeBuilder {
    /// 把节点追加到最内层打开的容器（没有则追加到根）
    fn push_child(&mut self, node: ScriptNode) {
        let parent = self.open.last_mut().unwrap_or(&mut self.root);
        if let Some(children) = parent.children_mut() {
            children.push(node);
        }
    }

    /// 关闭最内层容器
    fn close_innermost(&mut self) -> Option<ContainerKind> {
        let node = self.open.pop()?;
        let kind = node.container_kind();
        self.push_child(node);
        kind
    }
}

/// 正文解析器
#[derive(Debug, Default)]
pub struct ScriptParser {
    /// 解析问题（非致命）
    issues: Vec<ParseIssue>,
}

impl ScriptParser {
    /// 创建新的解析器
    pub fn new() -> Self {
        Self::default()
    }

    /// 解析正文，返回隐式的根 `Sequential` 节点
    ///
    /// # 参数
    ///
    /// - `text`: 正文文本
    /// - `start_line`: 正文第一行在整份文档中的行号
    /// - `ids`: 节点 ID 生成器
    pub fn parse_tree<G>(&mut self, text: &str, start_line: usize, ids: &mut G) -> ScriptNode
    where
        G: IdGenerator + ?Sized,
    {
        self.issues.clear();

        let mut lexer = Lexer::new(text, start_line);
        let tokens = lexer.run();

        let mut tree = TreeBuilder {
            root: ScriptNode::container(ids.next_id(), Some(start_line), ContainerKind::Sequential),
            open: Vec::new(),
        };

        for token in tokens {
            self.apply_token(token, &mut tree, ids);
        }

        // 未闭合的容器在文末自动关闭
        while let Some(node) = tree.open.last() {
            if let Some(kind) = node.container_kind() {
                self.issues.push(ParseIssue::UnclosedContainer {
                    line: node.line_number.unwrap_or(start_line),
                    kind,
                });
            }
            tree.close_innermost();
        }

        for note in lexer.notes() {
            self.issues.push(match *note {
                LexNote::UnterminatedTag { line } => ParseIssue::UnterminatedTag { line },
                LexNote::UnclosedSound { line } => ParseIssue::UnclosedSound { line },
            });
        }
        self.issues.sort_by_key(ParseIssue::line);

        debug!(
            nodes = tree.root.children().len(),
            issues = self.issues.len(),
            "正文解析完成"
        );

        tree.root
    }

    /// 解析正文，返回根容器的子节点
    pub fn parse<G>(&mut self, text: &str, start_line: usize, ids: &mut G) -> Vec<ScriptNode>
    where
        G: IdGenerator + ?Sized,
    {
        self.parse_tree(text, start_line, ids).into_children()
    }

    /// 获取解析过程中的问题
    pub fn issues(&self) -> &[ParseIssue] {
        &self.issues
    }

    fn apply_token<G>(&mut self, token: Token<'_>, tree: &mut TreeBuilder, ids: &mut G)
    where
        G: IdGenerator + ?Sized,
    {
        let line = token.line;
        match token.kind {
            TokenKind::Text => {
                // 每个非空行成为一个 Text 叶子，带各自的行号
                for (offset, raw) in token.text.split('\n').enumerate() {
                    let content = raw.trim();
                    if content.is_empty() {
                        continue;
                    }
                    tree.push_child(ScriptNode::new(
                        ids.next_id(),
                        Some(line + offset),
                        NodeKind::Text {
                            content: content.to_string(),
                        },
                    ));
                }
            }
            TokenKind::Open { kind, self_closing } => {
                let node = ScriptNode::container(ids.next_id(), Some(line), kind);
                if self_closing {
                    tree.push_child(node);
                } else {
                    tree.open.push(node);
                }
            }
            TokenKind::Close(found) => match tree.close_innermost() {
                None => self.issues.push(ParseIssue::StrayClose { line, found }),
                Some(open) if open != found => {
                    self.issues
                        .push(ParseIssue::MismatchedClose { line, found, open });
                }
                Some(_) => {}
            },
            TokenKind::SoundClose => {
                self.issues.push(ParseIssue::StraySoundClose { line });
            }
            TokenKind::Sound(attrs) => {
                if let Some(raw) = &attrs.volume {
                    let in_range = attrs
                        .volume_level()
                        .is_some_and(|v| (0.0..=1.0).contains(&v));
                    if !in_range {
                        self.issues.push(ParseIssue::InvalidVolume {
                            line,
                            name: attrs.name.clone(),
                            raw: raw.clone(),
                        });
                    }
                }
                tree.push_child(ScriptNode::new(
                    ids.next_id(),
                    Some(line),
                    NodeKind::Sound { attrs },
                ));
            }
            TokenKind::Pause { raw, duration } => {
                if duration.is_nan() || duration < 0.0 {
                    self.issues.push(ParseIssue::InvalidPause { line, raw });
                }
                tree.push_child(ScriptNode::new(
                    ids.next_id(),
                    Some(line),
                    NodeKind::Pause { duration },
                ));
            }
        }
    }
}
