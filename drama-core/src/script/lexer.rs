//! # 词法分析
//!
//! 把剧本正文切分为 token 流：结构标签（容器开闭、音效、停顿）与文本片段。
//!
//! 非结构标签（如 `<ghost_spirit>` 这类语音效果标记）不会单独成为 token，
//! 而是原样留在文本片段里，由对白解析器稍后提取。

use tracing::trace;

use super::ast::{ContainerKind, SoundAttributes};
use super::parser::helpers::{
    extract_attr, is_self_closing, parse_loop_flag, parse_pause_duration, split_tag,
};

pub(crate) const SOUND_CLOSE: &str = "</sound>";

/// Token 种类
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// 文本片段（可能跨多行，可能包含非结构标签）
    Text,
    /// 容器开始标签；`self_closing` 表示 `<parallel/>` 这类空容器
    Open {
        kind: ContainerKind,
        self_closing: bool,
    },
    /// 容器闭合标签
    Close(ContainerKind),
    /// 完整的音效元素（开始标签 + 描述 + 闭合标签）
    Sound(SoundAttributes),
    /// 没有对应开始标签的 `</sound>`
    SoundClose,
    /// 停顿简写 `<#N#>`
    Pause { raw: String, duration: f64 },
}

/// Token
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    /// 对应的源文本
    pub text: &'a str,
    /// 起始字节位置
    pub start: usize,
    /// 起始行号（从 1 开始，已加上段落偏移）
    pub line: usize,
}

/// 词法分析过程中发现的问题
#[derive(Debug, Clone, PartialEq)]
pub enum LexNote {
    /// `<` 之后没有 `>`
    UnterminatedTag { line: usize },
    /// `<sound>` 之后没有 `</sound>`
    UnclosedSound { line: usize },
}

/// 标签分类结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TagClass {
    NonStructural,
    Open {
        kind: ContainerKind,
        self_closing: bool,
    },
    Close(ContainerKind),
    SoundOpen {
        self_closing: bool,
    },
    SoundClose,
    Pause,
}

/// 按 `<` 与 `>` 之间的内容给标签分类
pub(crate) fn classify(inner: &str) -> TagClass {
    let inner = inner.trim();
    if inner.starts_with('#') {
        return TagClass::Pause;
    }

    let (closing, name, _) = split_tag(inner);
    let self_closing = !closing && is_self_closing(inner);

    if let Some(kind) = ContainerKind::from_tag_name(name) {
        return if closing {
            TagClass::Close(kind)
        } else {
            TagClass::Open { kind, self_closing }
        };
    }

    if name.eq_ignore_ascii_case("sound") {
        return if closing {
            TagClass::SoundClose
        } else {
            TagClass::SoundOpen { self_closing }
        };
    }

    TagClass::NonStructural
}

/// 第一个结构标签的 `<` 所在位置
pub(crate) fn find_structural_tag(text: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(lt) = text[from..].find('<').map(|p| p + from) {
        let gt = text[lt..].find('>')? + lt;
        if classify(&text[lt + 1..gt]) != TagClass::NonStructural {
            return Some(lt);
        }
        from = lt + 1;
    }
    None
}

/// 文本中是否出现结构标签
pub(crate) fn contains_structural_tag(text: &str) -> bool {
    find_structural_tag(text).is_some()
}

/// 递增位置上的重复查找：缓存上一次的结果，只有起点越过它时才重新查找
pub(crate) struct NextMatch {
    needle: &'static str,
    /// `Some(None)` 表示缓存位置之后再也没有
    cached: Option<Option<usize>>,
}

impl NextMatch {
    pub(crate) fn new(needle: &'static str) -> Self {
        Self {
            needle,
            cached: None,
        }
    }

    /// `haystack[from..]` 中第一次出现的位置（相对整个 `haystack`）
    ///
    /// 同一个实例只能用于同一个 `haystack`，且 `from` 不能减小。
    pub(crate) fn find(&mut self, haystack: &str, from: usize) -> Option<usize> {
        match self.cached {
            Some(cached) if cached.is_none_or(|pos| pos >= from) => cached,
            _ => {
                let found = haystack[from..].find(self.needle).map(|pos| pos + from);
                self.cached = Some(found);
                found
            }
        }
    }
}

/// 从音效开始标签中解析属性
fn sound_attributes(inner: &str, description: &str) -> SoundAttributes {
    SoundAttributes {
        name: extract_attr(inner, "name").unwrap_or("SFX").to_string(),
        description: description.trim().to_string(),
        volume: extract_attr(inner, "volume").map(str::to_string),
        looping: parse_loop_flag(inner),
    }
}

/// 词法分析器
pub struct Lexer<'a> {
    src: &'a str,
    /// 段落首行在整份文档中的行号
    start_line: usize,
    /// 所有换行符的字节位置
    newlines: Vec<usize>,
    notes: Vec<LexNote>,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str, start_line: usize) -> Self {
        let newlines = src
            .bytes()
            .enumerate()
            .filter(|&(_, b)| b == b'\n')
            .map(|(i, _)| i)
            .collect();
        Self {
            src,
            start_line,
            newlines,
            notes: Vec::new(),
        }
    }

    /// 字节位置所在的行号
    pub fn line_at(&self, offset: usize) -> usize {
        self.start_line + self.newlines.partition_point(|&n| n < offset)
    }

    /// 词法分析中记录的问题
    pub fn notes(&self) -> &[LexNote] {
        &self.notes
    }

    fn token(&self, kind: TokenKind, start: usize, end: usize) -> Token<'a> {
        Token {
            kind,
            text: &self.src[start..end],
            start,
            line: self.line_at(start),
        }
    }

    /// 运行词法分析
    pub fn run(&mut self) -> Vec<Token<'a>> {
        let src = self.src;
        let mut tokens = Vec::new();
        // 尚未输出的文本起点
        let mut pending = 0;
        // 下一次查找 `<` 的起点
        let mut cursor = 0;
        let mut sound_close = NextMatch::new(SOUND_CLOSE);

        while cursor < src.len() {
            let Some(lt) = src[cursor..].find('<').map(|p| p + cursor) else {
                break;
            };
            let Some(gt) = src[lt..].find('>').map(|p| p + lt) else {
                self.notes.push(LexNote::UnterminatedTag {
                    line: self.line_at(lt),
                });
                break;
            };

            let inner = &src[lt + 1..gt];
            let (kind, end) = match classify(inner) {
                TagClass::NonStructural => {
                    // 只跳过 `<`，标签留在文本里
                    cursor = lt + 1;
                    continue;
                }
                TagClass::Open { kind, self_closing } => {
                    (TokenKind::Open { kind, self_closing }, gt + 1)
                }
                TagClass::Close(kind) => (TokenKind::Close(kind), gt + 1),
                TagClass::SoundClose => (TokenKind::SoundClose, gt + 1),
                TagClass::Pause => (
                    TokenKind::Pause {
                        raw: inner.trim().to_string(),
                        duration: parse_pause_duration(inner),
                    },
                    gt + 1,
                ),
                TagClass::SoundOpen { self_closing: true } => {
                    (TokenKind::Sound(sound_attributes(inner, "")), gt + 1)
                }
                TagClass::SoundOpen {
                    self_closing: false,
                } => match sound_close.find(src, gt) {
                    // 描述里不能出现结构标签
                    Some(close) if !contains_structural_tag(&src[gt + 1..close]) => (
                        TokenKind::Sound(sound_attributes(inner, &src[gt + 1..close])),
                        close + SOUND_CLOSE.len(),
                    ),
                    _ => {
                        // 找不到闭合标签：降级为普通文本
                        self.notes.push(LexNote::UnclosedSound {
                            line: self.line_at(lt),
                        });
                        cursor = lt + 1;
                        continue;
                    }
                },
            };

            if pending < lt {
                tokens.push(self.token(TokenKind::Text, pending, lt));
            }
            let token = self.token(kind, lt, end);
            trace!(line = token.line, kind = ?token.kind, "token");
            tokens.push(token);
            pending = end;
            cursor = end;
        }

        if pending < src.len() {
            tokens.push(self.token(TokenKind::Text, pending, src.len()));
        }

        tokens
    }
}

/// 便捷函数：对文本做词法分析，忽略问题记录
pub fn tokenize(src: &str, start_line: usize) -> Vec<Token<'_>> {
    Lexer::new(src, start_line).run()
}
