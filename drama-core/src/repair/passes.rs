//! # 文本修复步骤
//!
//! 建树之前的逐行文本修复：跨行标签合并与标签别名、标签提取、补全闭合标签。
//! 每个步骤都是全函数，任何输入都会得到输出。

use std::borrow::Cow;

use crate::document::is_metadata_header;
use crate::script::ContainerKind;
use crate::script::lexer::{
    NextMatch, SOUND_CLOSE, TagClass, classify, contains_structural_tag, find_structural_tag,
};
use crate::script::parser::helpers::split_tag;

/// 标签别名表（大小写不敏感）
const TAG_ALIASES: &[(&str, &str)] = &[
    ("parallel", "parallel"),
    ("parallell", "parallel"),
    ("paralel", "parallel"),
    ("simultaneous", "parallel"),
    ("sequential", "sequential"),
    ("sequencial", "sequential"),
    ("sequental", "sequential"),
    ("sound", "sound"),
];

/// 标签名的规范写法
pub(crate) fn canonical_tag_name(name: &str) -> Option<&'static str> {
    TAG_ALIASES
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(name))
        .map(|&(_, canonical)| canonical)
}

/// 行首标签的分类（行不以 `<` 开头或标签未结束时返回 `None`）
pub(crate) fn leading_tag(line: &str) -> Option<TagClass> {
    let rest = line.trim_start().strip_prefix('<')?;
    let gt = rest.find('>')?;
    Some(classify(&rest[..gt]))
}

/// 是否为音效行
pub(crate) fn is_sound_line(line: &str) -> bool {
    matches!(leading_tag(line), Some(TagClass::SoundOpen { .. }))
}

/// 是否为对白/旁白行：不以任何标签开头
pub(crate) fn is_speech_line(line: &str) -> bool {
    !line.trim_start().starts_with('<')
}

//=============================================================================
// 步骤 1：跨行标签与标签别名
//=============================================================================

/// 行内最后一个 `>` 之后的第一个 `<`，即没有在本行结束的标签
fn unterminated_tag_start(line: &str) -> Option<usize> {
    let from = line.rfind('>').map_or(0, |gt| gt + 1);
    line[from..].find('<').map(|lt| lt + from)
}

/// 每行及之后第一个满足条件的行
fn next_matching_line(lines: &[&str], pred: impl Fn(&str) -> bool) -> Vec<Option<usize>> {
    let mut next = vec![None; lines.len()];
    let mut found = None;
    for (index, &line) in lines.iter().enumerate().rev() {
        if pred(line) {
            found = Some(index);
        }
        next[index] = found;
    }
    next
}

/// 逐行文本及其预先计算的查找表
struct SplitLines<'a> {
    lines: Vec<&'a str>,
    next_gt: Vec<Option<usize>>,
    next_header: Vec<Option<usize>>,
}

impl<'a> SplitLines<'a> {
    fn new(text: &'a str) -> Self {
        let lines: Vec<&str> = text.split('\n').collect();
        let next_gt = next_matching_line(&lines, |l| l.contains('>'));
        let next_header = next_matching_line(&lines, is_metadata_header);
        Self {
            lines,
            next_gt,
            next_header,
        }
    }

    /// `line` 结尾的未结束标签与后续行拼起来是结构标签时，返回 `>` 所在行
    ///
    /// `last` 是 `line` 的最后一个物理行。途中遇到元数据标题则放弃。
    fn tag_end(&self, line: &str, last: usize) -> Option<usize> {
        let start = unterminated_tag_start(line)?;
        let end = self.next_gt.get(last + 1).copied().flatten()?;
        let header = self.next_header.get(last + 1).copied().flatten();
        if header.is_some_and(|h| h <= end) {
            return None;
        }

        // 标签名最多落在其后第二个非空行（`</` 换行 `parallel`），之后的内容不影响分类
        let gt = self.lines[end].find('>')?;
        let mut tail = String::new();
        let mut non_blank = 0;
        let rest = self.lines[last + 1..end].iter().copied();
        for l in rest.chain(std::iter::once(&self.lines[end][..gt])) {
            tail.push('\n');
            tail.push_str(l);
            if !l.trim().is_empty() {
                non_blank += 1;
                if non_blank == 2 {
                    break;
                }
            }
        }

        // 行内每个 `<` 都以同一个 `>` 结束
        let head = &line[start..];
        head.match_indices('<')
            .any(|(lt, _)| {
                let inner = format!("{}{tail}", &head[lt + 1..]);
                classify(&inner) != TagClass::NonStructural
            })
            .then_some(end)
    }
}

/// 把 `<` 与 `>` 不在同一行的结构标签合并到一行
///
/// 合并后的各行去掉首尾空白，以空格连接。非结构标签（如 `a < b` 换行后出现的 `>`）不受影响。
pub fn join_split_tags(text: &str) -> String {
    let split = SplitLines::new(text);
    let lines = &split.lines;

    let mut out: Vec<Cow<'_, str>> = Vec::with_capacity(lines.len());
    let mut index = 0;
    while index < lines.len() {
        let mut line = Cow::Borrowed(lines[index]);
        let mut last = index;
        while let Some(end) = split.tag_end(&line, last) {
            let joined = std::iter::once(line.trim())
                .chain(lines[last + 1..=end].iter().map(|l| l.trim()))
                .filter(|l| !l.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            line = Cow::Owned(joined);
            last = end;
        }
        out.push(line);
        index = last + 1;
    }

    out.join("\n")
}

/// 把拼错的标签名改成规范写法，已知标签名统一小写
///
/// 属性原样保留；标签不会跨行。
pub fn normalize_aliases(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(lt) = rest.find('<') {
        out.push_str(&rest[..lt]);
        let tail = &rest[lt + 1..];
        match tail.find(['<', '>', '\n']) {
            Some(end) if tail.as_bytes()[end] == b'>' => {
                out.push('<');
                out.push_str(&normalize_tag(&tail[..end]));
                out.push('>');
                rest = &tail[end + 1..];
            }
            _ => {
                out.push('<');
                rest = tail;
            }
        }
    }
    out.push_str(rest);

    out
}

fn normalize_tag(inner: &str) -> Cow<'_, str> {
    let (closing, name, attrs) = split_tag(inner);
    let Some(canonical) = canonical_tag_name(name) else {
        return Cow::Borrowed(inner);
    };

    let mut tag = String::with_capacity(inner.len());
    if closing {
        tag.push('/');
    }
    tag.push_str(canonical);
    if !attrs.is_empty() {
        if !attrs.starts_with('/') {
            tag.push(' ');
        }
        tag.push_str(attrs);
    }
    Cow::Owned(tag)
}

//=============================================================================
// 步骤 2：标签提取
//=============================================================================

/// 行内最后一个 `<sound>` 是否缺少同一行内的 `</sound>`
fn has_dangling_sound(line: &str) -> bool {
    let mut dangling = false;
    let mut rest = line;
    while let Some(lt) = rest.find('<') {
        let after = &rest[lt + 1..];
        let Some(gt) = after.find('>') else {
            break;
        };
        match classify(&after[..gt]) {
            TagClass::NonStructural => {
                rest = after;
                continue;
            }
            TagClass::SoundOpen {
                self_closing: false,
            } => dangling = true,
            _ => dangling = false,
        }
        rest = &after[gt + 1..];
    }
    dangling
}

/// 从 `from` 行开始查找 `</sound>` 所在行
///
/// 途中遇到结构标签或元数据标题则放弃。
fn find_sound_close_line(lines: &[&str], from: usize) -> Option<usize> {
    for (index, line) in lines.iter().enumerate().skip(from) {
        if is_metadata_header(line) {
            return None;
        }
        match line.find(SOUND_CLOSE) {
            Some(pos) => return (!contains_structural_tag(&line[..pos])).then_some(index),
            None if contains_structural_tag(line) => return None,
            None => {}
        }
    }
    None
}

/// 把跨行的 `<sound>...</sound>` 合并到一行
pub fn join_split_sounds(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out: Vec<Cow<'_, str>> = Vec::with_capacity(lines.len());

    let mut index = 0;
    while index < lines.len() {
        let line = lines[index];
        let close = has_dangling_sound(line)
            .then(|| find_sound_close_line(&lines, index + 1))
            .flatten();

        match close {
            Some(end) => {
                let joined = lines[index..=end]
                    .iter()
                    .map(|l| l.trim())
                    .filter(|l| !l.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
                out.push(Cow::Owned(joined));
                index = end + 1;
            }
            None => {
                out.push(Cow::Borrowed(line));
                index += 1;
            }
        }
    }

    out.join("\n")
}

/// 一行中的片段
enum Piece<'a> {
    /// 普通文本（可能包含非结构标签）
    Prose(&'a str),
    /// 容器开闭标签
    Block(&'a str),
    /// 音效元素或停顿
    Inline(Cow<'a, str>),
}

/// 把一行切成片段；多余的 `</sound>` 被丢弃，未闭合的 `<sound>` 就地补全
fn split_pieces(line: &str) -> Vec<Piece<'_>> {
    let mut pieces = Vec::new();
    let mut pending = 0;
    let mut cursor = 0;
    let mut sound_close = NextMatch::new(SOUND_CLOSE);

    while let Some(lt) = line[cursor..].find('<').map(|p| p + cursor) {
        let Some(gt) = line[lt..].find('>').map(|p| p + lt) else {
            break;
        };

        let (piece, end) = match classify(&line[lt + 1..gt]) {
            TagClass::NonStructural => {
                cursor = lt + 1;
                continue;
            }
            TagClass::Open { .. } | TagClass::Close(_) => {
                (Some(Piece::Block(&line[lt..=gt])), gt + 1)
            }
            TagClass::Pause | TagClass::SoundOpen { self_closing: true } => {
                (Some(Piece::Inline(Cow::Borrowed(&line[lt..=gt]))), gt + 1)
            }
            TagClass::SoundClose => (None, gt + 1),
            TagClass::SoundOpen {
                self_closing: false,
            } => {
                let body = &line[gt + 1..];
                let close = sound_close.find(line, gt + 1).map(|pos| pos - (gt + 1));
                let (description, end) = match close {
                    Some(close) if !contains_structural_tag(&body[..close]) => {
                        (&body[..close], gt + 1 + close + SOUND_CLOSE.len())
                    }
                    // 缺少闭合标签：描述截止到下一个结构标签
                    _ => {
                        let desc_end = find_structural_tag(body).unwrap_or(body.len());
                        (&body[..desc_end], gt + 1 + desc_end)
                    }
                };
                let element = format!("{}{}{}", &line[lt..=gt], description.trim(), SOUND_CLOSE);
                (Some(Piece::Inline(Cow::Owned(element))), end)
            }
        };

        if pending < lt {
            pieces.push(Piece::Prose(&line[pending..lt]));
        }
        pieces.extend(piece);
        pending = end;
        cursor = end;
    }

    if pending < line.len() {
        pieces.push(Piece::Prose(&line[pending..]));
    }
    pieces
}

fn flush_segment<'a>(
    prose: &mut Vec<&'a str>,
    inline: &mut Vec<Cow<'a, str>>,
    out: &mut Vec<Cow<'a, str>>,
) {
    let text = prose.concat();
    if inline.is_empty() {
        let text = text.trim();
        if !text.is_empty() {
            out.push(Cow::Owned(text.to_string()));
        }
    } else {
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !collapsed.is_empty() {
            out.push(Cow::Owned(collapsed));
        }
        out.append(inline);
    }
    prose.clear();
}

fn hoist_line<'a>(line: &'a str, out: &mut Vec<Cow<'a, str>>) {
    if !line.contains('<') {
        out.push(Cow::Borrowed(line));
        return;
    }

    let mut prose = Vec::new();
    let mut inline = Vec::new();
    for piece in split_pieces(line) {
        match piece {
            Piece::Prose(text) => prose.push(text),
            Piece::Inline(tag) => inline.push(tag),
            Piece::Block(tag) => {
                flush_segment(&mut prose, &mut inline, out);
                out.push(Cow::Borrowed(tag));
            }
        }
    }
    flush_segment(&mut prose, &mut inline, out);
}

/// 容器标签独占一行；音效与停顿从文本中提取出来，各占一行，
/// 剩余文本（合并空白）放在它们之前
pub fn hoist_tags(text: &str) -> String {
    let mut out = Vec::new();
    for line in text.split('\n') {
        hoist_line(line, &mut out);
    }
    out.join("\n")
}

//=============================================================================
// 步骤 3：补全闭合标签
//=============================================================================

fn close_all(open: &mut Vec<ContainerKind>, out: &mut Vec<Cow<'_, str>>) {
    while let Some(kind) = open.pop() {
        out.push(Cow::Owned(format!("</{kind}>")));
    }
}

/// 为未闭合的容器补上闭合标签
///
/// 闭合标签只有与栈顶一致时才出栈。补全的位置是文末，以及每个元数据标题之前。
pub fn balance_blocks(text: &str) -> String {
    let mut out = Vec::new();
    let mut open = Vec::new();

    for line in text.split('\n') {
        if is_metadata_header(line) {
            close_all(&mut open, &mut out);
        }
        match leading_tag(line) {
            Some(TagClass::Open {
                kind,
                self_closing: false,
            }) => open.push(kind),
            Some(TagClass::Close(kind)) if open.last() == Some(&kind) => {
                open.pop();
            }
            _ => {}
        }
        out.push(Cow::Borrowed(line));
    }
    close_all(&mut open, &mut out);

    out.join("\n")
}
