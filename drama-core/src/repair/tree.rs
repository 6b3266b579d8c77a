//! # 修复树
//!
//! 修复流程中的块结构树。所有块存放在一个 arena 中，父子关系用下标表示；
//! 叶子是去掉首尾空白后的文本行。
//!
//! 根块对应整份文档，元数据标题行总是挂在根块下。

use std::collections::HashSet;

use crate::dialogue::speaker_prefix;
use crate::document::is_metadata_header;
use crate::id::IdGenerator;
use crate::script::lexer::{TagClass, TokenKind, tokenize};
use crate::script::{ContainerKind, NodeKind, ScriptNode};

use super::passes::{is_sound_line, is_speech_line, leading_tag};

/// 块在 arena 中的下标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(usize);

/// 块的子项
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Line(String),
    Block(BlockId),
}

#[derive(Debug, Clone)]
struct Block {
    /// `None` 表示根块
    kind: Option<ContainerKind>,
    parent: Option<BlockId>,
    children: Vec<Item>,
}

/// 修复树
#[derive(Debug, Clone)]
pub struct RepairTree {
    blocks: Vec<Block>,
}

impl Default for RepairTree {
    fn default() -> Self {
        Self::new()
    }
}

/// 说话人键：前缀小写，无法识别时为 `unknown`
fn speaker_key(line: &str) -> String {
    speaker_prefix(line).map_or_else(|| "unknown".to_string(), str::to_lowercase)
}

/// 一组对白是否为多人同时说话
///
/// 条件：每行说话人互不相同、至少两人、没有旁白。
fn is_simultaneous(lines: &[String]) -> bool {
    let roles: Vec<String> = lines.iter().map(|l| speaker_key(l)).collect();
    let distinct: HashSet<&str> = roles.iter().map(String::as_str).collect();
    distinct.len() == roles.len() && distinct.len() >= 2 && !distinct.contains("narration")
}

impl RepairTree {
    pub const ROOT: BlockId = BlockId(0);

    /// 只有根块的空树
    pub fn new() -> Self {
        Self {
            blocks: vec![Block {
                kind: None,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0]
    }

    fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.0]
    }

    /// 在 arena 中分配新块（尚未挂到父块的子项中）
    fn alloc(&mut self, kind: ContainerKind, parent: BlockId) -> BlockId {
        let id = BlockId(self.blocks.len());
        self.blocks.push(Block {
            kind: Some(kind),
            parent: Some(parent),
            children: Vec::new(),
        });
        id
    }

    /// 块的容器种类（根块返回 `None`）
    pub fn kind(&self, id: BlockId) -> Option<ContainerKind> {
        self.block(id).kind
    }

    /// 块的子项
    pub fn children(&self, id: BlockId) -> &[Item] {
        &self.block(id).children
    }

    /// 块的父块（根块返回 `None`）
    pub fn parent(&self, id: BlockId) -> Option<BlockId> {
        self.block(id).parent
    }

    /// 从逐行文本建树
    ///
    /// 容器标签必须独占一行。闭合标签总是回到父块（根块除外），
    /// 元数据标题把当前位置重置到根块。
    pub fn lift(text: &str) -> Self {
        let mut tree = Self::new();
        let mut current = Self::ROOT;

        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if is_metadata_header(line) {
                current = Self::ROOT;
                tree.block_mut(current)
                    .children
                    .push(Item::Line(line.to_string()));
                continue;
            }

            match leading_tag(line) {
                Some(TagClass::Open { kind, self_closing }) => {
                    let id = tree.alloc(kind, current);
                    tree.block_mut(current).children.push(Item::Block(id));
                    if !self_closing {
                        current = id;
                    }
                }
                Some(TagClass::Close(_)) => {
                    if let Some(parent) = tree.parent(current) {
                        current = parent;
                    }
                }
                _ => tree
                    .block_mut(current)
                    .children
                    .push(Item::Line(line.to_string())),
            }
        }

        tree
    }

    /// 从根块可达的所有块，子块在父块之前
    fn post_order(&self) -> Vec<BlockId> {
        let mut out = Vec::new();
        // (块, 子块是否已入栈)
        let mut stack = vec![(Self::ROOT, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                out.push(id);
                continue;
            }
            stack.push((id, true));
            for item in self.children(id).iter().rev() {
                if let Item::Block(child) = item {
                    stack.push((*child, false));
                }
            }
        }
        out
    }

    /// 递归删除空容器
    pub fn prune_empty(&mut self) {
        for id in self.post_order() {
            let mut children = std::mem::take(&mut self.block_mut(id).children);
            children.retain(|item| match item {
                Item::Block(child) => !self.children(*child).is_empty(),
                Item::Line(_) => true,
            });
            self.block_mut(id).children = children;
        }
    }

    /// 结构重组（自底向上，不处理根块）
    ///
    /// 重组过程中新建的块不会再被重组。
    pub fn regroup(&mut self) {
        for id in self.post_order() {
            match self.kind(id) {
                Some(ContainerKind::Parallel) => self.regroup_parallel(id),
                Some(ContainerKind::Sequential) => self.regroup_sequential(id),
                None => {}
            }
        }
    }

    /// parallel 内连续的对白：多人同时说话保持原样，否则包进新的 sequential
    fn regroup_parallel(&mut self, id: BlockId) {
        let children = std::mem::take(&mut self.block_mut(id).children);
        let mut regrouped = Vec::with_capacity(children.len());
        let mut run = Vec::new();

        for item in children {
            match item {
                Item::Line(line) if is_speech_line(&line) => run.push(line),
                other => {
                    self.flush_speech_run(id, &mut run, &mut regrouped);
                    regrouped.push(other);
                }
            }
        }
        self.flush_speech_run(id, &mut run, &mut regrouped);

        self.block_mut(id).children = regrouped;
    }

    fn flush_speech_run(&mut self, parent: BlockId, run: &mut Vec<String>, out: &mut Vec<Item>) {
        if run.len() < 2 || is_simultaneous(run) {
            out.extend(run.drain(..).map(Item::Line));
            return;
        }
        let seq = self.alloc(ContainerKind::Sequential, parent);
        self.block_mut(seq)
            .children
            .extend(run.drain(..).map(Item::Line));
        out.push(Item::Block(seq));
    }

    /// 子项是否只包含音效（不含停顿）
    fn is_pure_sound(&self, item: &Item) -> bool {
        let is_other_line = |item: &Item| matches!(item, Item::Line(line) if !is_sound_line(line));
        if is_other_line(item) {
            return false;
        }

        // 同一层的行先检查，再进入子块
        let mut stack = vec![item];
        while let Some(item) = stack.pop() {
            let Item::Block(id) = item else {
                continue;
            };
            let children = self.children(*id);
            if children.is_empty() || children.iter().any(is_other_line) {
                return false;
            }
            stack.extend(children.iter().filter(|c| matches!(c, Item::Block(_))));
        }
        true
    }

    /// sequential 内的对白与紧随其后的音效一起包进新的 parallel
    fn regroup_sequential(&mut self, id: BlockId) {
        let children = std::mem::take(&mut self.block_mut(id).children);
        let mut regrouped = Vec::with_capacity(children.len());
        let mut iter = children.into_iter().peekable();

        while let Some(item) = iter.next() {
            if !matches!(&item, Item::Line(line) if is_speech_line(line)) {
                regrouped.push(item);
                continue;
            }

            let mut sounds = Vec::new();
            while let Some(next) = iter.next_if(|next| self.is_pure_sound(next)) {
                sounds.push(next);
            }
            if sounds.is_empty() {
                regrouped.push(item);
                continue;
            }

            let par = self.alloc(ContainerKind::Parallel, id);
            for sound in &sounds {
                if let Item::Block(child) = sound {
                    self.block_mut(*child).parent = Some(par);
                }
            }
            let block = self.block_mut(par);
            block.children.push(item);
            block.children.extend(sounds);
            regrouped.push(Item::Block(par));
        }

        self.block_mut(id).children = regrouped;
    }

    /// 展平：sequential 的唯一子项是 sequential、parallel 的唯一子项是 parallel 时，
    /// 把孙子项提升一层
    pub fn flatten(&mut self) {
        for id in self.post_order() {
            let Some(kind) = self.kind(id) else {
                continue;
            };
            let [Item::Block(child)] = self.children(id) else {
                continue;
            };
            let child = *child;
            if self.kind(child) != Some(kind) {
                continue;
            }

            let grandchildren = std::mem::take(&mut self.block_mut(child).children);
            for item in &grandchildren {
                if let Item::Block(grandchild) = item {
                    self.block_mut(*grandchild).parent = Some(id);
                }
            }
            self.block_mut(id).children = grandchildren;
        }
    }

    /// 序列化为逐行文本（不缩进，每个标签独占一行）
    pub fn to_lines(&self) -> Vec<String> {
        enum Step<'a> {
            Item(&'a Item),
            Close(ContainerKind),
        }

        let mut lines = Vec::new();
        let mut stack: Vec<Step<'_>> = self
            .children(Self::ROOT)
            .iter()
            .rev()
            .map(Step::Item)
            .collect();
        while let Some(step) = stack.pop() {
            match step {
                Step::Close(kind) => lines.push(format!("</{kind}>")),
                Step::Item(Item::Line(line)) => lines.push(line.clone()),
                Step::Item(Item::Block(child)) => {
                    let Some(kind) = self.kind(*child) else {
                        continue;
                    };
                    lines.push(format!("<{kind}>"));
                    stack.push(Step::Close(kind));
                    stack.extend(self.children(*child).iter().rev().map(Step::Item));
                }
            }
        }
        lines
    }

    /// 直接转换为节点树，返回根块的子节点
    ///
    /// ID 分配顺序与行号都和解析 [`RepairTree::to_lines`] 的输出一致：
    /// 根容器占用第一个 ID，行号从 1 开始。
    pub fn to_nodes<G>(&self, ids: &mut G) -> Vec<ScriptNode>
    where
        G: IdGenerator + ?Sized,
    {
        /// 构建中的容器（`node` 为 `None` 表示根块）
        struct Frame<'a> {
            node: Option<ScriptNode>,
            children: Vec<ScriptNode>,
            items: std::slice::Iter<'a, Item>,
        }

        let _root = ids.next_id();
        let mut line = 1;
        let mut frames = vec![Frame {
            node: None,
            children: Vec::new(),
            items: self.children(Self::ROOT).iter(),
        }];

        while let Some(frame) = frames.last_mut() {
            match frame.items.next() {
                Some(Item::Line(text)) => {
                    frame
                        .children
                        .push(ScriptNode::new(ids.next_id(), Some(line), leaf_kind(text)));
                    line += 1;
                }
                Some(Item::Block(child)) => {
                    let Some(kind) = self.kind(*child) else {
                        continue;
                    };
                    let node = ScriptNode::container(ids.next_id(), Some(line), kind);
                    line += 1;
                    frames.push(Frame {
                        node: Some(node),
                        children: Vec::new(),
                        items: self.children(*child).iter(),
                    });
                }
                None => {
                    let children = std::mem::take(&mut frame.children);
                    let Some(mut node) = frame.node.take() else {
                        return children;
                    };
                    frames.pop();
                    // 闭合标签行
                    line += 1;
                    if let Some(slot) = node.children_mut() {
                        *slot = children;
                    }
                    if let Some(parent) = frames.last_mut() {
                        parent.children.push(node);
                    }
                }
            }
        }
        Vec::new()
    }
}

/// 叶子行对应的节点内容
fn leaf_kind(text: &str) -> NodeKind {
    let tokens = tokenize(text, 1);
    match tokens.as_slice() {
        [token] => match &token.kind {
            TokenKind::Sound(attrs) => NodeKind::Sound {
                attrs: attrs.clone(),
            },
            TokenKind::Pause { duration, .. } => NodeKind::Pause {
                duration: *duration,
            },
            _ => NodeKind::Text {
                content: text.to_string(),
            },
        },
        _ => NodeKind::Text {
            content: text.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::SequentialIds;
    use crate::script::shape_of;

    fn shape(tree: &RepairTree) -> String {
        shape_of(&tree.to_nodes(&mut SequentialIds::new()))
    }

    #[test]
    fn test_lift() {
        let tree = RepairTree::lift("<parallel>\nA: hi\n<sound name=\"x\">y</sound>\n</parallel>\n<#1#>");
        assert_eq!(shape(&tree), "par(text,sound),pause");
        let [Item::Block(par), Item::Line(_)] = tree.children(RepairTree::ROOT) else {
            panic!("unexpected root children");
        };
        assert_eq!(tree.parent(*par), Some(RepairTree::ROOT));
        assert_eq!(tree.kind(*par), Some(ContainerKind::Parallel));
    }

    #[test]
    fn test_lift_close_at_root_is_ignored() {
        let tree = RepairTree::lift("</parallel>\nA: hi");
        assert_eq!(shape(&tree), "text");
    }

    #[test]
    fn test_header_resets_to_root() {
        let tree = RepairTree::lift("<parallel>\nA: hi\nCHARACTER_GUIDE:\nA:");
        assert_eq!(shape(&tree), "par(text),text,text");
    }

    #[test]
    fn test_prune_empty_recursively() {
        let mut tree = RepairTree::lift("<parallel>\n<sequential>\n</sequential>\n</parallel>\n<parallel/>\nA: hi");
        tree.prune_empty();
        assert_eq!(shape(&tree), "text");
    }

    #[test]
    fn test_regroup_parallel_same_speaker() {
        let mut tree = RepairTree::lift("<parallel>\nA: one\nA: two\n</parallel>");
        tree.regroup();
        assert_eq!(shape(&tree), "par(seq(text,text))");
    }

    #[test]
    fn test_regroup_parallel_simultaneous() {
        let mut tree = RepairTree::lift("<parallel>\nA: one\nB(shout): two\n</parallel>");
        tree.regroup();
        assert_eq!(shape(&tree), "par(text,text)");
    }

    #[test]
    fn test_regroup_parallel_with_narration() {
        let mut tree = RepairTree::lift("<parallel>\nNarration: dusk\nA: one\n<sound name=\"x\">y</sound>\n</parallel>");
        tree.regroup();
        assert_eq!(shape(&tree), "par(seq(text,text),sound)");
    }

    #[test]
    fn test_regroup_parallel_repeated_speaker_is_not_simultaneous() {
        let mut tree = RepairTree::lift("<parallel>\nA: one\nB: two\nA: three\n</parallel>");
        tree.regroup();
        assert_eq!(shape(&tree), "par(seq(text,text,text))");
    }

    #[test]
    fn test_regroup_sequential_pairs_speech_with_sound() {
        let text = "<sequential>\nA: hi\n<sound name=\"x\">y</sound>\n<parallel>\n<sound name=\"z\">w</sound>\n</parallel>\n<#1#>\nB: bye\n<#2#>\n</sequential>";
        let mut tree = RepairTree::lift(text);
        tree.regroup();
        assert_eq!(shape(&tree), "seq(par(text,sound,par(sound)),pause,text,pause)");
    }

    #[test]
    fn test_root_is_not_regrouped() {
        let mut tree = RepairTree::lift("A: one\nA: two\n<sound name=\"x\">y</sound>");
        tree.regroup();
        assert_eq!(shape(&tree), "text,text,sound");
    }

    #[test]
    fn test_flatten() {
        let mut tree = RepairTree::lift(
            "<sequential>\n<sequential>\n<sequential>\nA: hi\n</sequential>\n</sequential>\n</sequential>\n<parallel>\n<parallel>\nB: x\nC: y\n</parallel>\n</parallel>\n<parallel>\n<sequential>\nD: z\n</sequential>\n</parallel>",
        );
        tree.flatten();
        assert_eq!(shape(&tree), "seq(text),par(text,text),par(seq(text))");
    }

    #[test]
    fn test_to_lines_and_node_lines() {
        let tree = RepairTree::lift("A: hi\n<parallel>\nB: yo\n</parallel>\nC: bye");
        assert_eq!(
            tree.to_lines(),
            vec!["A: hi", "<parallel>", "B: yo", "</parallel>", "C: bye"]
        );

        let nodes = tree.to_nodes(&mut SequentialIds::new());
        let lines: Vec<_> = nodes.iter().map(|n| n.line_number).collect();
        assert_eq!(lines, vec![Some(1), Some(2), Some(5)]);
        assert_eq!(nodes[1].children()[0].line_number, Some(3));
    }

    #[test]
    fn test_deep_nesting_without_recursion() {
        let depth = 50_000;
        let text = "<sequential>\nA: x\n".repeat(depth);
        let mut tree = RepairTree::lift(&text);
        tree.prune_empty();
        tree.regroup();
        tree.flatten();

        let lines = tree.to_lines();
        assert_eq!(lines.len(), depth * 3);
        assert_eq!(lines[0], "<sequential>");
        assert_eq!(lines.last().map(String::as_str), Some("</sequential>"));

        let nodes = tree.to_nodes(&mut SequentialIds::new());
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].line_number, Some(1));
    }
}
