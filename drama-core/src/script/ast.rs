//! # AST 模块
//!
//! 定义剧本正文（`FINAL_TEXT` 段）解析后的节点树。
//!
//! ## 设计说明
//!
//! 整棵树在每次解析时从零构建，构建完成后对使用者只读。
//! 正文总是被包裹在一个隐式的根 `Sequential` 容器中，
//! 对外只暴露根容器的子节点。

use serde::{Deserialize, Serialize};

use crate::id::NodeId;

/// 容器种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    /// 子节点同时发生
    Parallel,
    /// 子节点按顺序发生
    Sequential,
}

impl ContainerKind {
    /// 标签名（小写）
    pub fn tag_name(self) -> &'static str {
        match self {
            Self::Parallel => "parallel",
            Self::Sequential => "sequential",
        }
    }

    /// 按标签名识别容器种类（大小写不敏感）
    pub fn from_tag_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("parallel") {
            Some(Self::Parallel)
        } else if name.eq_ignore_ascii_case("sequential") {
            Some(Self::Sequential)
        } else {
            None
        }
    }
}

impl std::fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag_name())
    }
}

/// 音效属性
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundAttributes {
    /// 音效名称（缺省为 `SFX`）
    pub name: String,
    /// 音效描述（`<sound>` 与 `</sound>` 之间的文本）
    pub description: String,
    /// 原始音量字符串，不做校验
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub volume: Option<String>,
    /// 是否循环
    #[serde(rename = "loop", default)]
    pub looping: bool,
}

impl SoundAttributes {
    /// 音量数值
    ///
    /// 无法解析时返回 `None`；超出 0.0 - 1.0 的值原样返回。
    pub fn volume_level(&self) -> Option<f64> {
        self.volume.as_deref()?.trim().parse::<f64>().ok()
    }
}

/// 节点内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum NodeKind {
    /// 一行对白或旁白，不含结构标签
    ///
    /// `content` 是去掉首尾空白的源文本行，缩进不保留；需要原始缩进时按
    /// `line_number` 回到源文本读取。
    Text { content: String },

    /// 音效
    Sound {
        #[serde(rename = "attributes")]
        attrs: SoundAttributes,
    },

    /// 停顿（秒），非数字输入得到 NaN
    Pause { duration: f64 },

    /// 同时发生的子节点
    Parallel { children: Vec<ScriptNode> },

    /// 按顺序发生的子节点
    Sequential { children: Vec<ScriptNode> },
}

/// 脚本节点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptNode {
    /// 本次解析内唯一的 ID
    pub id: NodeId,
    /// 源文本行号（从 1 开始）
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub line_number: Option<usize>,
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl ScriptNode {
    pub fn new(id: NodeId, line_number: Option<usize>, kind: NodeKind) -> Self {
        Self {
            id,
            line_number,
            kind,
        }
    }

    /// 创建空容器
    pub fn container(id: NodeId, line_number: Option<usize>, kind: ContainerKind) -> Self {
        let kind = match kind {
            ContainerKind::Parallel => NodeKind::Parallel {
                children: Vec::new(),
            },
            ContainerKind::Sequential => NodeKind::Sequential {
                children: Vec::new(),
            },
        };
        Self::new(id, line_number, kind)
    }

    /// 容器种类（叶子节点返回 `None`）
    pub fn container_kind(&self) -> Option<ContainerKind> {
        match self.kind {
            NodeKind::Parallel { .. } => Some(ContainerKind::Parallel),
            NodeKind::Sequential { .. } => Some(ContainerKind::Sequential),
            _ => None,
        }
    }

    /// 子节点（叶子节点返回空切片）
    pub fn children(&self) -> &[ScriptNode] {
        match &self.kind {
            NodeKind::Parallel { children } | NodeKind::Sequential { children } => children,
            _ => &[],
        }
    }

    /// 可变子节点列表（仅容器）
    pub fn children_mut(&mut self) -> Option<&mut Vec<ScriptNode>> {
        match &mut self.kind {
            NodeKind::Parallel { children } | NodeKind::Sequential { children } => Some(children),
            _ => None,
        }
    }

    /// 取出子节点（叶子节点返回空列表）
    pub fn into_children(mut self) -> Vec<ScriptNode> {
        self.children_mut().map(std::mem::take).unwrap_or_default()
    }

    /// 文本内容（仅 Text 节点）
    pub fn as_text(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Text { content } => Some(content),
            _ => None,
        }
    }

    /// 音效属性（仅 Sound 节点）
    pub fn as_sound(&self) -> Option<&SoundAttributes> {
        match &self.kind {
            NodeKind::Sound { attrs } => Some(attrs),
            _ => None,
        }
    }

    /// 停顿时长（仅 Pause 节点）
    pub fn as_pause(&self) -> Option<f64> {
        match self.kind {
            NodeKind::Pause { duration } => Some(duration),
            _ => None,
        }
    }

    /// 结构签名：忽略 ID 与行号，只保留节点种类与嵌套
    ///
    /// 例如 `par(text,sound)`。用于比较两棵树的形状。
    pub fn shape(&self) -> String {
        shape_of(std::slice::from_ref(self))
    }

    /// 深度优先遍历（先序）
    ///
    /// 使用显式栈，嵌套深度不受调用栈限制。
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a ScriptNode)) {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            visit(node);
            stack.extend(node.children().iter().rev());
        }
    }
}

/// 逐层释放子节点，避免深层嵌套时递归析构
impl Drop for ScriptNode {
    fn drop(&mut self) {
        let Some(children) = self.children_mut() else {
            return;
        };
        let mut stack = std::mem::take(children);
        while let Some(mut node) = stack.pop() {
            if let Some(grandchildren) = node.children_mut() {
                stack.append(grandchildren);
            }
        }
    }
}

/// 节点列表的结构签名
pub fn shape_of(nodes: &[ScriptNode]) -> String {
    enum Step<'a> {
        /// 节点，以及前面是否需要逗号
        Node(&'a ScriptNode, bool),
        Close,
    }

    fn push_all<'a>(stack: &mut Vec<Step<'a>>, nodes: &'a [ScriptNode]) {
        stack.extend(
            nodes
                .iter()
                .enumerate()
                .rev()
                .map(|(index, node)| Step::Node(node, index > 0)),
        );
    }

    let mut out = String::new();
    let mut stack = Vec::new();
    push_all(&mut stack, nodes);

    while let Some(step) = stack.pop() {
        let Step::Node(node, comma) = step else {
            out.push(')');
            continue;
        };
        if comma {
            out.push(',');
        }
        match &node.kind {
            NodeKind::Text { .. } => out.push_str("text"),
            NodeKind::Sound { .. } => out.push_str("sound"),
            NodeKind::Pause { .. } => out.push_str("pause"),
            NodeKind::Parallel { children } => {
                out.push_str("par(");
                stack.push(Step::Close);
                push_all(&mut stack, children);
            }
            NodeKind::Sequential { children } => {
                out.push_str("seq(");
                stack.push(Step::Close);
                push_all(&mut stack, children);
            }
        }
    }
    out
}
