//! # Repair 模块
//!
//! 把格式混乱的剧本文本（常见于生成式上游）改写为结构干净的文本。
//!
//! ## 流程
//!
//! ```text
//! 原文
//!   → 跨行标签      `<parallel` 换行 `>` 合并为一行
//!   → 标签别名      parallell / simultaneous → parallel ...
//!   → 标签提取      容器标签独占一行，音效与停顿从文本中提出
//!   → 补全闭合      文末与元数据标题前补上缺失的闭合标签
//!   → 建树          arena 块结构树
//!   → 删除空容器
//!   → 结构重组      parallel 内的对白分组，sequential 内对白与音效配对
//!   → 展平          同类容器的单子项嵌套
//!   → 序列化 + 缩进
//! ```
//!
//! 每一步都不会失败。修复是幂等的：`repair(repair(x)) == repair(x)`。
//!
//! ## 模块结构
//!
//! - `passes`: 建树前的文本步骤
//! - `tree`: arena 块结构树
//! - `format`: 缩进格式化

mod format;
mod passes;
mod tree;


use tracing::{debug, trace};

use crate::config::RepairConfig;
use crate::id::IdGenerator;
use crate::script::ScriptNode;

pub use format::reindent;
pub use passes::{
    balance_blocks, hoist_tags, join_split_sounds, join_split_tags, normalize_aliases,
};
pub use tree::{BlockId, Item, RepairTree};

/// 修复引擎
#[derive(Debug, Clone)]
pub struct RepairEngine {
    indent_width: usize,
}

impl Default for RepairEngine {
    fn default() -> Self {
        Self::new(&RepairConfig::default())
    }
}

impl RepairEngine {
    pub fn new(config: &RepairConfig) -> Self {
        Self {
            indent_width: config.indent_width,
        }
    }

    /// 执行建树及之前的全部步骤，返回重组、展平后的树
    pub fn repair_tree(&self, text: &str) -> RepairTree {
        let text = join_split_tags(text);
        let text = normalize_aliases(&text);
        trace!(pass = "alias", "修复步骤完成");
        let text = join_split_sounds(&text);
        let text = hoist_tags(&text);
        trace!(pass = "hoist", "修复步骤完成");
        let text = balance_blocks(&text);
        trace!(pass = "balance", "修复步骤完成");

        let mut tree = RepairTree::lift(&text);
        tree.prune_empty();
        tree.regroup();
        trace!(pass = "regroup", "修复步骤完成");
        tree.flatten();
        tree
    }

    /// 修复文本
    pub fn repair(&self, text: &str) -> String {
        let lines = self.repair_tree(text).to_lines();
        let output = reindent(&lines.join("\n"), self.indent_width);
        debug!(
            input_lines = text.lines().count(),
            output_lines = lines.len(),
            "剧本修复完成"
        );
        output.trim().to_string()
    }

    /// 修复并直接转换为节点树
    ///
    /// 结果与用解析器解析 [`RepairEngine::repair`] 的输出相同。
    pub fn repair_to_nodes<G>(&self, text: &str, ids: &mut G) -> Vec<ScriptNode>
    where
        G: IdGenerator + ?Sized,
    {
        self.repair_tree(text).to_nodes(ids)
    }
}
