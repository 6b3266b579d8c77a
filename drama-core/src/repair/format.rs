//! # 缩进格式化

use crate::document::is_metadata_header;
use crate::script::lexer::TagClass;

use super::passes::leading_tag;

/// 缩进层数上限，更深的行与该层对齐
const MAX_INDENT_DEPTH: usize = 32;

/// 按嵌套深度重新缩进
///
/// 闭合标签之前深度减一，开始标签之后深度加一，元数据标题处深度归零。
/// 空行被丢弃。
pub fn reindent(text: &str, width: usize) -> String {
    let mut depth = 0usize;
    let mut out = Vec::new();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let tag = leading_tag(line);
        if matches!(tag, Some(TagClass::Close(_))) {
            depth = depth.saturating_sub(1);
        }
        if is_metadata_header(line) {
            depth = 0;
        }

        out.push(format!("{}{}", " ".repeat(depth.min(MAX_INDENT_DEPTH) * width), line));

        if matches!(
            tag,
            Some(TagClass::Open {
                self_closing: false,
                ..
            })
        ) {
            depth += 1;
        }
    }

    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reindent() {
        let text = "<parallel>\n<sequential>\nA: hi\n</sequential>\n<parallel/>\nB: yo\n</parallel>";
        assert_eq!(
            reindent(text, 4),
            "<parallel>\n    <sequential>\n        A: hi\n    </sequential>\n    <parallel/>\n    B: yo\n</parallel>"
        );
        assert_eq!(reindent("<parallel>\nA\n</parallel>", 2), "<parallel>\n  A\n</parallel>");
    }

    #[test]
    fn test_reindent_resets_at_header() {
        let text = "<parallel>\nA: hi\nENHANCED_TEXT:\nmore\n</parallel>\n</parallel>";
        assert_eq!(
            reindent(text, 4),
            "<parallel>\n    A: hi\nENHANCED_TEXT:\nmore\n</parallel>\n</parallel>"
        );
    }

    #[test]
    fn test_reindent_depth_is_capped() {
        let text = format!("{}A: deep", "<sequential>\n".repeat(40));
        let out = reindent(&text, 2);
        let last = out.lines().last().unwrap();
        assert_eq!(last.len() - last.trim_start().len(), MAX_INDENT_DEPTH * 2);
        assert_eq!(last.trim_start(), "A: deep");
    }
}
