//! # Error 模块
//!
//! 定义 drama-core 中使用的错误类型。
//!
//! 解析与修复流程本身是容错的，永远不会返回 `Err`：
//! 解析过程中遇到的异常以 [`ParseIssue`] 的形式收集，交给诊断模块处理。
//! 唯一可能失败的公共 API 是配置加载（[`ConfigError`]）。

use thiserror::Error;

use crate::script::ast::ContainerKind;

/// 解析问题（非致命）
///
/// 解析器按"尽力而为"的策略继续工作，同时记录下这些问题。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseIssue {
    /// 闭合标签与最内层打开的容器不匹配
    ///
    /// 解析器仍然关闭最内层容器，不做重新平衡。
    #[error("第 {line} 行：闭合标签 </{found}> 与打开的 <{open}> 不匹配，已关闭最内层容器")]
    MismatchedClose {
        line: usize,
        found: ContainerKind,
        open: ContainerKind,
    },

    /// 没有任何打开的容器时出现闭合标签
    #[error("第 {line} 行：多余的闭合标签 </{found}>，已忽略")]
    StrayClose { line: usize, found: ContainerKind },

    /// 文档结束时仍未闭合的容器
    #[error("第 {line} 行：<{kind}> 未闭合，已在文末自动关闭")]
    UnclosedContainer { line: usize, kind: ContainerKind },

    /// `<sound>` 之后找不到 `</sound>`
    #[error("第 {line} 行：<sound> 缺少 </sound>，已按普通文本处理")]
    UnclosedSound { line: usize },

    /// 没有对应开始标签的 `</sound>`
    #[error("第 {line} 行：多余的 </sound>，已忽略")]
    StraySoundClose { line: usize },

    /// 停顿时长无法解析为数字
    #[error("第 {line} 行：无效的停顿时长 '{raw}'")]
    InvalidPause { line: usize, raw: String },

    /// 音量不是 0.0 - 1.0 之间的数字
    #[error("第 {line} 行：音效 '{name}' 的音量 '{raw}' 无效（应为 0.0 - 1.0）")]
    InvalidVolume {
        line: usize,
        name: String,
        raw: String,
    },

    /// `<` 之后再也没有 `>`
    #[error("第 {line} 行：标签未结束，剩余内容按普通文本处理")]
    UnterminatedTag { line: usize },
}

impl ParseIssue {
    /// 问题所在的行号（从 1 开始）
    pub fn line(&self) -> usize {
        match self {
            Self::MismatchedClose { line, .. }
            | Self::StrayClose { line, .. }
            | Self::UnclosedContainer { line, .. }
            | Self::UnclosedSound { line }
            | Self::StraySoundClose { line }
            | Self::InvalidPause { line, .. }
            | Self::InvalidVolume { line, .. }
            | Self::UnterminatedTag { line } => *line,
        }
    }
}

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 读取配置文件失败
    #[error("无法读取配置文件: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 格式错误
    #[error("配置格式错误: {0}")]
    Json(#[from] serde_json::Error),

    /// 配置项取值无效
    #[error("配置项 '{key}' 无效 - {message}")]
    Invalid { key: String, message: String },
}

/// Result 类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_issue_line() {
        let issue = ParseIssue::MismatchedClose {
            line: 7,
            found: ContainerKind::Parallel,
            open: ContainerKind::Sequential,
        };
        assert_eq!(issue.line(), 7);
        let msg = issue.to_string();
        assert!(msg.contains("第 7 行"));
        assert!(msg.contains("</parallel>"));
        assert!(msg.contains("<sequential>"));
    }

    #[test]
    fn test_config_error_from_json() {
        let err: ConfigError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, ConfigError::Json(_)));
        assert!(err.to_string().starts_with("配置格式错误"));
    }
}
