//! # Config 模块
//!
//! 解析与修复选项，集中管理所有配置项。
//!
//! ## 配置优先级
//!
//! 1. 命令行参数（最高，由 xtask 覆盖）
//! 2. 配置文件（JSON）
//! 3. 默认值（最低）

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// 全部配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DramaConfig {
    /// 解析配置
    #[serde(default)]
    pub parse: ParseConfig,

    /// 修复配置
    #[serde(default)]
    pub repair: RepairConfig,
}

/// 解析配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseConfig {
    /// 缺少 `STORY_TITLE` 时使用的标题
    #[serde(default = "default_untitled_title")]
    pub untitled_title: String,

    /// 解析前先对整份文档执行修复
    ///
    /// 开启后，节点行号对应修复后的文本。
    #[serde(default)]
    pub auto_repair: bool,
}

/// 修复配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairConfig {
    /// 每层缩进的空格数
    #[serde(default = "default_indent_width")]
    pub indent_width: usize,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            untitled_title: default_untitled_title(),
            auto_repair: false,
        }
    }
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            indent_width: default_indent_width(),
        }
    }
}

// 默认值函数
fn default_untitled_title() -> String {
    "Untitled Story".to_string()
}

fn default_indent_width() -> usize {
    4
}

/// 缩进宽度上限
const MAX_INDENT_WIDTH: usize = 16;

impl DramaConfig {
    /// 从 JSON 字符串解析配置并校验
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// 加载配置文件
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config = Self::from_json_str(&content)?;
        debug!(path = %path.display(), "配置文件加载成功");
        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> ConfigResult<()> {
        if !(1..=MAX_INDENT_WIDTH).contains(&self.repair.indent_width) {
            return Err(ConfigError::Invalid {
                key: "repair.indent_width".to_string(),
                message: format!("必须在 1 - {MAX_INDENT_WIDTH} 之间"),
            });
        }
        if self.parse.untitled_title.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "parse.untitled_title".to_string(),
                message: "不能为空".to_string(),
            });
        }
        Ok(())
    }
}
