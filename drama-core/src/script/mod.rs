//! # Script 模块
//!
//! 剧本正文（`FINAL_TEXT` 段）的解析，包括节点树定义、词法分析与解析器。
//!
//! ## 模块结构
//!
//! - [`ast`]：节点树定义
//! - [`lexer`]：词法分析
//! - [`parser`]：栈式解析器

pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::*;
pub use parser::ScriptParser;
