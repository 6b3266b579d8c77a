//! # xtask - 开发辅助工具
//!
//! 提供本地质量门禁与剧本处理命令。
//!
//! ## 命令
//!
//! - `check-all`: 运行 fmt、clippy、test
//! - `script-check`: 检查剧本文件（结构问题、缺失段落、未描述的角色）
//! - `script-repair`: 修复剧本文件
//! - `script-dump`: 以 JSON 输出解析结果
//!
//! ```bash
//! cargo xtask script-check scripts/
//! cargo xtask script-repair scripts/crystal_cavern.txt --write
//! cargo xtask --config drama.json script-dump scripts/crystal_cavern.txt
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use walkdir::WalkDir;
use xshell::{Shell, cmd};

use drama_core::{
    DiagnosticLevel, DiagnosticResult, DramaConfig, RepairEngine, ScriptStats, StoryParser,
    analyze_parsed, analyze_story_with_config, roster,
};

/// 默认剧本目录（相对于 workspace root）
const DEFAULT_SCRIPTS_DIR: &str = "scripts";

/// 剧本文件扩展名
const SCRIPT_EXTENSIONS: &[&str] = &["txt", "md"];

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "开发辅助工具 - 质量门禁与剧本处理")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON 配置文件
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 修复时的缩进宽度（覆盖配置文件）
    #[arg(long, global = true)]
    indent_width: Option<usize>,

    /// 输出更详细的日志（-v: debug, -vv: trace）
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// 运行 fmt、clippy、test 门禁检查
    CheckAll,

    /// 检查剧本文件
    ///
    /// 不带参数时检查 scripts/ 下所有 .txt / .md 文件。
    ScriptCheck {
        /// 文件或目录
        path: Option<PathBuf>,
    },

    /// 修复剧本文件，默认输出到 stdout
    ScriptRepair {
        /// 文件或目录
        path: PathBuf,

        /// 覆盖原文件
        #[arg(long, conflicts_with = "check")]
        write: bool,

        /// 只检查，修复会改变文件时返回失败
        #[arg(long)]
        check: bool,
    },

    /// 以 JSON 输出解析结果（含统计、角色名单与诊断）
    ScriptDump {
        /// 剧本文件
        path: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = real_main(cli) {
        eprintln!("xtask error: {e:#}");
        return ExitCode::from(1);
    }
    ExitCode::from(0)
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn real_main(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref(), cli.indent_width)?;

    match cli.command {
        Commands::CheckAll => check_all(),
        Commands::ScriptCheck { path } => script_check(path.as_deref(), &config),
        Commands::ScriptRepair { path, write, check } => {
            script_repair(&path, &config, write, check)
        }
        Commands::ScriptDump { path } => script_dump(&path, &config),
    }
}

/// 配置优先级：命令行 > 配置文件 > 默认值
fn load_config(path: Option<&Path>, indent_width: Option<usize>) -> anyhow::Result<DramaConfig> {
    let mut config = match path {
        Some(path) => DramaConfig::load(path)
            .with_context(|| format!("无法加载配置文件 {}", path.display()))?,
        None => DramaConfig::default(),
    };
    if let Some(width) = indent_width {
        config.repair.indent_width = width;
        config.validate()?;
    }
    debug!(?config, "配置就绪");
    Ok(config)
}

//=============================================================================
// check-all 命令实现
//=============================================================================

fn check_all() -> anyhow::Result<()> {
    let sh = Shell::new()?;

    eprintln!("\n==> cargo fmt --all -- --check");
    cmd!(sh, "cargo fmt --all -- --check").run()?;

    eprintln!("\n==> cargo clippy --workspace --all-targets");
    cmd!(sh, "cargo clippy --workspace --all-targets").run()?;

    eprintln!("\n==> cargo test --workspace");
    cmd!(sh, "cargo test --workspace").run()?;

    Ok(())
}

//=============================================================================
// 剧本文件收集
//=============================================================================

fn is_script_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SCRIPT_EXTENSIONS.contains(&ext))
}

/// 收集文件或目录下的所有剧本文件
fn collect_script_files(path: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        anyhow::bail!("路径不存在: {}", path.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path) {
        let entry = entry?;
        if entry.file_type().is_file() && is_script_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

fn read_script(file: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(file).with_context(|| format!("无法读取文件 {}", file.display()))
}

//=============================================================================
// script-check 命令实现
//=============================================================================

fn script_check(path: Option<&Path>, config: &DramaConfig) -> anyhow::Result<()> {
    let root = path.unwrap_or(Path::new(DEFAULT_SCRIPTS_DIR));
    if path.is_none() && !root.exists() {
        anyhow::bail!(
            "默认剧本目录不存在: {}\n请在 workspace 根目录运行，或指定剧本路径",
            root.display()
        );
    }

    let files = collect_script_files(root)?;
    if files.is_empty() {
        eprintln!("未找到剧本文件（.txt / .md）");
        return Ok(());
    }

    eprintln!("==> 检查 {} 个剧本文件...\n", files.len());

    let mut diagnostics = DiagnosticResult::new();
    for file in &files {
        let content = read_script(file)?;
        let result = analyze_story_with_config(&file.display().to_string(), &content, config);
        info!(file = %file.display(), diagnostics = result.diagnostics.len(), "剧本检查完成");
        diagnostics.merge(result);
    }

    print_check_result(files.len(), &diagnostics);

    if diagnostics.has_errors() {
        anyhow::bail!("剧本检查发现错误");
    }
    Ok(())
}

/// 输出检查结果
fn print_check_result(checked: usize, result: &DiagnosticResult) {
    eprintln!("─────────────────────────────────────────────────────");
    eprintln!("检查完成: {} 个剧本", checked);
    eprintln!();

    for diag in &result.diagnostics {
        eprintln!("{}", diag);
    }

    let errors = result.error_count();
    let warns = result.warn_count();
    let infos = result.count(DiagnosticLevel::Info);

    eprintln!();
    match (errors, warns) {
        (0, 0) => eprintln!("✅ 检查通过，无错误（{infos} 条提示）"),
        (0, _) => eprintln!("⚠️  0 个错误, {warns} 个警告, {infos} 条提示"),
        _ => eprintln!("❌ {errors} 个错误, {warns} 个警告, {infos} 条提示"),
    }
}

//=============================================================================
// script-repair 命令实现
//=============================================================================

fn script_repair(
    path: &Path,
    config: &DramaConfig,
    write: bool,
    check: bool,
) -> anyhow::Result<()> {
    let engine = RepairEngine::new(&config.repair);
    let files = collect_script_files(path)?;
    let mut changed = Vec::new();

    for file in &files {
        let content = read_script(file)?;
        let repaired = engine.repair(&content);
        let differs = repaired.trim_end() != content.trim_end();
        debug!(file = %file.display(), differs, "剧本修复完成");

        if check {
            if differs {
                changed.push(file);
            }
        } else if write {
            if differs {
                std::fs::write(file, format!("{repaired}\n"))
                    .with_context(|| format!("无法写入文件 {}", file.display()))?;
                eprintln!("已修复: {}", file.display());
            }
        } else {
            if files.len() > 1 {
                println!("==> {}", file.display());
            }
            println!("{repaired}");
        }
    }

    if !changed.is_empty() {
        for file in &changed {
            eprintln!("需要修复: {}", file.display());
        }
        anyhow::bail!("{} 个剧本需要修复", changed.len());
    }
    Ok(())
}

//=============================================================================
// script-dump 命令实现
//=============================================================================

fn script_dump(path: &Path, config: &DramaConfig) -> anyhow::Result<()> {
    let content = read_script(path)?;
    let mut parser = StoryParser::new(config.clone());
    let story = parser.parse(&content);
    let stats = ScriptStats::collect(&story.script_nodes);
    let cast = roster(&story, &stats);
    let script_id = path.display().to_string();
    let diagnostics = analyze_parsed(
        &script_id,
        &story,
        parser.issues(),
        parser.missing_sections(),
    );

    let dump = serde_json::json!({
        "story": story,
        "stats": stats,
        "roster": cast,
        "diagnostics": diagnostics,
    });
    println!("{}", serde_json::to_string_pretty(&dump)?);
    Ok(())
}
