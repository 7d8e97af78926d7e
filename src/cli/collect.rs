//! # collect 子命令 CLI 定义
//!
//! 批量读取 .castep 结果并按焓排序
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/collect.rs`

use clap::Args;
use std::path::PathBuf;

/// collect 子命令参数
#[derive(Args, Debug)]
pub struct CollectArgs {
    /// Directory containing .castep files (or a single .castep file)
    pub input: PathBuf,

    /// Glob pattern for input files (comma separated)
    #[arg(long, default_value = "*.castep")]
    pub pattern: String,

    /// Recurse into subdirectories
    #[arg(long, default_value_t = false)]
    pub recursive: bool,

    /// Number of parallel jobs (0 = auto)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// Distance tolerance when matching mixture rows to atoms (fractional units)
    #[arg(long, env = "MIXCASTEP_TOLERANCE", default_value_t = 1e-4)]
    pub tolerance: f64,

    /// Include calculations that did not finish
    #[arg(long, default_value_t = false)]
    pub include_incomplete: bool,

    /// Number of top structures to print
    #[arg(long, default_value_t = 10)]
    pub top_n: usize,

    /// Filename for the CSV summary
    #[arg(short, long, default_value = "mixcastep_summary.csv")]
    pub output: PathBuf,
}
