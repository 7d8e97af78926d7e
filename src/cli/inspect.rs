//! # inspect 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/inspect.rs`

use clap::Args;
use std::path::PathBuf;

/// inspect 子命令参数
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Input .cell or .castep file
    pub file: PathBuf,

    /// Iteration to report (negative counts from the end, e.g. -1 = last finished)
    #[arg(short, long, allow_hyphen_values = true)]
    pub iteration: Option<isize>,

    /// Distance tolerance when matching mixture rows to atoms (fractional units)
    #[arg(long, env = "MIXCASTEP_TOLERANCE", default_value_t = 1e-4)]
    pub tolerance: f64,

    /// Also print the per-iteration energy/enthalpy/Fmax history (.castep only)
    #[arg(long, default_value_t = false)]
    pub history: bool,
}
