//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `mixcastep::parsers`, `mixcastep::batch`, `mixcastep::utils`
//! - 子模块: inspect, collect

pub mod collect;
pub mod inspect;

use crate::cli::Commands;
use mixcastep::Result;

/// 执行命令
pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Inspect(args) => inspect::execute(args),
        Commands::Collect(args) => collect::execute(args),
    }
}
