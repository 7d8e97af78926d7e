//! # mixcastep 命令行入口
//!
//! ## 子命令
//! - `inspect` - 查看单个 .cell / .castep 文件
//! - `collect` - 批量汇总目录下的 .castep 结果
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   └── commands/   (命令执行逻辑)
//!         └── mixcastep::{parsers, models, batch, utils}
//! ```

mod cli;
mod commands;

use clap::Parser;
use cli::Cli;
use mixcastep::utils::output;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    env_logger::init_from_env(env_logger::Env::new().filter_or("MIXCASTEP_LOG", "warn"));

    let cli = Cli::parse();

    if let Err(e) = commands::run(cli.command) {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
