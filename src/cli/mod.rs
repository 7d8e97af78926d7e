//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `inspect`: 查看单个文件
//! - `collect`: 批量汇总 .castep 结果
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: inspect, collect

pub mod collect;
pub mod inspect;

use clap::{Parser, Subcommand};

/// mixcastep - CASTEP VCA 结果读取工具
#[derive(Parser)]
#[command(name = "mixcastep")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(about = "Read CASTEP .cell/.castep files with virtual crystal (mixed) sites", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Show what can be read from a single .cell or .castep file
    Inspect(inspect::InspectArgs),

    /// Summarise every .castep file under a directory and rank by enthalpy
    Collect(collect::CollectArgs),
}
