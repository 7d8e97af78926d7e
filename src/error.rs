//! # 统一错误处理模块
//!
//! 定义 mixcastep 的所有错误类型，使用 `thiserror` 派生。
//!
//! 可选段落缺失不是错误：提取器会直接返回文档约定的默认值。
//! 这里只列出必须上抛给调用者的情况。
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// mixcastep 统一错误类型
#[derive(Error, Debug)]
pub enum MixCastepError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 报告结构错误
    // ─────────────────────────────────────────────────────────────
    #[error("Section '{marker}' not found")]
    SectionNotFound { marker: String },

    #[error("Mandatory section '{marker}' not found{}", context_suffix(.context))]
    MandatoryAnchorMissing { marker: String, context: String },

    #[error("Cannot extract information for iteration {iteration} since only {available} have been performed")]
    IterationOutOfRange { iteration: isize, available: usize },

    #[error("Do not recognise task: {0}")]
    UnrecognizedTask(String),

    #[error("Scale factor for spins: {0} not recognised")]
    UnrecognizedScaleFactor(String),

    #[error("The site {position} ({element}) could not be matched to any position")]
    UnmatchedMixtureSite { position: String, element: String },

    #[error("{query} is not applicable to a {task} calculation")]
    NotApplicable { query: String, task: String },

    // ─────────────────────────────────────────────────────────────
    // 解析错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse line {line}: {reason}")]
    ParseError { line: usize, reason: String },

    // ─────────────────────────────────────────────────────────────
    // 参数错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ─────────────────────────────────────────────────────────────
    // CSV 错误
    // ─────────────────────────────────────────────────────────────
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

fn context_suffix(context: &str) -> String {
    if context.is_empty() {
        String::new()
    } else {
        format!(" ({})", context)
    }
}

impl MixCastepError {
    /// 必需锚点缺失
    pub fn missing(marker: impl Into<String>, context: impl Into<String>) -> Self {
        MixCastepError::MandatoryAnchorMissing {
            marker: marker.into(),
            context: context.into(),
        }
    }

    /// 指定行解析失败（行号从 1 开始显示）
    pub fn parse(index: usize, reason: impl Into<String>) -> Self {
        MixCastepError::ParseError {
            line: index + 1,
            reason: reason.into(),
        }
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, MixCastepError>;
