//! # mixcastep - CASTEP 虚晶近似结果读取
//!
//! 从 CASTEP 的输入文件 (.cell) 和输出日志 (.castep) 中读取晶胞、坐标、
//! 受力、应力、能量以及 VCA 混合位点的占据权重。
//!
//! ```no_run
//! use mixcastep::parsers::{CastepReader, StructureReport, LAST_ITERATION};
//! use std::path::Path;
//!
//! let report = CastepReader::from_file(Path::new("FeNiO.castep"))?;
//! let cell = report.get_cell(LAST_ITERATION)?;
//! let sites = report.get_mixkey(LAST_ITERATION)?;
//! # Ok::<(), mixcastep::MixCastepError>(())
//! ```
//!
//! ## 依赖关系
//! ```text
//! lib.rs
//!   ├── parsers/   (定位、分段、字段提取、混合位点、两种读取器)
//!   ├── models/    (数据模型)
//!   ├── batch/     (批量并行处理)
//!   ├── utils/     (终端输出、进度条)
//!   └── error.rs   (错误处理)
//! ```

pub mod batch;
pub mod error;
pub mod models;
pub mod parsers;
pub mod utils;

pub use error::{MixCastepError, Result};
pub use models::{Crystal, KpointGrid, OccupancyMap, PositionKey, Site, Task};
pub use parsers::{open_report, CastepReader, CellReader, Report, StructureReport};
