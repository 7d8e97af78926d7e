//! # 数据模型模块
//!
//! 定义晶体结构、报告窗口和混合位点的数据模型。
//!
//! ## 依赖关系
//! - 被 `parsers/` 和 `commands/` 使用
//! - 子模块: structure, report, site

pub mod report;
pub mod site;
pub mod structure;

pub use report::{KpointGrid, Task, Window};
pub use site::{default_occupancy, OccupancyMap, PositionKey, Site};
pub use structure::{Atom, Configuration, Crystal, Lattice, Mat33};
