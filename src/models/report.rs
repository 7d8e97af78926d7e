//! # 报告相关的数据模型
//!
//! 计算任务类型、迭代行窗口、k 点网格。
//!
//! ## 依赖关系
//! - 被 `parsers/` 使用
//! - 无外部模块依赖

use crate::error::{MixCastepError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// CASTEP 计算任务
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Task {
    /// 单点能计算
    Single,
    /// 几何优化
    Geometry,
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Single => write!(f, "single"),
            Task::Geometry => write!(f, "geometry"),
        }
    }
}

impl FromStr for Task {
    type Err = MixCastepError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "single" => Ok(Task::Single),
            "geometry" => Ok(Task::Geometry),
            other => Err(MixCastepError::UnrecognizedTask(other.to_string())),
        }
    }
}

/// 一次迭代对应的行区间 `[lmin, lmax)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub lmin: usize,
    pub lmax: usize,
}

impl Window {
    pub fn new(lmin: usize, lmax: usize) -> Self {
        Window { lmin, lmax }
    }
}

/// Monkhorst-Pack k 点网格
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpointGrid {
    /// 每个方向的 k 点数
    pub grid: [u32; 3],
    /// 网格偏移
    pub offset: [f64; 3],
}

impl KpointGrid {
    /// 未给出网格时使用的默认值
    pub const DEFAULT_GRID: [u32; 3] = [5, 5, 1];

    /// 偶数方向不偏移，奇数方向偏移 1/(4k)
    pub fn new(grid: [u32; 3]) -> Self {
        let offset = grid.map(|k| {
            if k % 2 == 0 {
                0.0
            } else {
                1.0 / (4.0 * k as f64)
            }
        });
        KpointGrid { grid, offset }
    }
}

impl Default for KpointGrid {
    fn default() -> Self {
        KpointGrid::new(Self::DEFAULT_GRID)
    }
}
