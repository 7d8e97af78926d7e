//! # 解析器模块
//!
//! 读取 CASTEP 输入文件 (.cell) 和输出文件 (.castep)，两者都支持
//! VCA 混合位点。两个读取器实现同一个 [`StructureReport`] 接口。
//!
//! ## 依赖关系
//! - 被 `commands/` 模块使用
//! - 使用 `models/` 数据模型
//! - 子模块: markers, locate, segment, fields, mixture, cell, castep_out

pub mod castep_out;
pub mod cell;
pub mod fields;
pub mod locate;
pub mod markers;
pub mod mixture;
pub mod segment;

pub use castep_out::CastepReader;
pub use cell::CellReader;
pub use locate::{LineRange, Locator};
pub use segment::geom_range;

use crate::error::{MixCastepError, Result};
use crate::models::{KpointGrid, Mat33, OccupancyMap};
use std::collections::BTreeMap;
use std::path::Path;

/// 默认坐标比较容差
pub const DEFAULT_TOLERANCE: f64 = 1e-4;

/// 最后一次完成的迭代
pub const LAST_ITERATION: Option<isize> = Some(-1);

/// .cell 与 .castep 读取器的共同接口
///
/// 对 .cell 而言迭代序号没有意义，会被忽略。
pub trait StructureReport {
    /// 原子数
    fn atom_count(&self) -> usize;

    /// 坐标比较容差
    fn tolerance(&self) -> f64;

    /// MP k 点网格及偏移
    fn get_kpoints(&self) -> Result<KpointGrid>;

    /// 元素 -> 赝势，未给出时为 `None`
    fn get_psps(&self) -> Result<Option<BTreeMap<String, String>>>;

    /// 每个原子的元素符号
    fn get_elements(&self) -> &[String];

    /// 初始自旋（玻尔磁子），未设置时全为 0
    fn get_init_spin(&self) -> Result<Vec<f64>>;

    /// 位点占据映射
    fn get_mixkey(&self, iteration: Option<isize>) -> Result<OccupancyMap>;

    /// 分数坐标
    fn get_posns(&self, iteration: Option<isize>) -> Result<Vec<[f64; 3]>>;

    /// 外压 (GPa)，Voigt 顺序
    fn get_ext_press(&self) -> Result<[f64; 6]>;

    /// 晶胞约束（0 = 固定）
    fn get_cell_constrs(&self) -> Result<[i32; 6]>;

    /// 晶胞向量 (Å)
    fn get_cell(&self, iteration: Option<isize>) -> Result<Mat33>;
}

/// 按扩展名打开的报告
#[derive(Debug, Clone)]
pub enum Report {
    Cell(CellReader),
    Castep(CastepReader),
}

impl Report {
    pub fn as_structure(&self) -> &dyn StructureReport {
        match self {
            Report::Cell(r) => r,
            Report::Castep(r) => r,
        }
    }

    pub fn with_tolerance(self, tolerance: f64) -> Self {
        match self {
            Report::Cell(r) => Report::Cell(r.with_tolerance(tolerance)),
            Report::Castep(r) => Report::Castep(r.with_tolerance(tolerance)),
        }
    }
}

/// 从文件路径推断格式并打开
pub fn open_report(path: &Path) -> Result<Report> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "cell" => Ok(Report::Cell(CellReader::from_file(path)?)),
        "castep" => Ok(Report::Castep(CastepReader::from_file(path)?)),
        _ => Err(MixCastepError::InvalidArgument(format!(
            "Cannot determine format for: {} (expected .cell or .castep)",
            path.display()
        ))),
    }
}
