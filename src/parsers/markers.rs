//! # 锚点标记表
//!
//! 所有锚点字符串集中在这里。每个常量是一组可互换的写法（大小写、
//! 是否对称化等随 CASTEP 版本变化），任一匹配即可。
//! 新版本输出格式变化时在这里追加写法，不要替换已有写法。
//!
//! ## 依赖关系
//! - 被 `parsers/` 内各提取器使用

// ─────────────────────────────────────────────────────────────
// .castep 结果日志
// ─────────────────────────────────────────────────────────────

pub const NIONS: &[&str] = &["Total number of ions in cell"];
pub const TASK: &[&str] = &["type of calculation                            :"];
pub const COMPLETE: &[&str] = &["Total time          ="];
pub const FINISHED_ITERATION: &[&str] = &["finished iteration"];
pub const ENTHALPY: &[&str] = &["with enthalpy="];

pub const ELEMENT_TABLE: &[&str] = &["Element "];
pub const REAL_LATTICE: &[&str] = &["Real Lattice(A)"];
pub const FORCES: &[&str] = &["* Forces *", "* Symmetrised Forces *"];
pub const STRESS: &[&str] = &["* Stress Tensor *", "* Symmetrised Stress Tensor *"];
pub const FINAL_ENERGY: &[&str] = &["Final energy, E"];
pub const FINAL_ENERGY_OLD: &[&str] = &["Final energy ="];

pub const MP_GRID: &[&str] = &["MP grid size for SCF calculation is"];
pub const PSPS_FILES: &[&str] = &["Files used for pseudopotentials:"];
pub const EXT_PRESSURE: &[&str] = &["External pressure/stress (GPa)"];
pub const CELL_CONSTRAINTS: &[&str] = &["Cell constraints are:"];
pub const INITIAL_SPIN: &[&str] = &["Initial magnetic"];
pub const MULLIKEN: &[&str] = &["Atomic Populations (Mulliken)"];
pub const MIXTURE: &[&str] = &["Mixture"];

/// 混合块数据行的首个记号
pub const MIXTURE_ROW: &str = "x";

/// 力表中混合原子的标注
pub const MIXED_TAG: &str = "(mixed)";

/// 受约束力分量的后缀
pub const CONSTRAINED_SUFFIX: &str = "(cons'd)";

// ─────────────────────────────────────────────────────────────
// .cell 输入文件
// ─────────────────────────────────────────────────────────────

pub const CELL_KPOINTS: &[&str] = &["kpoints_mp_grid", "KPOINTS_MP_GRID"];

pub const CELL_SPECIES_POT: &[&str] = &[
    "%block species_pot",
    "%BLOCK species_pot",
    "%BLOCK SPECIES_POT",
];
pub const CELL_SPECIES_POT_END: &[&str] = &[
    "%endblock species_pot",
    "%ENDBLOCK species_pot",
    "%ENDBLOCK SPECIES_POT",
];

pub const CELL_POSITIONS: &[&str] = &[
    "%block positions_frac",
    "%BLOCK positions_frac",
    "%BLOCK POSITIONS_FRAC",
    "%block positions_abs",
    "%BLOCK positions_abs",
    "%BLOCK POSITIONS_ABS",
];

pub const CELL_EXT_PRESSURE: &[&str] = &[
    "%block external_pressure",
    "%BLOCK external_pressure",
    "%BLOCK EXTERNAL_PRESSURE",
];

pub const CELL_CONSTRAINTS_BLOCK: &[&str] = &[
    "%block cell_constraints",
    "%BLOCK cell_constraints",
    "%BLOCK CELL_CONSTRAINTS",
];

/// 无约束时的晶胞约束
pub const NO_CELL_CONSTRAINTS: [i32; 6] = [1, 2, 3, 4, 5, 6];

/// 人类可读的标记描述（用于错误消息）
pub fn describe(markers: &[&str]) -> String {
    markers.join("' | '")
}
