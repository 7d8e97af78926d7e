//! # .castep 字段提取器
//!
//! 每个提取器在给定区间内找到一个锚点行，然后按固定行偏移和列号读取数值。
//! 迭代相关的量取区间内**最后**一个锚点（线搜索可能在一次迭代内打印多组力/应力，
//! 被接受的是最后一组）；头部信息取第一个锚点。
//!
//! 可选段落缺失时返回约定的默认值；必需段落缺失返回
//! [`MixCastepError::MandatoryAnchorMissing`]。
//!
//! ## 依赖关系
//! - 被 `parsers/castep_out.rs` 使用（`voigt_from_rows` 也被 `parsers/cell.rs` 使用）
//! - 使用 `parsers/locate.rs`, `parsers/markers.rs`

use super::locate::{LineRange, Locator};
use super::markers;
use crate::error::{MixCastepError, Result};
use crate::models::{KpointGrid, Mat33, Task};
use log::debug;
use std::collections::BTreeMap;
use std::str::FromStr;

// ─────────────────────────────────────────────────────────────
// 通用读取工具
// ─────────────────────────────────────────────────────────────

/// 取第 `idx` 行，越界视为报告被截断
pub(crate) fn line_at(lines: &[String], idx: usize) -> Result<&str> {
    lines
        .get(idx)
        .map(String::as_str)
        .ok_or_else(|| MixCastepError::parse(idx, "unexpected end of report"))
}

/// 第 `idx` 行第 `col` 个记号
pub(crate) fn token_at(lines: &[String], idx: usize, col: usize) -> Result<&str> {
    line_at(lines, idx)?
        .split_whitespace()
        .nth(col)
        .ok_or_else(|| MixCastepError::parse(idx, format!("missing column {}", col)))
}

/// 解析单个记号
pub(crate) fn parse_token<T: FromStr>(idx: usize, tok: &str) -> Result<T> {
    tok.parse::<T>()
        .map_err(|_| MixCastepError::parse(idx, format!("cannot parse '{}' as a number", tok)))
}

/// 从记号列表中按列取 3 个浮点数
fn parse_triple(idx: usize, tokens: &[&str], start: usize) -> Result<[f64; 3]> {
    let cols = tokens
        .get(start..start + 3)
        .ok_or_else(|| MixCastepError::parse(idx, format!("expected columns {}..{}", start, start + 3)))?;
    Ok([
        parse_token(idx, cols[0])?,
        parse_token(idx, cols[1])?,
        parse_token(idx, cols[2])?,
    ])
}

/// 读取从 `first` 行开始的 `count` 行，每行取 `start` 列起的 3 个数
fn read_rows(lines: &[String], first: usize, count: usize, start: usize) -> Result<Vec<[f64; 3]>> {
    (first..first + count)
        .map(|idx| {
            let tokens: Vec<&str> = line_at(lines, idx)?.split_whitespace().collect();
            parse_triple(idx, &tokens, start)
        })
        .collect()
}

fn read_matrix(lines: &[String], first: usize, start: usize) -> Result<Mat33> {
    let rows = read_rows(lines, first, 3, start)?;
    Ok([rows[0], rows[1], rows[2]])
}

fn require_last(lines: &[String], marks: &[&str], range: LineRange, context: &str) -> Result<usize> {
    Locator::new(lines)
        .last(marks, range)
        .ok_or_else(|| MixCastepError::missing(markers::describe(marks), context))
}

fn require_first(lines: &[String], marks: &[&str], range: LineRange, context: &str) -> Result<usize> {
    Locator::new(lines)
        .first(marks, range)
        .ok_or_else(|| MixCastepError::missing(markers::describe(marks), context))
}

// ─────────────────────────────────────────────────────────────
// 头部信息
// ─────────────────────────────────────────────────────────────

/// 原子数: "Total number of ions in cell =    8"
pub fn read_nions(lines: &[String]) -> Result<usize> {
    let idx = require_first(lines, markers::NIONS, LineRange::full(), "ion count")?;
    parse_token(idx, token_at(lines, idx, 7)?)
}

/// 计算任务: "type of calculation                            : geometry optimization"
pub fn read_task(lines: &[String]) -> Result<Task> {
    let idx = require_first(lines, markers::TASK, LineRange::full(), "task")?;
    token_at(lines, idx, 4)?.parse()
}

/// 是否出现 "Total time" 结束标记
pub fn is_complete(lines: &[String]) -> bool {
    Locator::new(lines)
        .first(markers::COMPLETE, LineRange::full())
        .is_some()
}

/// 已完成的迭代数
pub fn count_iterations(lines: &[String], task: Task, complete: bool) -> usize {
    match task {
        Task::Single => usize::from(complete),
        Task::Geometry => Locator::new(lines)
            .all(markers::ENTHALPY, LineRange::full())
            .len(),
    }
}

/// 元素列表，取报告中第一张原子坐标表
pub fn read_elements(lines: &[String], nions: usize) -> Result<Vec<String>> {
    let idx = require_first(lines, markers::ELEMENT_TABLE, LineRange::full(), "atom table")?;
    (idx + 3..idx + 3 + nions)
        .map(|i| token_at(lines, i, 1).map(String::from))
        .collect()
}

/// MP 网格: "MP grid size for SCF calculation is  4  4  1"
pub fn read_kpoints(lines: &[String]) -> Result<KpointGrid> {
    let Some(idx) = Locator::new(lines).first(markers::MP_GRID, LineRange::full()) else {
        debug!("no MP grid in report, using default {:?}", KpointGrid::DEFAULT_GRID);
        return Ok(KpointGrid::default());
    };
    parse_grid(lines, idx)
}

/// 行末 3 个整数作为 k 点网格
pub(crate) fn parse_grid(lines: &[String], idx: usize) -> Result<KpointGrid> {
    let tokens: Vec<&str> = line_at(lines, idx)?.split_whitespace().collect();
    if tokens.len() < 3 {
        return Err(MixCastepError::parse(idx, "expected 3 k-point divisions"));
    }
    let tail = &tokens[tokens.len() - 3..];
    Ok(KpointGrid::new([
        parse_token(idx, tail[0])?,
        parse_token(idx, tail[1])?,
        parse_token(idx, tail[2])?,
    ]))
}

/// 赝势文件表，直到空行为止
pub fn read_psps(lines: &[String]) -> Result<Option<BTreeMap<String, String>>> {
    let Some(idx) = Locator::new(lines).first(markers::PSPS_FILES, LineRange::full()) else {
        debug!("no pseudopotential table in report");
        return Ok(None);
    };

    let mut pseudos = BTreeMap::new();
    for i in idx + 1..lines.len() {
        let tokens: Vec<&str> = lines[i].split_whitespace().collect();
        match tokens.as_slice() {
            [] => break,
            [elem, psp] => {
                pseudos.insert(elem.to_string(), psp.to_string());
            }
            _ => return Err(MixCastepError::parse(i, "expected '<element> <pseudopotential>'")),
        }
    }
    Ok(Some(pseudos))
}

/// 外压，Voigt 顺序
pub fn read_ext_press(lines: &[String]) -> Result<[f64; 6]> {
    let Some(idx) = Locator::new(lines).first(markers::EXT_PRESSURE, LineRange::full()) else {
        debug!("no external pressure in report, assuming zero");
        return Ok([0.0; 6]);
    };
    voigt_from_rows(lines, idx + 1)
}

/// 由三角形打印的 3 行压力块组装 Voigt 向量
///
/// ```text
/// P00 P01 P02
/// P11 P12
/// P22
/// ```
/// 结果为 `[P00, P11, P22, P12, P02, P01]`。
pub(crate) fn voigt_from_rows(lines: &[String], first: usize) -> Result<[f64; 6]> {
    let cell = |row: usize, col: usize| -> Result<f64> {
        let idx = first + row;
        parse_token(idx, token_at(lines, idx, col)?)
    };
    Ok([
        cell(0, 0)?,
        cell(1, 0)?,
        cell(2, 0)?,
        cell(1, 1)?,
        cell(0, 2)?,
        cell(0, 1)?,
    ])
}

/// 晶胞约束: "Cell constraints are:  1 1 3 0 0 0"
pub fn read_cell_constrs(lines: &[String]) -> Result<[i32; 6]> {
    let Some(idx) = Locator::new(lines).first(markers::CELL_CONSTRAINTS, LineRange::full()) else {
        debug!("no cell constraints in report, assuming unconstrained");
        return Ok(markers::NO_CELL_CONSTRAINTS);
    };

    let mut constrs = [0; 6];
    for (j, c) in constrs.iter_mut().enumerate() {
        *c = parse_token(idx, token_at(lines, idx, 3 + j)?)?;
    }
    Ok(constrs)
}

// ─────────────────────────────────────────────────────────────
// 迭代相关的量
// ─────────────────────────────────────────────────────────────

/// 分数坐标
pub fn read_positions(lines: &[String], range: LineRange, nions: usize) -> Result<Vec<[f64; 3]>> {
    let idx = require_last(lines, markers::ELEMENT_TABLE, range, "atom table")?;
    read_rows(lines, idx + 3, nions, 3)
}

/// 晶胞向量
pub fn read_cell(lines: &[String], range: LineRange) -> Result<Mat33> {
    let idx = require_last(lines, markers::REAL_LATTICE, range, "lattice")?;
    read_matrix(lines, idx + 1, 0)
}

/// 原子受力，去掉 `(mixed)` 标注与 `(cons'd)` 后缀
pub fn read_forces(lines: &[String], range: LineRange, nions: usize) -> Result<Vec<[f64; 3]>> {
    let idx = require_last(lines, markers::FORCES, range, "forces")?;
    (idx + 6..idx + 6 + nions)
        .map(|i| {
            let cleaned: Vec<String> = line_at(lines, i)?
                .split_whitespace()
                .filter(|t| *t != markers::MIXED_TAG)
                .map(|t| t.replace(markers::CONSTRAINED_SUFFIX, ""))
                .collect();
            let tokens: Vec<&str> = cleaned.iter().map(String::as_str).collect();
            parse_triple(i, &tokens, 3)
        })
        .collect()
}

/// 应力张量
pub fn read_stresses(lines: &[String], range: LineRange) -> Result<Mat33> {
    let idx = require_last(lines, markers::STRESS, range, "stress tensor")?;
    read_matrix(lines, idx + 6, 2)
}

/// 总能量，新旧两种写法
pub fn read_energy(lines: &[String], range: LineRange) -> Result<f64> {
    let locator = Locator::new(lines);
    let find = |marks: &[&str], col: usize| -> Result<f64> {
        let idx = locator
            .last(marks, range)
            .ok_or_else(|| MixCastepError::SectionNotFound {
                marker: markers::describe(marks),
            })?;
        parse_token(idx, token_at(lines, idx, col)?)
    };

    match find(markers::FINAL_ENERGY, 4) {
        Err(MixCastepError::SectionNotFound { .. }) => {
            find(markers::FINAL_ENERGY_OLD, 3).map_err(|e| match e {
                MixCastepError::SectionNotFound { .. } => MixCastepError::missing(
                    format!(
                        "{}' | '{}",
                        markers::describe(markers::FINAL_ENERGY),
                        markers::describe(markers::FINAL_ENERGY_OLD)
                    ),
                    "final energy",
                ),
                other => other,
            })
        }
        other => other,
    }
}

/// 焓: "BFGS: finished iteration     1 with enthalpy= -2.1e+02 eV"
pub fn read_enthalpy(lines: &[String], range: LineRange) -> Result<f64> {
    let idx = require_last(lines, markers::ENTHALPY, range, "enthalpy")?;
    parse_token(idx, token_at(lines, idx, 6)?)
}

// ─────────────────────────────────────────────────────────────
// 自旋
// ─────────────────────────────────────────────────────────────

/// 初始自旋，表不存在时全部为 0
pub fn read_init_spin(lines: &[String], nions: usize) -> Result<Vec<f64>> {
    let Some(idx) = Locator::new(lines).first(markers::INITIAL_SPIN, LineRange::full()) else {
        debug!("no initial magnetic moments in report");
        return Ok(vec![0.0; nions]);
    };
    (idx + 3..idx + 3 + nions)
        .map(|i| parse_token(i, token_at(lines, i, 4)?))
        .collect()
}

/// 最终 Mulliken 自旋，表不存在视为错误
pub fn read_final_spin(lines: &[String], nions: usize) -> Result<Vec<f64>> {
    let idx = Locator::new(lines)
        .last(markers::MULLIKEN, LineRange::full())
        .ok_or_else(|| {
            MixCastepError::missing(
                markers::describe(markers::MULLIKEN),
                "could not find final atomic populations, did the calculation complete?",
            )
        })?;

    let header = line_at(lines, idx + 2)?;
    if !(header.contains("spin") || header.contains("Spin")) {
        return Ok(vec![0.0; nions]);
    }

    let factor = spin_scale(header.split_whitespace().last().unwrap_or_default())?;
    (idx + 4..idx + 4 + nions)
        .map(|i| {
            let tok = line_at(lines, i)?
                .split_whitespace()
                .last()
                .ok_or_else(|| MixCastepError::parse(i, "empty population row"))?;
            Ok(parse_token::<f64>(i, tok)? * factor)
        })
        .collect()
}

/// 自旋单位换算因子
pub fn spin_scale(unit: &str) -> Result<f64> {
    match unit {
        "(hbar)" => Ok(2.0),
        "(hbar/2)" => Ok(1.0),
        other => Err(MixCastepError::UnrecognizedScaleFactor(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(String::from).collect()
    }

    #[test]
    fn test_forces_strip_annotations() {
        let text = r#"
 ******************** Forces ********************
 *                                              *
 *               Cartesian components (eV/A)    *
 * -------------------------------------------- *
 *                   x         y         z      *
 * -------------------------------------------- *
 * Fe       1 (mixed)  0.10000  -0.20000   0.30000(cons'd) *
 * O        1      -0.40000   0.50000(cons'd)  -0.60000 *
 ************************************************
"#;
        let lines = lines(text);
        let forces = read_forces(&lines, LineRange::full(), 2).unwrap();

        assert_eq!(forces[0], [0.1, -0.2, 0.3]);
        assert_eq!(forces[1], [-0.4, 0.5, -0.6]);
    }

    #[test]
    fn test_forces_take_last_block() {
        let text = "* Forces *\n\n\n\n\n\n* Fe 1 1.0 1.0 1.0 *\n* Forces *\n\n\n\n\n\n* Fe 1 2.0 2.0 2.0 *";
        let lines = lines(text);
        let forces = read_forces(&lines, LineRange::full(), 1).unwrap();
        assert_eq!(forces[0], [2.0, 2.0, 2.0]);

        let forces = read_forces(&lines, LineRange::new(0, 7), 1).unwrap();
        assert_eq!(forces[0], [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_stress_tensor() {
        let text = r#" ***************** Symmetrised Stress Tensor *****************
 *                                                           *
 *          Cartesian components (GPa)                       *
 * --------------------------------------------------------- *
 *             x             y             z                 *
 * --------------------------------------------------------- *
 *  x     -1.500000      0.100000      0.200000              *
 *  y      0.100000     -1.600000      0.300000              *
 *  z      0.200000      0.300000     -1.700000              *
"#;
        let lines = lines(text);
        let stress = read_stresses(&lines, LineRange::full()).unwrap();

        assert_eq!(stress[0], [-1.5, 0.1, 0.2]);
        assert_eq!(stress[2], [0.2, 0.3, -1.7]);
    }

    #[test]
    fn test_energy_fallback() {
        let new = lines("Final energy, E             =  -1234.5 eV");
        assert_eq!(read_energy(&new, LineRange::full()).unwrap(), -1234.5);

        let old = lines("Final energy =  -987.25 eV");
        assert_eq!(read_energy(&old, LineRange::full()).unwrap(), -987.25);

        let none = lines("no energy at all");
        assert!(matches!(
            read_energy(&none, LineRange::full()),
            Err(MixCastepError::MandatoryAnchorMissing { .. })
        ));
    }

    #[test]
    fn test_energy_parse_error_is_not_swallowed() {
        let bad = lines("Final energy, E             =  garbage eV\nFinal energy =  -1.0 eV");
        assert!(matches!(
            read_energy(&bad, LineRange::full()),
            Err(MixCastepError::ParseError { line: 1, .. })
        ));
    }

    #[test]
    fn test_ext_press_voigt() {
        let text = "External pressure/stress (GPa)\n 1.0 6.0 5.0\n 2.0 4.0\n 3.0";
        let lines = lines(text);
        assert_eq!(read_ext_press(&lines).unwrap(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert!(read_ext_press(&lines[..1]).is_err());
        assert_eq!(read_ext_press(&[]).unwrap(), [0.0; 6]);
    }

    #[test]
    fn test_cell_constraints() {
        let l = lines(" Cell constraints are:  0 0 0 0 0 0");
        assert_eq!(read_cell_constrs(&l).unwrap(), [0; 6]);
        assert_eq!(read_cell_constrs(&[]).unwrap(), [1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_kpoints() {
        let l = lines("   MP grid size for SCF calculation is  4  4  1");
        let k = read_kpoints(&l).unwrap();
        assert_eq!(k.grid, [4, 4, 1]);
        assert_eq!(k.offset, [0.0, 0.0, 0.25]);
        assert_eq!(read_kpoints(&[]).unwrap().grid, [5, 5, 1]);
    }

    #[test]
    fn test_psps_until_blank() {
        let text = " Files used for pseudopotentials:\n Fe Fe_00.usp\n O O_00.usp\n\n Ni not-read.usp";
        let psps = read_psps(&lines(text)).unwrap().unwrap();
        assert_eq!(psps.len(), 2);
        assert_eq!(psps["Fe"], "Fe_00.usp");
        assert!(read_psps(&[]).unwrap().is_none());
    }

    #[test]
    fn test_spin_scale() {
        assert_eq!(spin_scale("(hbar)").unwrap(), 2.0);
        assert_eq!(spin_scale("(hbar/2)").unwrap(), 1.0);
        assert!(matches!(
            spin_scale("(bohr)"),
            Err(MixCastepError::UnrecognizedScaleFactor(s)) if s == "(bohr)"
        ));
    }

    #[test]
    fn test_final_spin_scaled() {
        let table = |unit: &str| {
            lines(&format!(
                "     Atomic Populations (Mulliken)\n     ---\nSpecies Ion s p d f Total Charge (e) Spin {}\n=====\n  Fe 1 0.4 0.6 6.9 0.0 7.9 0.10 1.5",
                unit
            ))
        };
        assert_eq!(read_final_spin(&table("(hbar/2)"), 1).unwrap(), vec![1.5]);
        assert_eq!(read_final_spin(&table("(hbar)"), 1).unwrap(), vec![3.0]);
        assert!(read_final_spin(&table("(furlong)"), 1).is_err());
        assert!(matches!(
            read_final_spin(&[], 1),
            Err(MixCastepError::MandatoryAnchorMissing { .. })
        ));
    }

    #[test]
    fn test_init_spin_absent_is_zero() {
        assert_eq!(read_init_spin(&[], 3).unwrap(), vec![0.0; 3]);
    }
}
