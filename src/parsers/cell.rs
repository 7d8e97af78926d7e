//! # CASTEP .cell 输入文件
//!
//! 两部分：
//! - [`parse_cell_content`]: 把 .cell 解析为 [`Crystal`]（晶格 + 原子），
//!   作为读取器的结构来源
//! - [`CellReader`]: 结构量（坐标、晶胞、元素）取自外部提供的
//!   [`Configuration`]，其余（k 点、赝势、自旋、混合、外压、约束）从文本读取
//!
//! ## .cell 格式说明
//! ```text
//! %BLOCK LATTICE_CART
//! ang
//! a1 a2 a3
//! b1 b2 b3
//! c1 c2 c3
//! %ENDBLOCK LATTICE_CART
//!
//! %BLOCK POSITIONS_FRAC
//! Fe 0.0 0.0 0.0 MIXTURE:( 1 0.7 ) SPIN=2.0
//! Ni 0.0 0.0 0.0 MIXTURE:( 1 0.3 )
//! O  0.5 0.5 0.5
//! %ENDBLOCK POSITIONS_FRAC
//!
//! kpoints_mp_grid 4 4 1
//! ```
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs`, `commands/inspect.rs` 使用
//! - 使用 `models/structure.rs`, `parsers/fields.rs`, `parsers/mixture.rs`

use super::fields::{line_at, parse_grid, parse_token, voigt_from_rows};
use super::locate::{LineRange, Locator};
use super::mixture::{position_rows, resolve_deck_mixtures};
use super::{markers, StructureReport, DEFAULT_TOLERANCE};
use crate::error::{MixCastepError, Result};
use crate::models::{Atom, Configuration, Crystal, KpointGrid, Lattice, Mat33, OccupancyMap};
use log::debug;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

/// 1 Bohr 对应的埃
const BOHR_TO_ANG: f64 = 0.529_177_210_903;

// ─────────────────────────────────────────────────────────────
// 结构解析
// ─────────────────────────────────────────────────────────────

/// 解析 .cell 文件
pub fn parse_cell_file(path: &Path) -> Result<Crystal> {
    let content = read_text(path)?;
    parse_cell_content(
        &content,
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown"),
    )
}

/// 从字符串内容解析 .cell 格式
pub fn parse_cell_content(content: &str, default_name: &str) -> Result<Crystal> {
    let lines: Vec<&str> = content.lines().collect();

    let lattice = if let Some(start) = find_block_start(&lines, "LATTICE_CART") {
        parse_lattice_cart(&lines, start)?
    } else if let Some(start) = find_block_start(&lines, "LATTICE_ABC") {
        parse_lattice_abc(&lines, start)?
    } else {
        return Err(MixCastepError::missing(
            "%BLOCK LATTICE_CART' | '%BLOCK LATTICE_ABC",
            default_name,
        ));
    };

    let atoms = if let Some(start) = find_block_start(&lines, "POSITIONS_FRAC") {
        parse_positions(&lines, start)?.0
    } else if let Some(start) = find_block_start(&lines, "POSITIONS_ABS") {
        let (atoms_abs, scale) = parse_positions(&lines, start)?;
        atoms_abs
            .into_iter()
            .map(|atom| {
                let cart = atom.position.map(|x| x * scale);
                lattice
                    .to_fractional(cart)
                    .map(|frac| Atom::new(atom.element, frac))
                    .ok_or_else(|| MixCastepError::parse(start, "singular lattice, cannot convert POSITIONS_ABS"))
            })
            .collect::<Result<Vec<_>>>()?
    } else {
        return Err(MixCastepError::missing(
            "%BLOCK POSITIONS_FRAC' | '%BLOCK POSITIONS_ABS",
            default_name,
        ));
    };

    let mut crystal = Crystal::new(default_name, lattice, atoms);
    crystal.source_format = Some("cell".to_string());

    Ok(crystal)
}

/// 查找 %BLOCK XXX 的起始行号（不区分大小写）
fn find_block_start(lines: &[&str], block_name: &str) -> Option<usize> {
    let pattern = format!("%BLOCK {}", block_name);
    lines
        .iter()
        .position(|line| line.trim().to_uppercase().starts_with(&pattern))
}

/// 块内的有效行（跳过注释和空行），附带行号
fn block_rows<'s, 'a>(lines: &'s [&'a str], start: usize) -> impl Iterator<Item = (usize, &'a str)> + 's {
    lines
        .iter()
        .enumerate()
        .skip(start + 1)
        .map(|(i, line)| (i, (*line).trim()))
        .take_while(|(_, line)| !line.to_uppercase().starts_with("%ENDBLOCK"))
        .filter(|(_, line)| !(line.is_empty() || line.starts_with('#') || line.starts_with('!')))
}

/// 单位行换算到埃，不是单位行返回 `None`
fn unit_scale(line: &str) -> Option<f64> {
    match line.to_lowercase().as_str() {
        "ang" => Some(1.0),
        "bohr" => Some(BOHR_TO_ANG),
        "nm" => Some(10.0),
        _ => None,
    }
}

/// 解析 LATTICE_CART 块
fn parse_lattice_cart(lines: &[&str], start: usize) -> Result<Lattice> {
    let mut matrix = [[0.0; 3]; 3];
    let mut row_idx = 0;
    let mut scale = 1.0;

    for (i, line) in block_rows(lines, start) {
        if let Some(s) = unit_scale(line) {
            scale = s;
            continue;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() >= 3 && row_idx < 3 {
            for (j, v) in matrix[row_idx].iter_mut().enumerate() {
                *v = parse_token::<f64>(i, parts[j])? * scale;
            }
            row_idx += 1;
        }
    }

    if row_idx < 3 {
        return Err(MixCastepError::parse(start, "incomplete LATTICE_CART block"));
    }

    Ok(Lattice::from_vectors(matrix))
}

/// 解析 LATTICE_ABC 块
fn parse_lattice_abc(lines: &[&str], start: usize) -> Result<Lattice> {
    let mut params: Vec<f64> = Vec::new();
    let mut scale = 1.0;

    for (i, line) in block_rows(lines, start) {
        if let Some(s) = unit_scale(line) {
            scale = s;
            continue;
        }
        for part in line.split_whitespace() {
            params.push(parse_token(i, part)?);
        }
    }

    if params.len() < 6 {
        return Err(MixCastepError::parse(
            start,
            "incomplete LATTICE_ABC block (need a b c alpha beta gamma)",
        ));
    }

    Ok(Lattice::from_parameters(
        params[0] * scale,
        params[1] * scale,
        params[2] * scale,
        params[3],
        params[4],
        params[5],
    ))
}

/// 解析原子位置块，返回原子和坐标单位换算
///
/// 元素和三个坐标之后的标注（MIXTURE、SPIN 等）在这里忽略。
fn parse_positions(lines: &[&str], start: usize) -> Result<(Vec<Atom>, f64)> {
    let mut atoms = Vec::new();
    let mut scale = 1.0;

    for (i, line) in block_rows(lines, start) {
        if let Some(s) = unit_scale(line) {
            scale = s;
            continue;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 4 {
            return Err(MixCastepError::parse(i, "expected '<element> x y z'"));
        }
        let position = [
            parse_token(i, parts[1])?,
            parse_token(i, parts[2])?,
            parse_token(i, parts[3])?,
        ];
        atoms.push(Atom::new(parts[0], position));
    }

    Ok((atoms, scale))
}

pub(crate) fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| MixCastepError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })
}

// ─────────────────────────────────────────────────────────────
// 输入文件读取器
// ─────────────────────────────────────────────────────────────

/// .cell 输入文件读取器
#[derive(Debug, Clone)]
pub struct CellReader<C = Crystal> {
    lines: Vec<String>,
    config: C,
    elements: Vec<String>,
    positions: Vec<[f64; 3]>,
    tolerance: f64,
}

impl CellReader<Crystal> {
    /// 读取 .cell 文件，结构由内置解析器提供
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = read_text(path)?;
        let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or("unknown");
        Self::from_content(&content, name)
    }

    pub fn from_content(content: &str, name: &str) -> Result<Self> {
        let crystal = parse_cell_content(content, name)?;
        Ok(Self::new(content, crystal))
    }
}

impl<C: Configuration> CellReader<C> {
    /// 文本 + 外部已解析的结构
    pub fn new(content: &str, config: C) -> Self {
        CellReader {
            lines: content.lines().map(String::from).collect(),
            elements: config.elements(),
            positions: config.scaled_positions(),
            config,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    /// 设置坐标比较容差
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// 结构来源
    pub fn extract_struc(&self) -> &C {
        &self.config
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

fn spin_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)spin\s*[=:]\s*([-+]?[0-9.]+(?:[eE][-+]?[0-9]+)?)").expect("valid regex"))
}

impl<C: Configuration> StructureReport for CellReader<C> {
    fn atom_count(&self) -> usize {
        self.config.atom_count()
    }

    fn tolerance(&self) -> f64 {
        self.tolerance
    }

    fn get_kpoints(&self) -> Result<KpointGrid> {
        match Locator::new(&self.lines).first(markers::CELL_KPOINTS, LineRange::full()) {
            Some(idx) => parse_grid(&self.lines, idx),
            None => {
                debug!("no kpoints_mp_grid in deck, using default {:?}", KpointGrid::DEFAULT_GRID);
                Ok(KpointGrid::default())
            }
        }
    }

    fn get_psps(&self) -> Result<Option<BTreeMap<String, String>>> {
        let locator = Locator::new(&self.lines);
        let (Some(begin), Some(end)) = (
            locator.first(markers::CELL_SPECIES_POT, LineRange::full()),
            locator.first(markers::CELL_SPECIES_POT_END, LineRange::full()),
        ) else {
            return Ok(None);
        };

        let mut pseudos = BTreeMap::new();
        for i in begin + 1..end {
            let line = self.lines[i].trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            match line.split_whitespace().collect::<Vec<_>>().as_slice() {
                [elem, psp] => {
                    pseudos.insert(elem.to_string(), psp.to_string());
                }
                _ => return Err(MixCastepError::parse(i, "expected '<element> <pseudopotential>'")),
            }
        }
        Ok(Some(pseudos))
    }

    fn get_elements(&self) -> &[String] {
        &self.elements
    }

    fn get_init_spin(&self) -> Result<Vec<f64>> {
        let mut spins = vec![0.0; self.atom_count()];
        for ((idx, line), spin) in position_rows(&self.lines).into_iter().zip(spins.iter_mut()) {
            if line.split_whitespace().count() <= 4 {
                continue;
            }
            if let Some(caps) = spin_regex().captures(line) {
                *spin = parse_token(idx, &caps[1])?;
            }
        }
        Ok(spins)
    }

    fn get_mixkey(&self, _iteration: Option<isize>) -> Result<OccupancyMap> {
        resolve_deck_mixtures(&self.lines, &self.positions, &self.elements)
    }

    fn get_posns(&self, _iteration: Option<isize>) -> Result<Vec<[f64; 3]>> {
        Ok(self.positions.clone())
    }

    fn get_ext_press(&self) -> Result<[f64; 6]> {
        let Some(mut lpress) =
            Locator::new(&self.lines).first(markers::CELL_EXT_PRESSURE, LineRange::full())
        else {
            return Ok([0.0; 6]);
        };
        // 可选的单位行
        if line_at(&self.lines, lpress + 1)?.split_whitespace().count() == 1 {
            lpress += 1;
        }
        voigt_from_rows(&self.lines, lpress + 1)
    }

    fn get_cell_constrs(&self) -> Result<[i32; 6]> {
        let Some(idx) =
            Locator::new(&self.lines).first(markers::CELL_CONSTRAINTS_BLOCK, LineRange::full())
        else {
            return Ok(markers::NO_CELL_CONSTRAINTS);
        };

        let mut values = Vec::with_capacity(6);
        for row in [idx + 1, idx + 2] {
            for tok in line_at(&self.lines, row)?.split_whitespace() {
                values.push(parse_token::<i32>(row, tok)?);
            }
        }
        values
            .try_into()
            .map_err(|_| MixCastepError::parse(idx, "CELL_CONSTRAINTS must hold 2 rows of 3 integers"))
    }

    fn get_cell(&self, _iteration: Option<isize>) -> Result<Mat33> {
        Ok(self.config.cell())
    }
}
