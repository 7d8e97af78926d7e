//! # CASTEP .castep 输出解析器
//!
//! [`CastepReader`] 一次性读入整个 .castep，构造时确定原子数、任务类型、
//! 是否完成、已完成的迭代数和元素列表；之后每个查询按迭代序号
//! 重新计算行窗口，再交给对应的字段提取器。
//!
//! 迭代序号 `Option<isize>`：
//! - `Some(0)` / `Some(-N)` 第一次迭代，`Some(-1)` 最后一次完成的迭代
//! - `None` 整个文件（包括未完成的最后一次迭代）
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs`, `commands/` 使用
//! - 使用 `parsers/fields.rs`, `parsers/segment.rs`, `parsers/mixture.rs`

use super::cell::read_text;
use super::fields;
use super::locate::LineRange;
use super::mixture::resolve_mixture;
use super::segment::{self, check_iteration};
use super::{StructureReport, DEFAULT_TOLERANCE};
use crate::error::{MixCastepError, Result};
use crate::models::structure::norm;
use crate::models::{
    Atom, Crystal, KpointGrid, Lattice, Mat33, OccupancyMap, PositionKey, Site, Task, Window,
};
use log::debug;
use std::collections::BTreeMap;
use std::path::Path;

/// .castep 输出文件读取器
#[derive(Debug, Clone)]
pub struct CastepReader {
    lines: Vec<String>,
    nions: usize,
    task: Task,
    complete: bool,
    niterations: usize,
    elements: Vec<String>,
    tolerance: f64,
}

impl CastepReader {
    /// 读取 .castep 文件
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = read_text(path)?;
        Self::from_content(&content)
    }

    /// 从字符串内容构造
    pub fn from_content(content: &str) -> Result<Self> {
        let lines: Vec<String> = content.lines().map(String::from).collect();

        let nions = fields::read_nions(&lines)?;
        let task = fields::read_task(&lines)?;
        let complete = fields::is_complete(&lines);
        let niterations = fields::count_iterations(&lines, task, complete);
        let elements = fields::read_elements(&lines, nions)?;

        debug!(
            "castep report: {} lines, {} ions, task {}, {} iterations, complete: {}",
            lines.len(),
            nions,
            task,
            niterations,
            complete
        );

        Ok(CastepReader {
            lines,
            nions,
            task,
            complete,
            niterations,
            elements,
            tolerance: DEFAULT_TOLERANCE,
        })
    }

    /// 设置坐标比较容差
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn get_task(&self) -> Task {
        self.task
    }

    pub fn get_niterations(&self) -> usize {
        self.niterations
    }

    /// 是否正常结束（出现 "Total time"）
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// 迭代对应的行窗口
    pub fn geom_range(&self, iteration: Option<isize>) -> Result<Window> {
        if let Some(i) = iteration {
            check_iteration(i, self.niterations)?;
        }
        segment::geom_range(&self.lines, self.task, iteration, LineRange::full())
    }

    /// 提取器的搜索区间：窗口加上收尾的 "finished iteration" 行
    fn search_range(&self, iteration: Option<isize>) -> Result<LineRange> {
        Ok(LineRange::through(self.geom_range(iteration)?))
    }

    /// 能量、力、应力都要求至少完成一次 SCF
    fn require_scf(&self, iteration: Option<isize>) -> Result<()> {
        if self.niterations == 0 {
            return Err(MixCastepError::IterationOutOfRange {
                iteration: iteration.unwrap_or(-1),
                available: 0,
            });
        }
        Ok(())
    }

    /// 焓 (eV)，仅几何优化有意义
    pub fn get_enthalpy(&self, iteration: Option<isize>) -> Result<f64> {
        self.require_scf(iteration)?;
        if self.task == Task::Single {
            return Err(MixCastepError::NotApplicable {
                query: "enthalpy".to_string(),
                task: self.task.to_string(),
            });
        }
        fields::read_enthalpy(&self.lines, self.search_range(iteration)?)
    }

    /// 总能量 (eV)
    pub fn get_energy(&self, iteration: Option<isize>) -> Result<f64> {
        self.require_scf(iteration)?;
        fields::read_energy(&self.lines, self.search_range(iteration)?)
    }

    /// 原子受力 (eV/Å)
    pub fn get_forces(&self, iteration: Option<isize>) -> Result<Vec<[f64; 3]>> {
        self.require_scf(iteration)?;
        fields::read_forces(&self.lines, self.search_range(iteration)?, self.nions)
    }

    /// 应力张量 (GPa)
    pub fn get_stresses(&self, iteration: Option<isize>) -> Result<Mat33> {
        self.require_scf(iteration)?;
        fields::read_stresses(&self.lines, self.search_range(iteration)?)
    }

    /// 最大原子受力 (eV/Å)
    pub fn get_fmax(&self, iteration: Option<isize>) -> Result<f64> {
        let forces = self.get_forces(iteration)?;
        Ok(forces.iter().map(norm).fold(0.0, f64::max))
    }

    /// 最终 Mulliken 自旋，表不存在时报错
    pub fn get_final_spin(&self) -> Result<Vec<f64>> {
        fields::read_final_spin(&self.lines, self.nions)
    }

    /// 某次迭代的结构，附带可用的能量和焓
    pub fn extract_struc(&self, iteration: Option<isize>) -> Result<Crystal> {
        let posns = self.get_posns(iteration)?;
        let cell = self.get_cell(iteration)?;
        let atoms = self
            .elements
            .iter()
            .zip(posns)
            .map(|(elem, posn)| Atom::new(elem.as_str(), posn))
            .collect();

        let name = match iteration {
            Some(i) => format!("iteration {}", i),
            None => "final".to_string(),
        };
        let mut crystal = Crystal::new(name, Lattice::from_vectors(cell), atoms);
        crystal.energy = unavailable_as_none(self.get_energy(iteration))?;
        if self.task == Task::Geometry {
            crystal.enthalpy = unavailable_as_none(self.get_enthalpy(iteration))?;
        }
        crystal.source_format = Some("castep".to_string());
        Ok(crystal)
    }

    /// 每个原子的占据，按原子序号排列
    ///
    /// 混合块只在开头打印一次，因此用第一次迭代的坐标解析；
    /// 还没有完成的迭代时退回整个文件。
    pub fn get_sites(&self) -> Result<Vec<Site>> {
        let initial = if self.niterations > 0 { Some(0) } else { None };
        let posns = self.get_posns(initial)?;
        let map = self.get_mixkey(initial)?;

        Ok(posns
            .iter()
            .zip(&self.elements)
            .map(|(posn, elem)| {
                map.get(&PositionKey::from_position(posn))
                    .cloned()
                    .unwrap_or_else(|| Site::pure(elem.as_str()))
            })
            .collect())
    }

    /// 按原子序号追踪占据，再用该迭代的坐标生成键
    ///
    /// 几何优化中混合原子移动超过容差时 [`StructureReport::get_mixkey`]
    /// 会对不上，这里不受影响。
    pub fn get_tracked_mixkey(&self, iteration: Option<isize>) -> Result<OccupancyMap> {
        let posns = self.get_posns(iteration)?;
        let sites = self.get_sites()?;
        Ok(posns.iter().map(PositionKey::from_position).zip(sites).collect())
    }
}

/// 迭代不存在或锚点缺失时视为没有该量，其余错误照常返回
fn unavailable_as_none(result: Result<f64>) -> Result<Option<f64>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(MixCastepError::IterationOutOfRange { .. })
        | Err(MixCastepError::MandatoryAnchorMissing { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

impl StructureReport for CastepReader {
    fn atom_count(&self) -> usize {
        self.nions
    }

    fn tolerance(&self) -> f64 {
        self.tolerance
    }

    fn get_kpoints(&self) -> Result<KpointGrid> {
        fields::read_kpoints(&self.lines)
    }

    fn get_psps(&self) -> Result<Option<BTreeMap<String, String>>> {
        fields::read_psps(&self.lines)
    }

    fn get_elements(&self) -> &[String] {
        &self.elements
    }

    fn get_init_spin(&self) -> Result<Vec<f64>> {
        fields::read_init_spin(&self.lines, self.nions)
    }

    fn get_mixkey(&self, iteration: Option<isize>) -> Result<OccupancyMap> {
        let posns = self.get_posns(iteration)?;
        resolve_mixture(
            &self.lines,
            &posns,
            &self.elements,
            self.tolerance,
            self.search_range(iteration)?,
        )
    }

    fn get_posns(&self, iteration: Option<isize>) -> Result<Vec<[f64; 3]>> {
        fields::read_positions(&self.lines, self.search_range(iteration)?, self.nions)
    }

    fn get_ext_press(&self) -> Result<[f64; 6]> {
        fields::read_ext_press(&self.lines)
    }

    fn get_cell_constrs(&self) -> Result<[i32; 6]> {
        fields::read_cell_constrs(&self.lines)
    }

    fn get_cell(&self, iteration: Option<isize>) -> Result<Mat33> {
        let mut iteration = iteration;
        // 晶胞全固定时只在开头打印一次
        if self.task == Task::Geometry && self.get_cell_constrs()? == [0; 6] {
            iteration = Some(0);
        }
        fields::read_cell(&self.lines, self.search_range(iteration)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GEOM: &str = include_str!("../../tests/data/feni_o_geom.castep");
    const SINGLE: &str = include_str!("../../tests/data/feni_o_single.castep");

    fn geom() -> CastepReader {
        CastepReader::from_content(GEOM).unwrap()
    }

    /// 混合原子在第二次迭代中移动 0.01
    fn relaxed_metal() -> String {
        let row = "x  Fe           1         0.000000   0.000000   0.000000   x";
        let moved = "x  Fe           1         0.010000   0.000000   0.000000   x";
        let at = GEOM.rfind(row).unwrap();
        format!("{}{}{}", &GEOM[..at], moved, &GEOM[at + row.len()..])
    }

    #[test]
    fn test_header() {
        let r = geom();
        assert_eq!(r.atom_count(), 2);
        assert_eq!(r.get_task(), Task::Geometry);
        assert_eq!(r.get_niterations(), 2);
        assert!(r.is_complete());
        assert_eq!(r.get_elements(), ["Fe", "O"]);
    }

    #[test]
    fn test_windows_tile() {
        let r = geom();
        let w0 = r.geom_range(Some(0)).unwrap();
        let w1 = r.geom_range(Some(1)).unwrap();
        assert_eq!(w0.lmax, w1.lmin);
        assert_eq!(r.geom_range(Some(-1)).unwrap(), w1);
        assert_eq!(r.geom_range(Some(-2)).unwrap(), w0);
        assert!(r.lines()[w1.lmax].contains("finished iteration     1"));
    }

    #[test]
    fn test_out_of_range_everywhere() {
        let r = geom();
        for i in [2, -3, 7] {
            let failed = |res: Result<()>| {
                matches!(res, Err(MixCastepError::IterationOutOfRange { iteration, available: 2 }) if iteration == i)
            };
            assert!(failed(r.get_posns(Some(i)).map(|_| ())));
            assert!(failed(r.get_cell(Some(i)).map(|_| ())));
            assert!(failed(r.get_forces(Some(i)).map(|_| ())));
            assert!(failed(r.get_stresses(Some(i)).map(|_| ())));
            assert!(failed(r.get_energy(Some(i)).map(|_| ())));
            assert!(failed(r.get_enthalpy(Some(i)).map(|_| ())));
            assert!(failed(r.get_mixkey(Some(i)).map(|_| ())));
        }
    }

    #[test]
    fn test_per_iteration_quantities() {
        let r = geom();

        assert_eq!(r.get_posns(Some(0)).unwrap()[1], [0.5, 0.5, 0.5]);
        assert_eq!(r.get_posns(Some(1)).unwrap()[1], [0.5, 0.5, 0.48]);
        assert_eq!(r.get_posns(None).unwrap(), r.get_posns(Some(-1)).unwrap());

        assert_eq!(r.get_cell(Some(0)).unwrap()[0], [4.0, 0.0, 0.0]);
        assert_eq!(r.get_cell(Some(-1)).unwrap()[2], [0.0, 0.0, 4.9]);

        assert_eq!(r.get_energy(Some(0)).unwrap(), -1850.123456789);
        assert_eq!(r.get_energy(Some(1)).unwrap(), -1850.5);
        assert_eq!(r.get_enthalpy(Some(0)).unwrap(), -1850.12);
        assert_eq!(r.get_enthalpy(None).unwrap(), -1850.45);

        assert_eq!(r.get_stresses(Some(0)).unwrap()[2], [0.0, 0.0, -3.0]);
        assert_eq!(r.get_stresses(Some(1)).unwrap()[0], [-0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_forces_and_fmax() {
        let r = geom();
        let f0 = r.get_forces(Some(0)).unwrap();
        assert_eq!(f0, vec![[0.0, 0.0, 0.0], [0.1, -0.2, 0.3]]);
        assert!((r.get_fmax(Some(0)).unwrap() - 0.14_f64.sqrt()).abs() < 1e-12);
        assert!((r.get_fmax(Some(1)).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_header_tables() {
        let r = geom();

        let k = r.get_kpoints().unwrap();
        assert_eq!(k.grid, [4, 4, 1]);
        assert_eq!(k.offset, [0.0, 0.0, 0.25]);

        let psps = r.get_psps().unwrap().unwrap();
        assert_eq!(psps.len(), 3);
        assert_eq!(psps["O"], "O_00PBE.usp");

        assert_eq!(r.get_ext_press().unwrap(), [1.0, 1.5, 2.0, 0.3, 0.2, 0.1]);
        assert_eq!(r.get_cell_constrs().unwrap(), [1, 1, 3, 0, 0, 0]);
        assert_eq!(r.get_init_spin().unwrap(), vec![2.0, 0.0]);
        assert_eq!(r.get_final_spin().unwrap(), vec![2.1, 0.05]);
    }

    #[test]
    fn test_mixkey() {
        let r = geom();
        let map = r.get_mixkey(None).unwrap();
        assert_eq!(map.len(), 2);

        let metal = &map[&PositionKey::from_position(&[0.0, 0.0, 0.0])];
        assert_eq!(metal.element, "Fe");
        assert_eq!(metal.weights.get("Fe"), Some(&0.7));
        assert_eq!(metal.weights.get("Ni"), Some(&0.3));

        // 混合块只在开头打印
        let later = r.get_mixkey(Some(1)).unwrap();
        assert!(later.values().all(|s| !s.is_mixed()));
    }

    #[test]
    fn test_sites_follow_atoms_that_move() {
        let r = CastepReader::from_content(&relaxed_metal()).unwrap();
        assert_eq!(r.get_posns(Some(1)).unwrap()[0], [0.01, 0.0, 0.0]);
        assert!(matches!(
            r.get_mixkey(None),
            Err(MixCastepError::UnmatchedMixtureSite { .. })
        ));

        let sites = r.get_sites().unwrap();
        assert!(sites[0].is_mixed());
        assert!(!sites[1].is_mixed());

        for iteration in [None, Some(-1), Some(1)] {
            let map = r.get_tracked_mixkey(iteration).unwrap();
            let metal = &map[&PositionKey::from_position(&[0.01, 0.0, 0.0])];
            assert_eq!(metal.weights.get("Ni"), Some(&0.3));
        }
        let first = r.get_tracked_mixkey(Some(0)).unwrap();
        assert!(first[&PositionKey::from_position(&[0.0, 0.0, 0.0])].is_mixed());
        assert!(matches!(
            r.get_tracked_mixkey(Some(4)),
            Err(MixCastepError::IterationOutOfRange { .. })
        ));
    }

    #[test]
    fn test_frozen_cell_uses_first_iteration() {
        let frozen = GEOM.replace(
            "Cell constraints are:  1 1 3 0 0 0",
            "Cell constraints are:  0 0 0 0 0 0",
        );
        let r = CastepReader::from_content(&frozen).unwrap();

        assert_eq!(r.get_cell(Some(5)).unwrap(), r.get_cell(Some(0)).unwrap());
        assert_eq!(r.get_cell(None).unwrap()[0], [4.0, 0.0, 0.0]);
    }

    #[test]
    fn test_extract_struc() {
        let crystal = geom().extract_struc(Some(-1)).unwrap();
        assert_eq!(crystal.atoms.len(), 2);
        assert_eq!(crystal.atoms[1].position, [0.5, 0.5, 0.48]);
        assert_eq!(crystal.energy, Some(-1850.5));
        assert_eq!(crystal.enthalpy, Some(-1850.45));
        assert_eq!(crystal.source_format.as_deref(), Some("castep"));
    }

    #[test]
    fn test_extract_struc_keeps_parse_errors() {
        let broken = GEOM.replace("-1850.500000000", "-1850.5O0");
        let r = CastepReader::from_content(&broken).unwrap();
        assert!(matches!(
            r.extract_struc(Some(-1)),
            Err(MixCastepError::ParseError { .. })
        ));
        assert!(r.extract_struc(Some(0)).is_ok());
    }

    #[test]
    fn test_single_point() {
        let r = CastepReader::from_content(SINGLE).unwrap();

        assert_eq!(r.get_task(), Task::Single);
        assert_eq!(r.get_niterations(), 1);
        assert_eq!(r.geom_range(Some(0)).unwrap(), Window::new(0, r.lines().len()));

        let k = r.get_kpoints().unwrap();
        assert_eq!(k.grid, [3, 3, 2]);
        assert_eq!(k.offset, [1.0 / 12.0, 1.0 / 12.0, 0.0]);

        assert!(r.get_psps().unwrap().is_none());
        assert_eq!(r.get_init_spin().unwrap(), vec![0.0, 0.0]);
        assert_eq!(r.get_final_spin().unwrap(), vec![0.0, 0.0]);
        assert_eq!(r.get_ext_press().unwrap(), [0.0; 6]);
        assert_eq!(r.get_cell_constrs().unwrap(), [1, 2, 3, 4, 5, 6]);
        assert_eq!(r.get_energy(None).unwrap(), -1850.25);
        assert_eq!(r.get_fmax(None).unwrap(), 0.5);
        assert!(r.get_mixkey(None).unwrap().values().all(|s| !s.is_mixed()));
        assert!(matches!(
            r.get_enthalpy(None),
            Err(MixCastepError::NotApplicable { .. })
        ));
    }

    #[test]
    fn test_single_point_unfinished() {
        let truncated = SINGLE.replace("Total time", "Wall time");
        let r = CastepReader::from_content(&truncated).unwrap();

        assert!(!r.is_complete());
        assert_eq!(r.get_niterations(), 0);
        assert!(matches!(
            r.get_energy(None),
            Err(MixCastepError::IterationOutOfRange { available: 0, .. })
        ));
        assert!(r.get_posns(None).is_ok());

        let crystal = r.extract_struc(None).unwrap();
        assert_eq!(crystal.energy, None);
        assert_eq!(crystal.enthalpy, None);
    }

    #[test]
    fn test_unknown_task() {
        let bad = SINGLE.replace("single point energy", "phonon calculation");
        assert!(matches!(
            CastepReader::from_content(&bad),
            Err(MixCastepError::UnrecognizedTask(t)) if t == "phonon"
        ));
    }
}
