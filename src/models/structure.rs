//! # 晶体结构数据模型
//!
//! 定义统一的晶体结构表示，以及读取器所依赖的外部结构接口 [`Configuration`]。
//!
//! ## 依赖关系
//! - 被 `parsers/cell.rs` 和 `parsers/castep_out.rs` 使用
//! - 无外部模块依赖

use serde::{Deserialize, Serialize};

/// 3x3 矩阵（行向量）
pub type Mat33 = [[f64; 3]; 3];

/// 已解析的原子构型
///
/// 输入文件读取器只通过这个接口获取元素、分数坐标和晶胞，
/// 不关心构型是如何得到的。
pub trait Configuration {
    /// 每个原子的元素符号（按原子顺序）
    fn elements(&self) -> Vec<String>;

    /// 每个原子的分数坐标
    fn scaled_positions(&self) -> Vec<[f64; 3]>;

    /// 晶胞向量 (Å)
    fn cell(&self) -> Mat33;

    /// 原子数
    fn atom_count(&self) -> usize;
}

/// 晶格参数表示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lattice {
    /// 晶格向量矩阵 (3x3)，行向量表示 a, b, c
    pub matrix: Mat33,
}

impl Lattice {
    /// 从晶格参数 (a, b, c, alpha, beta, gamma) 创建晶格
    /// 角度单位：度
    pub fn from_parameters(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Self {
        let cos_alpha = alpha.to_radians().cos();
        let cos_beta = beta.to_radians().cos();
        let (sin_gamma, cos_gamma) = gamma.to_radians().sin_cos();

        let c1 = c * cos_beta;
        let c2 = c * (cos_alpha - cos_beta * cos_gamma) / sin_gamma;
        let c3 = (c * c - c1 * c1 - c2 * c2).sqrt();

        Lattice {
            matrix: [
                [a, 0.0, 0.0],
                [b * cos_gamma, b * sin_gamma, 0.0],
                [c1, c2, c3],
            ],
        }
    }

    /// 从晶格向量矩阵创建
    pub fn from_vectors(matrix: Mat33) -> Self {
        Lattice { matrix }
    }

    /// 晶格常数 (a, b, c)
    pub fn lengths(&self) -> [f64; 3] {
        self.matrix.map(|v| norm(&v))
    }

    /// 计算晶格体积
    pub fn volume(&self) -> f64 {
        let [a, b, c] = self.matrix;
        a[0] * (b[1] * c[2] - b[2] * c[1]) - a[1] * (b[0] * c[2] - b[2] * c[0])
            + a[2] * (b[0] * c[1] - b[1] * c[0])
    }

    /// 笛卡尔坐标转分数坐标，奇异晶格返回 `None`
    pub fn to_fractional(&self, cart: [f64; 3]) -> Option<[f64; 3]> {
        let m = self.matrix;
        let det = self.volume();
        if det.abs() < 1e-10 {
            return None;
        }

        // r = f · M  =>  f = r · M⁻¹
        let inv = [
            [
                (m[1][1] * m[2][2] - m[1][2] * m[2][1]) / det,
                (m[0][2] * m[2][1] - m[0][1] * m[2][2]) / det,
                (m[0][1] * m[1][2] - m[0][2] * m[1][1]) / det,
            ],
            [
                (m[1][2] * m[2][0] - m[1][0] * m[2][2]) / det,
                (m[0][0] * m[2][2] - m[0][2] * m[2][0]) / det,
                (m[0][2] * m[1][0] - m[0][0] * m[1][2]) / det,
            ],
            [
                (m[1][0] * m[2][1] - m[1][1] * m[2][0]) / det,
                (m[0][1] * m[2][0] - m[0][0] * m[2][1]) / det,
                (m[0][0] * m[1][1] - m[0][1] * m[1][0]) / det,
            ],
        ];

        let mut frac = [0.0; 3];
        for (j, f) in frac.iter_mut().enumerate() {
            *f = (0..3).map(|i| cart[i] * inv[i][j]).sum();
        }
        Some(frac)
    }
}

/// 原子信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    /// 元素符号
    pub element: String,

    /// 分数坐标 [x, y, z]
    pub position: [f64; 3],
}

impl Atom {
    pub fn new(element: impl Into<String>, position: [f64; 3]) -> Self {
        Atom {
            element: element.into(),
            position,
        }
    }
}

/// 晶体结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Crystal {
    /// 结构名称
    pub name: String,

    /// 晶格
    pub lattice: Lattice,

    /// 原子列表
    pub atoms: Vec<Atom>,

    /// 能量 (eV)
    pub energy: Option<f64>,

    /// 焓 (eV)
    pub enthalpy: Option<f64>,

    /// 来源文件格式
    pub source_format: Option<String>,
}

impl Crystal {
    pub fn new(name: impl Into<String>, lattice: Lattice, atoms: Vec<Atom>) -> Self {
        Crystal {
            name: name.into(),
            lattice,
            atoms,
            energy: None,
            enthalpy: None,
            source_format: None,
        }
    }

    /// 计算化学式（元素按字母序）
    pub fn formula(&self) -> String {
        use std::collections::BTreeMap;
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();

        for atom in &self.atoms {
            *counts.entry(atom.element.as_str()).or_insert(0) += 1;
        }

        counts
            .into_iter()
            .map(|(el, count)| {
                if count == 1 {
                    el.to_string()
                } else {
                    format!("{}{}", el, count)
                }
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

impl Configuration for Crystal {
    fn elements(&self) -> Vec<String> {
        self.atoms.iter().map(|a| a.element.clone()).collect()
    }

    fn scaled_positions(&self) -> Vec<[f64; 3]> {
        self.atoms.iter().map(|a| a.position).collect()
    }

    fn cell(&self) -> Mat33 {
        self.lattice.matrix
    }

    fn atom_count(&self) -> usize {
        self.atoms.len()
    }
}

/// 向量欧几里得范数
pub fn norm(v: &[f64; 3]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// 两点间欧几里得距离
pub fn distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    norm(&[a[0] - b[0], a[1] - b[1], a[2] - b[2]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lattice_from_parameters_cubic() {
        let lattice = Lattice::from_parameters(5.0, 5.0, 5.0, 90.0, 90.0, 90.0);
        let [a, b, c] = lattice.lengths();

        assert!((a - 5.0).abs() < 1e-6);
        assert!((b - 5.0).abs() < 1e-6);
        assert!((c - 5.0).abs() < 1e-6);
        assert!((lattice.volume().abs() - 125.0).abs() < 1e-6);
    }

    #[test]
    fn test_to_fractional_hexagonal() {
        let lattice = Lattice::from_parameters(3.0, 3.0, 5.0, 90.0, 90.0, 120.0);
        let m = lattice.matrix;
        // 0.5 a + 0.25 b + 0.1 c
        let cart = [
            0.5 * m[0][0] + 0.25 * m[1][0] + 0.1 * m[2][0],
            0.5 * m[0][1] + 0.25 * m[1][1] + 0.1 * m[2][1],
            0.5 * m[0][2] + 0.25 * m[1][2] + 0.1 * m[2][2],
        ];
        let frac = lattice.to_fractional(cart).unwrap();

        assert!((frac[0] - 0.5).abs() < 1e-9);
        assert!((frac[1] - 0.25).abs() < 1e-9);
        assert!((frac[2] - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_to_fractional_singular() {
        let lattice = Lattice::from_vectors([[1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 0.0, 1.0]]);
        assert!(lattice.to_fractional([0.5, 0.5, 0.5]).is_none());
    }

    #[test]
    fn test_crystal_configuration() {
        let lattice = Lattice::from_vectors([[4.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 4.0]]);
        let atoms = vec![
            Atom::new("Fe", [0.0, 0.0, 0.0]),
            Atom::new("Ni", [0.0, 0.0, 0.0]),
            Atom::new("O", [0.5, 0.5, 0.5]),
        ];
        let crystal = Crystal::new("FeNiO", lattice, atoms);

        assert_eq!(crystal.atom_count(), 3);
        assert_eq!(crystal.elements(), vec!["Fe", "Ni", "O"]);
        assert_eq!(crystal.scaled_positions()[2], [0.5, 0.5, 0.5]);
        assert_eq!(crystal.cell()[1][1], 4.0);
        assert_eq!(crystal.formula(), "FeNiO");
    }

    #[test]
    fn test_distance() {
        assert!((distance(&[0.0, 0.0, 0.0], &[0.3, 0.4, 0.0]) - 0.5).abs() < 1e-12);
    }
}
