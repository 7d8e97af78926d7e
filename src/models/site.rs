//! # 混合占据位点模型
//!
//! VCA（虚晶近似）计算中，一个格点可以由多种元素按权重共同占据。
//! 这里定义位点的字符串键 [`PositionKey`] 与占据映射 [`OccupancyMap`]。
//!
//! ## 依赖关系
//! - 被 `parsers/mixture.rs`, `parsers/cell.rs`, `parsers/castep_out.rs` 使用
//! - 被 `commands/inspect.rs` 使用

use crate::error::{MixCastepError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// 坐标键的小数位数
pub const KEY_DECIMALS: usize = 6;

/// 位点坐标的规范字符串形式
///
/// 三个分量各保留 6 位小数，以单个空格分隔，`-0.000000` 统一写成 `0.000000`。
/// 容差内相等的两个坐标必须渲染为同一个键，否则无法对上。
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PositionKey(String);

impl PositionKey {
    /// 从分数坐标生成键
    pub fn from_position(posn: &[f64; 3]) -> Self {
        let parts: Vec<String> = posn.iter().map(|&x| render_component(x)).collect();
        PositionKey(parts.join(" "))
    }

    /// 把键解析回坐标
    pub fn parse(key: &str) -> Result<[f64; 3]> {
        let values: Vec<f64> = key
            .split_whitespace()
            .map(|s| s.parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| MixCastepError::InvalidArgument(format!("position key '{}': {}", key, e)))?;

        match values.as_slice() {
            [x, y, z] => Ok([*x, *y, *z]),
            _ => Err(MixCastepError::InvalidArgument(format!(
                "position key '{}' must have 3 components",
                key
            ))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 键对应的坐标
    pub fn position(&self) -> Result<[f64; 3]> {
        Self::parse(&self.0)
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn render_component(x: f64) -> String {
    let s = format!("{:.*}", KEY_DECIMALS, x);
    match s.strip_prefix('-') {
        Some(rest) if rest.bytes().all(|b| b == b'0' || b == b'.') => rest.to_string(),
        _ => s,
    }
}

/// 单个格点的占据信息
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Site {
    /// 代表元素
    pub element: String,

    /// 元素 -> 占据权重（不要求归一）
    pub weights: BTreeMap<String, f64>,
}

impl Site {
    /// 单一元素完全占据
    pub fn pure(element: impl Into<String>) -> Self {
        let element = element.into();
        let mut weights = BTreeMap::new();
        weights.insert(element.clone(), 1.0);
        Site { element, weights }
    }

    pub fn is_mixed(&self) -> bool {
        self.weights.len() > 1
    }

    /// 形如 `Fe:0.700 Ni:0.300` 的简短描述
    pub fn describe(&self) -> String {
        self.weights
            .iter()
            .map(|(el, wt)| format!("{}:{:.3}", el, wt))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// 坐标键 -> 位点占据
pub type OccupancyMap = BTreeMap<PositionKey, Site>;

/// 每个原子一项、权重为 1.0 的默认映射
///
/// 坐标相同的原子共用一个键，后出现的覆盖先出现的。
pub fn default_occupancy(positions: &[[f64; 3]], elements: &[String]) -> OccupancyMap {
    positions
        .iter()
        .zip(elements)
        .map(|(posn, elem)| (PositionKey::from_position(posn), Site::pure(elem.as_str())))
        .collect()
}
