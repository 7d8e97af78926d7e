//! # 混合位点解析
//!
//! 把 VCA 混合信息整理成 [`OccupancyMap`]。
//!
//! .castep 中的 Mixture 块：
//! ```text
//!            Mixture     |   Fractional coord        |   Atoms  |  Weights  |
//!  x-------------------------------------------------------------------------x
//!  x     1     0.000000   0.000000   0.000000         Fe        0.700000    x
//!  x                                                  Ni        0.300000    x
//!  x-------------------------------------------------------------------------x
//! ```
//! 8 个记号的行开启一个新位点，较短的行为同一位点追加一种元素。
//! 块内顺序与原子序号无关，打印的坐标精度也可能低于结构表，
//! 所以按"元素相同且距离小于容差"匹配到已解析的原子上。
//!
//! .cell 中则是逐原子的 `MIXTURE:( 1 0.7 )` 标注。
//!
//! ## 依赖关系
//! - 被 `parsers/castep_out.rs`, `parsers/cell.rs` 使用
//! - 使用 `parsers/locate.rs`, `models/site.rs`

use super::fields::parse_token;
use super::locate::{LineRange, Locator};
use super::markers;
use crate::error::{MixCastepError, Result};
use crate::models::structure::distance;
use crate::models::{default_occupancy, OccupancyMap, PositionKey, Site};
use log::debug;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// 正在累积的位点
#[derive(Debug)]
struct OpenSite {
    /// 匹配到的原子序号
    matched: usize,
    weights: BTreeMap<String, f64>,
}

/// 扫描状态
#[derive(Debug)]
enum MixtureState {
    Idle,
    Open(OpenSite),
}

impl MixtureState {
    /// 把当前位点写入映射，回到空闲状态
    fn flush(&mut self, map: &mut OccupancyMap, positions: &[[f64; 3]], elements: &[String]) {
        if let MixtureState::Open(site) = std::mem::replace(self, MixtureState::Idle) {
            let key = PositionKey::from_position(&positions[site.matched]);
            map.insert(
                key,
                Site {
                    element: elements[site.matched].clone(),
                    weights: site.weights,
                },
            );
        }
    }
}

/// 找到元素相同、距离小于容差的第一个原子
pub fn match_site(
    posn: &[f64; 3],
    element: &str,
    positions: &[[f64; 3]],
    elements: &[String],
    tolerance: f64,
) -> Option<usize> {
    positions
        .iter()
        .zip(elements)
        .position(|(p, e)| e == element && distance(p, posn) < tolerance)
}

/// 解析 .castep 窗口内的 Mixture 块
///
/// 没有 Mixture 块时返回默认映射（每个原子单独占据）。
pub fn resolve_mixture(
    lines: &[String],
    positions: &[[f64; 3]],
    elements: &[String],
    tolerance: f64,
    range: LineRange,
) -> Result<OccupancyMap> {
    let mut map = default_occupancy(positions, elements);

    let Some(lmix) = Locator::new(lines).last(markers::MIXTURE, range) else {
        debug!("no Mixture block, every site singly occupied");
        return Ok(map);
    };

    let mut state = MixtureState::Idle;
    let mut l = lmix + 3;
    while let Some(line) = lines.get(l) {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.first() != Some(&markers::MIXTURE_ROW) {
            break;
        }

        let (element, weight) = if tokens.len() == 8 {
            state.flush(&mut map, positions, elements);

            let posn = [
                parse_token(l, tokens[2])?,
                parse_token(l, tokens[3])?,
                parse_token(l, tokens[4])?,
            ];
            let element = tokens[5];
            let matched = match_site(&posn, element, positions, elements, tolerance).ok_or_else(|| {
                MixCastepError::UnmatchedMixtureSite {
                    position: PositionKey::from_position(&posn).to_string(),
                    element: element.to_string(),
                }
            })?;
            state = MixtureState::Open(OpenSite {
                matched,
                weights: BTreeMap::new(),
            });
            (element, tokens[6])
        } else {
            if tokens.len() < 3 {
                return Err(MixCastepError::parse(l, "expected '<element> <weight>' in Mixture block"));
            }
            (tokens[1], tokens[2])
        };

        match &mut state {
            MixtureState::Open(site) => {
                site.weights.insert(element.to_string(), parse_token(l, weight)?);
            }
            MixtureState::Idle => {
                return Err(MixCastepError::parse(l, "mixture continuation row without a site"));
            }
        }
        l += 1;
    }

    state.flush(&mut map, positions, elements);
    Ok(map)
}

fn mixture_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)mixture\s*:\s*\(([^)]*)\)?").expect("valid regex"))
}

/// .cell 行上的 `MIXTURE:( index weight )` 标注，返回权重
pub fn deck_mixture_weight(idx: usize, line: &str) -> Result<Option<f64>> {
    let Some(caps) = mixture_regex().captures(line) else {
        return Ok(None);
    };
    let weight = caps[1]
        .split_whitespace()
        .last()
        .ok_or_else(|| MixCastepError::parse(idx, "empty MIXTURE annotation"))?;
    parse_token(idx, weight).map(Some)
}

/// 解析 .cell 坐标块中的 MIXTURE 标注
///
/// 同一坐标上的每个原子贡献一个权重，代表元素取字母序最小者。
pub fn resolve_deck_mixtures(
    lines: &[String],
    positions: &[[f64; 3]],
    elements: &[String],
) -> Result<OccupancyMap> {
    let mut map = default_occupancy(positions, elements);

    let rows = position_rows(lines);
    if rows.is_empty() {
        debug!("no positions block in deck text");
        return Ok(map);
    }

    for ((idx, line), (posn, elem)) in rows.into_iter().zip(positions.iter().zip(elements)) {
        let Some(weight) = deck_mixture_weight(idx, line)? else {
            continue;
        };

        let key = PositionKey::from_position(posn);
        let site = map.entry(key).or_insert_with(|| Site::pure(elem.as_str()));
        site.weights.insert(elem.clone(), weight);
        if let Some(first_elem) = site.weights.keys().next() {
            site.element = first_elem.clone();
        }
    }
    Ok(map)
}

/// 坐标块中的原子行，附带行号
///
/// 单位行、注释和空行都跳过，第 k 行对应第 k 个原子。
pub(crate) fn position_rows(lines: &[String]) -> Vec<(usize, &str)> {
    let Some(lposns) = Locator::new(lines).first(markers::CELL_POSITIONS, LineRange::full()) else {
        return Vec::new();
    };
    lines
        .iter()
        .enumerate()
        .skip(lposns + 1)
        .map(|(i, line)| (i, line.trim()))
        .take_while(|(_, line)| !line.to_uppercase().starts_with("%ENDBLOCK"))
        .filter(|(_, line)| !(line.is_empty() || line.starts_with('#') || line.starts_with('!')))
        .filter(|(_, line)| line.split_whitespace().count() > 1)
        .collect()
}
