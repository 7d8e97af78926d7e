//! # 行定位器
//!
//! 在给定行区间内查找包含任一标记字符串的行（子串匹配，不要求整行相等）。
//! 找不到返回 `None` 或空列表，是否致命由调用者决定。
//!
//! ## 依赖关系
//! - 被 `parsers/segment.rs`, `parsers/fields.rs`, `parsers/mixture.rs`,
//!   `parsers/cell.rs` 使用

use crate::models::Window;

/// 搜索区间 `[nmin, nmax)`，`nmax` 为 `None` 表示到末尾
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineRange {
    pub nmin: usize,
    pub nmax: Option<usize>,
}

impl LineRange {
    /// 整个报告
    pub fn full() -> Self {
        LineRange::default()
    }

    pub fn new(nmin: usize, nmax: usize) -> Self {
        LineRange {
            nmin,
            nmax: Some(nmax),
        }
    }

    /// 迭代窗口，包含收尾的 "finished iteration" 行
    pub fn through(window: Window) -> Self {
        LineRange::new(window.lmin, window.lmax.saturating_add(1))
    }

    /// 截断到实际行数
    fn clamp(&self, len: usize) -> (usize, usize) {
        let nmax = self.nmax.map_or(len, |n| n.min(len));
        (self.nmin.min(nmax), nmax)
    }
}

/// 行定位器
#[derive(Debug, Clone, Copy)]
pub struct Locator<'a> {
    lines: &'a [String],
}

impl<'a> Locator<'a> {
    pub fn new(lines: &'a [String]) -> Self {
        Locator { lines }
    }

    /// 区间内第一个匹配行
    pub fn first(&self, markers: &[&str], range: LineRange) -> Option<usize> {
        let (nmin, nmax) = range.clamp(self.lines.len());
        (nmin..nmax).find(|&i| is_match(&self.lines[i], markers))
    }

    /// 区间内最后一个匹配行
    pub fn last(&self, markers: &[&str], range: LineRange) -> Option<usize> {
        let (nmin, nmax) = range.clamp(self.lines.len());
        (nmin..nmax).rev().find(|&i| is_match(&self.lines[i], markers))
    }

    /// 区间内所有匹配行（升序）
    pub fn all(&self, markers: &[&str], range: LineRange) -> Vec<usize> {
        let (nmin, nmax) = range.clamp(self.lines.len());
        (nmin..nmax)
            .filter(|&i| is_match(&self.lines[i], markers))
            .collect()
    }
}

fn is_match(line: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| line.contains(m))
}
