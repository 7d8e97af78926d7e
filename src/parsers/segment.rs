//! # 迭代分段
//!
//! 根据 "finished iteration" 标记把几何优化日志切成逐次迭代的行窗口。
//!
//! ```text
//! 0 ──────── F[0] ──────── F[1] ──── ... ──── F[N-1] ──── (未完成的尾部)
//! |  iter 0   |    iter 1   |                  |
//! ```
//!
//! - 迭代 `0`（或 `-N`）: `[nmin, F[0])`
//! - 迭代 `i`: `[F[i-1], F[i])`，负数从末尾倒数
//! - `None`: 整个区间，包括尚未完成的最后一次迭代
//!
//! ## 依赖关系
//! - 被 `parsers/castep_out.rs` 使用
//! - 使用 `parsers/locate.rs`

use super::locate::{LineRange, Locator};
use super::markers;
use crate::error::{MixCastepError, Result};
use crate::models::{Task, Window};

/// 计算某次迭代的行窗口
pub fn geom_range(
    lines: &[String],
    task: Task,
    iteration: Option<isize>,
    range: LineRange,
) -> Result<Window> {
    let nmax = range.nmax.map_or(lines.len(), |n| n.min(lines.len()));
    let nmin = range.nmin.min(nmax);

    if task == Task::Single {
        return Ok(Window::new(nmin, nmax));
    }

    let Some(iteration) = iteration else {
        return Ok(Window::new(nmin, nmax));
    };

    let finished = Locator::new(lines).all(markers::FINISHED_ITERATION, LineRange::new(nmin, nmax));
    let count = finished.len();
    check_iteration(iteration, count)?;

    let n = count as isize;
    if iteration == 0 || iteration == -n {
        return Ok(Window::new(nmin, finished[0]));
    }

    let wrap = |i: isize| if i < 0 { (n + i) as usize } else { i as usize };
    Ok(Window::new(
        finished[wrap(iteration - 1)],
        finished[wrap(iteration)],
    ))
}

/// 检查迭代序号是否在 `N` 次已完成迭代内
pub fn check_iteration(iteration: isize, count: usize) -> Result<()> {
    if iteration.unsigned_abs() > count || iteration == count as isize {
        return Err(MixCastepError::IterationOutOfRange {
            iteration,
            available: count,
        });
    }
    Ok(())
}
