//! # collect 命令实现
//!
//! 并行读取一批 .castep 报告，写出 CSV 汇总并按焓排序打印。
//!
//! ## 功能
//! - 扫描目录（可递归）中匹配模式的报告
//! - 每个报告一个读取器，在 rayon 线程池上并行处理
//! - 未完成的计算默认跳过
//! - 单点计算没有焓，用能量参与排序
//!
//! ## 依赖关系
//! - 使用 `cli/collect.rs` 定义的参数
//! - 使用 `mixcastep::batch`, `mixcastep::parsers`
//! - 使用 `mixcastep::utils::output`

use crate::cli::collect::CollectArgs;
use mixcastep::batch::{BatchRunner, FileCollector, ProcessResult};
use mixcastep::models::Task;
use mixcastep::parsers::CastepReader;
use mixcastep::utils::output;
use mixcastep::{MixCastepError, Result};

use anyhow::Context;
use log::info;
use serde::Serialize;
use std::path::Path;
use tabled::{Table, Tabled};

/// 单个报告的汇总
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub structure: String,
    pub path: String,
    pub task: Task,
    pub complete: bool,
    pub iterations: usize,
    pub formula: String,
    pub mixed_sites: usize,
    pub energy_ev: Option<f64>,
    pub enthalpy_ev: Option<f64>,
    pub fmax_ev_per_ang: Option<f64>,
}

impl Summary {
    /// 排序用的量：几何优化取焓，单点取能量
    fn ranking_value(&self) -> Option<f64> {
        self.enthalpy_ev.or(self.energy_ev)
    }
}

/// 排名表的一行
#[derive(Debug, Clone, Tabled)]
struct RankRow {
    #[tabled(rename = "Rank")]
    rank: usize,
    #[tabled(rename = "Structure")]
    structure: String,
    #[tabled(rename = "Formula")]
    formula: String,
    #[tabled(rename = "Task")]
    task: String,
    #[tabled(rename = "Iter")]
    iterations: usize,
    #[tabled(rename = "H or E (eV)")]
    value: String,
    #[tabled(rename = "ΔH (eV)")]
    delta: String,
    #[tabled(rename = "Fmax (eV/Å)")]
    fmax: String,
    #[tabled(rename = "Mixed")]
    mixed: usize,
}

/// 执行 collect 命令
pub fn execute(args: CollectArgs) -> Result<()> {
    output::print_header("Collecting CASTEP results");

    if !args.input.exists() {
        return Err(MixCastepError::DirectoryNotFound {
            path: args.input.display().to_string(),
        });
    }

    let files = FileCollector::new(args.input.clone())
        .with_pattern(&args.pattern)
        .recursive(args.recursive)
        .collect();

    if files.is_empty() {
        output::print_warning(&format!(
            "No files matching '{}' under '{}'",
            args.pattern,
            args.input.display()
        ));
        return Ok(());
    }

    let runner = BatchRunner::new(args.jobs);
    output::print_info(&format!(
        "Reading {} reports with {} workers...",
        files.len(),
        runner.jobs()
    ));

    let result = runner.run(&files, |path| {
        match summarise(path, args.tolerance) {
            Ok(summary) if summary.complete || args.include_incomplete => {
                ProcessResult::Success(summary)
            }
            Ok(summary) => ProcessResult::Skipped(summary.path),
            Err(e) => ProcessResult::Failed(path.display().to_string(), format!("{:#}", e)),
        }
    })?;

    for (path, err) in &result.failures {
        output::print_warning(&format!("{}: {}", path, err));
    }
    info!(
        "{} read, {} skipped, {} failed",
        result.success(),
        result.skipped,
        result.failed()
    );

    let mut summaries = result.outputs;
    if summaries.is_empty() {
        output::print_warning("No completed calculations found.");
        return Ok(());
    }

    rank(&mut summaries);
    write_csv(&summaries, &args.output)?;
    print_ranking(&summaries, args.top_n);

    output::print_done(&format!(
        "{} of {} reports summarised into '{}' ({} skipped, {} failed)",
        summaries.len(),
        files.len(),
        args.output.display(),
        result.skipped,
        result.failures.len()
    ));

    Ok(())
}

/// 读取一个报告的汇总
pub fn summarise(path: &Path, tolerance: f64) -> anyhow::Result<Summary> {
    let reader = CastepReader::from_file(path)
        .with_context(|| format!("cannot open {}", path.display()))?
        .with_tolerance(tolerance);

    let n = reader.get_niterations();
    let task = reader.get_task();
    let last = if n > 0 { Some(-1) } else { None };

    let energy_ev = match last {
        Some(_) => Some(reader.get_energy(last).context("final energy")?),
        None => None,
    };
    let enthalpy_ev = match (task, last) {
        (Task::Geometry, Some(_)) => Some(reader.get_enthalpy(last).context("final enthalpy")?),
        _ => None,
    };
    let fmax_ev_per_ang = reader.get_fmax(last).ok();

    let crystal = reader.extract_struc(last).context("final structure")?;
    let mixed_sites = reader
        .get_sites()
        .context("mixture block")?
        .iter()
        .filter(|s| s.is_mixed())
        .count();

    Ok(Summary {
        structure: path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string(),
        path: path.display().to_string(),
        task,
        complete: reader.is_complete(),
        iterations: n,
        formula: crystal.formula(),
        mixed_sites,
        energy_ev,
        enthalpy_ev,
        fmax_ev_per_ang,
    })
}

/// 按焓（或能量）升序，缺值的排在最后
pub fn rank(summaries: &mut [Summary]) {
    summaries.sort_by(|a, b| match (a.ranking_value(), b.ranking_value()) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.structure.cmp(&b.structure),
    });
}

fn write_csv(summaries: &[Summary], output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;
    for summary in summaries {
        wtr.serialize(summary)?;
    }
    wtr.flush().map_err(|e| MixCastepError::FileWriteError {
        path: output_path.display().to_string(),
        source: e,
    })?;

    output::print_success(&format!("Summary saved to '{}'", output_path.display()));
    Ok(())
}

fn print_ranking(summaries: &[Summary], top_n: usize) {
    let reference = summaries.iter().find_map(Summary::ranking_value);

    let rows: Vec<RankRow> = summaries
        .iter()
        .take(top_n)
        .enumerate()
        .map(|(i, s)| {
            let value = s.ranking_value();
            RankRow {
                rank: i + 1,
                structure: s.structure.clone(),
                formula: s.formula.clone(),
                task: s.task.to_string(),
                iterations: s.iterations,
                value: value.map(|v| format!("{:.6}", v)).unwrap_or_else(|| "-".into()),
                delta: match (value, reference) {
                    (Some(v), Some(r)) => format!("{:.6}", v - r),
                    _ => "-".into(),
                },
                fmax: s
                    .fmax_ev_per_ang
                    .map(|f| format!("{:.4}", f))
                    .unwrap_or_else(|| "-".into()),
                mixed: s.mixed_sites,
            }
        })
        .collect();

    output::print_header(&format!(
        "Top {} structures by enthalpy",
        top_n.min(summaries.len())
    ));
    println!("{}", Table::new(&rows));
}
