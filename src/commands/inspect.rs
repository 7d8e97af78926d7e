//! # inspect 命令实现
//!
//! 打印单个 .cell / .castep 文件中能读到的所有量。
//!
//! ## 功能
//! - 公共部分（两种文件都有）：k 点、赝势、外压、晶胞约束、逐原子表
//! - .castep 额外部分：任务、迭代数、能量/焓/Fmax、最终自旋、迭代历史
//!
//! ## 依赖关系
//! - 使用 `cli/inspect.rs` 定义的参数
//! - 使用 `mixcastep::parsers`
//! - 使用 `mixcastep::utils::output`

use crate::cli::inspect::InspectArgs;
use mixcastep::models::{OccupancyMap, PositionKey, Task};
use mixcastep::parsers::{self, CastepReader, Report, StructureReport};
use mixcastep::utils::output;
use mixcastep::Result;

use log::info;
use tabled::{Table, Tabled};

/// 逐原子表的一行
#[derive(Debug, Clone, Tabled)]
struct AtomRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Element")]
    element: String,
    #[tabled(rename = "Fractional position")]
    position: String,
    #[tabled(rename = "Init. spin")]
    spin: String,
    #[tabled(rename = "Occupancy")]
    occupancy: String,
}

/// 迭代历史的一行
#[derive(Debug, Clone, Tabled)]
struct IterationRow {
    #[tabled(rename = "Iteration")]
    iteration: usize,
    #[tabled(rename = "Energy (eV)")]
    energy: String,
    #[tabled(rename = "Enthalpy (eV)")]
    enthalpy: String,
    #[tabled(rename = "Fmax (eV/Å)")]
    fmax: String,
}

/// 执行 inspect 命令
pub fn execute(args: InspectArgs) -> Result<()> {
    output::print_header(&format!("Inspecting {}", args.file.display()));

    let report = parsers::open_report(&args.file)?.with_tolerance(args.tolerance);
    info!("opened {} with tolerance {}", args.file.display(), args.tolerance);

    if let Report::Castep(castep) = &report {
        print_run(castep, args.iteration)?;
    }

    // .castep 的混合位点按原子序号追踪，弛豫后的坐标也能对上
    let sites = match &report {
        Report::Castep(castep) => castep.get_tracked_mixkey(args.iteration)?,
        Report::Cell(cell) => cell.get_mixkey(args.iteration)?,
    };
    print_common(report.as_structure(), args.iteration, &sites)?;

    if let Report::Castep(castep) = &report {
        print_spins(castep);
        if args.history {
            print_history(castep)?;
        }
    }

    Ok(())
}

fn format_vec(values: &[f64], precision: usize) -> String {
    values
        .iter()
        .map(|v| format!("{:.*}", precision, v))
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{:.6}", v)).unwrap_or_else(|| "-".to_string())
}

/// 两种文件共有的量
fn print_common(
    reader: &dyn StructureReport,
    iteration: Option<isize>,
    sites: &OccupancyMap,
) -> Result<()> {
    let kpoints = reader.get_kpoints()?;
    output::print_field("Atoms", &reader.atom_count().to_string());
    output::print_field(
        "MP grid",
        &format!(
            "{} {} {}  (offset {})",
            kpoints.grid[0],
            kpoints.grid[1],
            kpoints.grid[2],
            format_vec(&kpoints.offset, 4)
        ),
    );

    let psps = match reader.get_psps()? {
        Some(map) => map
            .iter()
            .map(|(el, psp)| format!("{}={}", el, psp))
            .collect::<Vec<_>>()
            .join(", "),
        None => "-".to_string(),
    };
    output::print_field("Pseudopotentials", &psps);
    output::print_field("External pressure", &format_vec(&reader.get_ext_press()?, 4));
    output::print_field(
        "Cell constraints",
        &reader
            .get_cell_constrs()?
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(" "),
    );

    output::print_separator();
    let cell = reader.get_cell(iteration)?;
    for (label, row) in ["a", "b", "c"].iter().zip(cell.iter()) {
        output::print_field(label, &format_vec(row, 6));
    }

    let posns = reader.get_posns(iteration)?;
    let spins = reader.get_init_spin()?;

    let rows: Vec<AtomRow> = reader
        .get_elements()
        .iter()
        .zip(&posns)
        .zip(&spins)
        .enumerate()
        .map(|(i, ((element, posn), spin))| AtomRow {
            index: i + 1,
            element: element.clone(),
            position: format_vec(posn, 6),
            spin: format!("{:.3}", spin),
            occupancy: sites
                .get(&PositionKey::from_position(posn))
                .map(|s| s.describe())
                .unwrap_or_default(),
        })
        .collect();

    println!();
    println!("{}", Table::new(&rows));

    let mixed = sites.values().filter(|s| s.is_mixed()).count();
    output::print_info(&format!("{} sites, {} of them mixed", sites.len(), mixed));

    Ok(())
}

/// 计算任务信息
fn print_run(castep: &CastepReader, iteration: Option<isize>) -> Result<()> {
    let n = castep.get_niterations();
    output::print_field("Task", &castep.get_task().to_string());
    output::print_field("Finished iterations", &n.to_string());

    if castep.is_complete() {
        output::print_success("Calculation completed");
    } else {
        output::print_warning("Calculation did not complete");
    }

    if n == 0 {
        output::print_skip("No finished SCF cycle, energies unavailable");
        output::print_separator();
        return Ok(());
    }

    output::print_field("Energy (eV)", &format!("{:.6}", castep.get_energy(iteration)?));
    if castep.get_task() == Task::Geometry {
        output::print_field("Enthalpy (eV)", &format!("{:.6}", castep.get_enthalpy(iteration)?));
    }
    output::print_field("Fmax (eV/Å)", &format!("{:.6}", castep.get_fmax(iteration)?));

    let stress = castep.get_stresses(iteration).ok();
    if let Some(stress) = stress {
        let diag = [stress[0][0], stress[1][1], stress[2][2]];
        output::print_field("Stress diag. (GPa)", &format_vec(&diag, 4));
    }
    output::print_separator();
    Ok(())
}

/// 最终 Mulliken 自旋，没有时给出提示
fn print_spins(castep: &CastepReader) {
    match castep.get_final_spin() {
        Ok(spins) => output::print_field("Final spins", &format_vec(&spins, 3)),
        Err(e) => output::print_skip(&e.to_string()),
    }
}

/// 每次迭代的能量、焓、Fmax
fn print_history(castep: &CastepReader) -> Result<()> {
    let n = castep.get_niterations();
    let geometry = castep.get_task() == Task::Geometry;

    let rows = (0..n)
        .map(|i| -> Result<IterationRow> {
            let it = Some(i as isize);
            Ok(IterationRow {
                iteration: i,
                energy: format!("{:.6}", castep.get_energy(it)?),
                enthalpy: if geometry {
                    format_opt(Some(castep.get_enthalpy(it)?))
                } else {
                    format_opt(None)
                },
                fmax: format_opt(castep.get_fmax(it).ok()),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    output::print_header("Iteration history");
    println!("{}", Table::new(&rows));
    Ok(())
}
