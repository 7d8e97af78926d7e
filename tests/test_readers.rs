//! 两种读取器在同一体系上的对照测试

use approx::assert_abs_diff_eq;
use mixcastep::models::PositionKey;
use mixcastep::parsers::{open_report, CastepReader, CellReader, Report, StructureReport};
use mixcastep::MixCastepError;
use std::fs;
use std::path::{Path, PathBuf};
use tempdir::TempDir;

fn data(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(name)
}

#[test]
fn deck_and_log_agree_on_shared_quantities() {
    let deck = CellReader::from_file(&data("feni_o.cell")).unwrap();
    let log = CastepReader::from_file(&data("feni_o_geom.castep")).unwrap();

    assert_eq!(deck.get_kpoints().unwrap(), log.get_kpoints().unwrap());
    assert_eq!(deck.get_ext_press().unwrap(), log.get_ext_press().unwrap());
    assert_eq!(deck.get_cell_constrs().unwrap(), log.get_cell_constrs().unwrap());
    assert_eq!(deck.get_psps().unwrap(), log.get_psps().unwrap());

    let deck_cell = deck.get_cell(None).unwrap();
    let log_cell = log.get_cell(Some(0)).unwrap();
    for (a, b) in deck_cell.iter().flatten().zip(log_cell.iter().flatten()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-9);
    }
}

#[test]
fn mixed_site_has_same_weights_in_both_files() {
    let deck = CellReader::from_file(&data("feni_o.cell")).unwrap();
    let log = CastepReader::from_file(&data("feni_o_geom.castep")).unwrap();
    let key = PositionKey::from_position(&[0.0, 0.0, 0.0]);

    let from_deck = deck.get_mixkey(None).unwrap();
    let from_log = log.get_mixkey(Some(0)).unwrap();

    assert_eq!(from_deck[&key], from_log[&key]);
    assert_eq!(from_log[&key].element, "Fe");
    assert_abs_diff_eq!(from_log[&key].weights["Ni"], 0.3);
}

#[test]
fn queries_are_idempotent() {
    let log = CastepReader::from_file(&data("feni_o_geom.castep")).unwrap();
    assert_eq!(log.get_posns(Some(-1)).unwrap(), log.get_posns(Some(-1)).unwrap());
    assert_eq!(log.get_mixkey(None).unwrap(), log.get_mixkey(None).unwrap());
    assert_eq!(log.get_energy(Some(1)).unwrap(), log.get_energy(Some(1)).unwrap());
}

#[test]
fn open_report_dispatches_on_extension() {
    assert!(matches!(open_report(&data("feni_o.cell")).unwrap(), Report::Cell(_)));

    let report = open_report(&data("feni_o_geom.castep")).unwrap().with_tolerance(1e-3);
    assert_eq!(report.as_structure().tolerance(), 1e-3);
    assert_eq!(report.as_structure().atom_count(), 2);

    assert!(matches!(
        open_report(Path::new("FeNiO.param")),
        Err(MixCastepError::InvalidArgument(_))
    ));
}

#[test]
fn missing_file_is_a_read_error() {
    let dir = TempDir::new("mixcastep").unwrap();
    let err = CastepReader::from_file(&dir.path().join("absent.castep")).unwrap_err();
    assert!(matches!(err, MixCastepError::FileReadError { .. }));
}

#[test]
fn truncated_geometry_run() {
    let text = fs::read_to_string(data("feni_o_geom.castep")).unwrap();
    let cut = text.find(" BFGS: finished iteration     1").unwrap();

    let dir = TempDir::new("mixcastep").unwrap();
    let path = dir.path().join("cut.castep");
    fs::write(&path, &text[..cut]).unwrap();

    let log = CastepReader::from_file(&path).unwrap();
    assert!(!log.is_complete());
    assert_eq!(log.get_niterations(), 1);

    // 未完成的迭代只有 None 能看到
    assert_abs_diff_eq!(log.get_posns(None).unwrap()[1][2], 0.48);
    assert_abs_diff_eq!(log.get_posns(Some(-1)).unwrap()[1][2], 0.5);
    assert!(matches!(
        log.get_energy(Some(1)),
        Err(MixCastepError::IterationOutOfRange { iteration: 1, available: 1 })
    ));
    assert!(matches!(
        log.get_final_spin(),
        Err(MixCastepError::MandatoryAnchorMissing { .. })
    ));
}

#[test]
fn unmatched_mixture_with_tight_tolerance() {
    let text = fs::read_to_string(data("feni_o_geom.castep"))
        .unwrap()
        .replace(
            "x     1     0.000000   0.000000   0.000000         Fe",
            "x     1     0.000050   0.000000   0.000000         Fe",
        );
    let log = CastepReader::from_content(&text).unwrap();

    assert!(log.get_mixkey(Some(0)).is_ok());
    assert!(matches!(
        log.clone().with_tolerance(1e-5).get_mixkey(Some(0)),
        Err(MixCastepError::UnmatchedMixtureSite { .. })
    ));
}
