//! Instrument configuration round-trips through the filesystem.

use std::fs;

use antenna_pointing::domain::ModelKind;
use antenna_pointing::io::{commit_params, read_params};
use approx::assert_abs_diff_eq;
use tempfile::tempdir;

#[test]
fn sixty_cm_2_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ant30_phaseC0.conf");
    fs::write(&path, "# receiver settings\nLO1\t110.2\n").unwrap();

    let params = [
        0.0123456789, -0.0234567891, 0.0345678912, -0.0456789123, 0.0567891234,
        -0.0678912345, 0.0789123456, -0.0891234567, 0.0912345678, -0.1023456789,
    ];
    commit_params(&path, ModelKind::SixtyCm2, &params).unwrap();

    let back = read_params(&path, ModelKind::SixtyCm2).unwrap().unwrap();
    assert_eq!(back.len(), 10);
    for (got, want) in back.iter().zip(params.iter()) {
        assert_abs_diff_eq!(got, want, epsilon = 1e-9);
    }

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("# receiver settings\nLO1\t110.2\n# 60cm_model_2\t"));
}

#[test]
fn second_commit_archives_the_first() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ant.conf");

    commit_params(&path, ModelKind::Optical, &[0.001; 15]).unwrap();
    commit_params(&path, ModelKind::Optical, &[0.002; 15]).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().filter(|l| l.starts_with("#AntRadioInst")).count(), 3);
    assert_eq!(text.lines().filter(|l| l.starts_with("AntRadioInst")).count(), 3);
    assert_eq!(text.lines().filter(|l| l.starts_with("# optical_model\t")).count(), 2);

    let back = read_params(&path, ModelKind::Optical).unwrap().unwrap();
    assert_eq!(back, vec![0.002; 15]);
}

#[test]
fn unreadable_configuration_is_an_error() {
    let dir = tempdir().unwrap();
    let err = read_params(&dir.path().join("missing.conf"), ModelKind::SixtyCm).unwrap_err();
    assert_eq!(err.exit_code(), antenna_pointing::error::EXIT_INPUT);
}
