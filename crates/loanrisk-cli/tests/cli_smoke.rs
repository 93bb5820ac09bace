//! CLI binary smoke tests using assert_cmd.
//!
//! These run the compiled `loanrisk` binary to check argument parsing,
//! exit codes and the files a train/predict round trip leaves behind.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;

fn cmd() -> Command {
    Command::cargo_bin("loanrisk").unwrap()
}

const EMPLOYMENT: [&str; 3] = ["Employed", "Self-employed", "Unemployed"];

fn write_training_table(dir: &Path) -> PathBuf {
    let mut table = String::from("LoanID,Age,Income,Employment,Default\n");
    for i in 0..200usize {
        let age = 18 + (i * 31) % 50;
        let income = 15_000 + ((i * 7919) % 100) * 1_000;
        let employment = EMPLOYMENT[i % 3];
        let default = income < 45_000 || (employment == "Unemployed" && i % 4 == 0);
        writeln!(
            table,
            "L{:04},{},{},{},{}",
            i,
            age,
            income,
            employment,
            u8::from(default)
        )
        .unwrap();
    }
    let path = dir.join("loans.csv");
    std::fs::write(&path, table).unwrap();
    path
}

// ---------------------------------------------------------------------------
// Top-level
// ---------------------------------------------------------------------------

#[test]
fn no_args_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn help_flag() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("train"))
        .stdout(predicate::str::contains("predict"));
}

#[test]
fn version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("loanrisk"));
}

// ---------------------------------------------------------------------------
// Train subcommand
// ---------------------------------------------------------------------------

#[test]
fn train_requires_data_path() {
    cmd().arg("train").assert().failure();
}

#[test]
fn train_nonexistent_data_errors() {
    let dir = tempfile::tempdir().unwrap();
    cmd()
        .args(["train", "/nonexistent/loans.csv", "-o"])
        .arg(dir.path())
        .assert()
        .failure()
        .code(1);
}

#[test]
fn train_nonexistent_config_errors() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_training_table(dir.path());
    cmd()
        .arg("train")
        .arg(&data)
        .arg("/nonexistent/config.json")
        .assert()
        .failure();
}

#[test]
fn train_rejects_non_numeric_seed() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_training_table(dir.path());
    cmd()
        .arg("train")
        .arg(&data)
        .args(["--seed", "abc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("seed"));
}

// ---------------------------------------------------------------------------
// Predict subcommand
// ---------------------------------------------------------------------------

#[test]
fn predict_requires_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_training_table(dir.path());
    cmd().arg("predict").arg(&data).assert().failure();
}

#[test]
fn predict_with_empty_artifact_dir_errors() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_training_table(dir.path());
    cmd()
        .arg("predict")
        .arg(&data)
        .arg("-a")
        .arg(dir.path())
        .assert()
        .failure()
        .code(1);
}

// ---------------------------------------------------------------------------
// Round trip
// ---------------------------------------------------------------------------

#[test]
fn train_then_predict() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_training_table(dir.path());
    let out = dir.path().join("run");

    cmd()
        .arg("train")
        .arg(&data)
        .arg("-o")
        .arg(&out)
        .args(["--seed", "7", "--no-report"])
        .assert()
        .success();

    for name in [
        "logistic_regression_model.json",
        "random_forest_model.json",
        "xgboost_model.json",
        "scaler.json",
        "label_encoders.json",
        "feature_names.json",
    ] {
        assert!(out.join("models").join(name).is_file(), "missing {}", name);
    }
    assert!(out.join("results/model_comparison.csv").is_file());
    assert!(!out.join("results/training_report.html").exists());

    let predictions = dir.path().join("predictions.csv");
    cmd()
        .arg("predict")
        .arg(&data)
        .arg("--artifacts")
        .arg(&out)
        .arg("--output")
        .arg(&predictions)
        .assert()
        .success();

    let content = std::fs::read_to_string(&predictions).unwrap();
    let mut lines = content.lines();
    let header = lines.next().unwrap();
    assert!(header.starts_with("LoanID,"));
    assert!(header.contains("random_forest_probability"));
    assert_eq!(lines.count(), 200);

    cmd()
        .arg("predict")
        .arg(&data)
        .arg("-a")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("xgboost_label"));
}

#[test]
fn predict_rejects_unseen_category() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_training_table(dir.path());
    let out = dir.path().join("run");
    cmd()
        .arg("train")
        .arg(&data)
        .arg("-o")
        .arg(&out)
        .arg("--no-report")
        .assert()
        .success();

    let new_rows = dir.path().join("new.csv");
    std::fs::write(&new_rows, "LoanID,Age,Income,Employment\nR1,67,30000,Retired\n").unwrap();
    cmd()
        .arg("predict")
        .arg(&new_rows)
        .arg("-a")
        .arg(&out)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Retired"));
}

#[test]
fn rerun_with_no_report_removes_previous_report() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_training_table(dir.path());
    let out = dir.path().join("run");
    let report = out.join("results/training_report.html");

    cmd().arg("train").arg(&data).arg("-o").arg(&out).assert().success();
    assert!(report.is_file());

    cmd()
        .arg("train")
        .arg(&data)
        .arg("-o")
        .arg(&out)
        .arg("--no-report")
        .assert()
        .success();
    assert!(!report.exists());
}
