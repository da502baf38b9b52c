//! Integration tests for the CLI application
//!
//! These spawn the compiled binary against real CSV files and check the
//! JSON run reports it produces.

use std::io::Write;
use std::process::Command;
use tempfile::{NamedTempFile, TempDir};

/// Training and test CSVs for a small regression problem.
fn regression_files() -> std::io::Result<(NamedTempFile, NamedTempFile)> {
    let mut train = NamedTempFile::with_suffix(".csv")?;
    writeln!(train, "x,y")?;
    for i in 0..40 {
        let x = i as f64 / 40.0;
        writeln!(train, "{},{}", x, 2.0 * x + 1.0)?;
    }
    train.flush()?;

    let mut test = NamedTempFile::with_suffix(".csv")?;
    writeln!(test, "x,y")?;
    for i in 0..10 {
        let x = (i as f64 + 0.5) / 10.0;
        writeln!(test, "{},{}", x, 2.0 * x + 1.0)?;
    }
    test.flush()?;

    Ok((train, test))
}

/// Get the path to the compiled CLI binary
fn cli_binary() -> String {
    let debug_path = "target/debug/cellsvm";
    let release_path = "target/release/cellsvm";

    if std::path::Path::new(debug_path).exists() {
        debug_path.to_string()
    } else if std::path::Path::new(release_path).exists() {
        release_path.to_string()
    } else {
        let output = Command::new("cargo")
            .args(["build", "--bin", "cellsvm"])
            .output()
            .expect("Failed to build CLI binary");
        if !output.status.success() {
            panic!(
                "Failed to build CLI binary: {}",
                String::from_utf8_lossy(&output.stderr)
            );
        }
        debug_path.to_string()
    }
}

#[test]
fn test_cli_run_regression() {
    let (train, test) = regression_files().expect("Failed to create test data");
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let report_path = temp_dir.path().join("report.json");

    let output = Command::new(cli_binary())
        .args([
            "run",
            "--data",
            train.path().to_str().unwrap(),
            "--test-data",
            test.path().to_str().unwrap(),
            "--scenario",
            "LS",
            "--output",
            report_path.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to run CLI");

    assert!(
        output.status.success(),
        "run failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap())
            .expect("report should be valid JSON");
    assert_eq!(report["scenario"], "LS");
    assert_eq!(report["train_rows"], 40);
    assert!(report["candidates"].as_u64().unwrap() > 0);
    assert_eq!(report["test"]["rows"], 10);
    // Linear target, so the test MSE in the report should be tiny.
    let mse = report["test"]["errors"][0]["error"].as_f64().unwrap();
    assert!(mse < 0.05, "reported MSE too large: {mse}");
}

#[test]
fn test_cli_run_report_to_stdout() {
    let (train, _) = regression_files().expect("Failed to create test data");

    let output = Command::new(cli_binary())
        .args([
            "run",
            "--data",
            train.path().to_str().unwrap(),
            "--grid-choice=-1",
        ])
        .output()
        .expect("Failed to run CLI");

    assert!(output.status.success());
    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be a JSON report");
    assert!(report["created_at"].as_str().unwrap().contains('T'));
}

#[test]
fn test_cli_run_missing_file_fails() {
    let output = Command::new(cli_binary())
        .args(["run", "--data", "/nonexistent/data.csv"])
        .output()
        .expect("Failed to run CLI");
    assert!(!output.status.success());
}

#[test]
fn test_cli_config_lines() {
    let output = Command::new(cli_binary())
        .args([
            "config",
            "--set",
            "SCENARIO=QT",
            "--set",
            "USECELLS=1",
        ])
        .output()
        .expect("Failed to run CLI");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("svm-train"));
    assert!(lines[0].contains("-scenario QT"));
    assert!(lines[0].contains("-partition_choice 6"));
    assert!(lines[1].starts_with("svm-select"));
    assert!(lines[2].starts_with("svm-test"));
}

#[test]
fn test_cli_rejects_unknown_scenario() {
    let (train, _) = regression_files().expect("Failed to create test data");
    let output = Command::new(cli_binary())
        .args([
            "run",
            "--data",
            train.path().to_str().unwrap(),
            "--scenario",
            "XYZ",
        ])
        .output()
        .expect("Failed to run CLI");
    assert!(!output.status.success());
}
