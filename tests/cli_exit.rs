use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn sf_field_report(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sf-field-report"))
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

#[test]
fn test_failure_is_reported_once_with_nonzero_exit() {
    let tmp = TempDir::new().unwrap();

    let output = sf_field_report(tmp.path(), &["--config", "missing.json", "report"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert_eq!(stderr.matches("Failed to load config").count(), 1, "{}", stderr);
}

#[test]
fn test_failure_reaches_terminal_when_logging_to_file() {
    let tmp = TempDir::new().unwrap();

    let output = sf_field_report(
        tmp.path(),
        &["--log-file", "run.log", "--config", "missing.json", "report"],
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    let log = std::fs::read_to_string(tmp.path().join("run.log")).unwrap();

    assert!(!output.status.success());
    assert_eq!(stderr.matches("Failed to load config").count(), 1, "{}", stderr);
    assert!(log.contains("Failed to load config"));
}

#[test]
fn test_overlapping_output_directories_are_refused() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("config.json"),
        r#"{"reportsPath": "out", "spreadsheetPath": "out"}"#,
    )
    .unwrap();
    std::fs::create_dir(tmp.path().join("out")).unwrap();
    std::fs::write(tmp.path().join("out/Account.csv"), "Field,Total Records,Populated Records\n").unwrap();

    let output = sf_field_report(tmp.path(), &["compile"]);

    assert!(!output.status.success());
    assert!(tmp.path().join("out/Account.csv").exists());
}

#[test]
fn test_empty_stage_exits_cleanly() {
    let tmp = TempDir::new().unwrap();

    let output = sf_field_report(tmp.path(), &["compile"]);

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(tmp.path().join("spreadsheet").is_dir());
    assert!(!tmp.path().join("spreadsheet/Salesforce_Report.xlsx").exists());
}
