//! Integration tests for the `archiver` binary's argument parsing and
//! startup error paths, run against the compiled binary with `assert_cmd`.

use assert_cmd::assert::OutputAssertExt;
use assert_cmd::cargo::cargo_bin;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

fn archiver_cmd() -> Command {
    Command::new(cargo_bin!("archiver"))
}

#[test]
fn missing_config_file_exits_nonzero() {
    let dir = tempdir().unwrap();
    archiver_cmd()
        .current_dir(dir.path())
        .arg("does-not-exist.yaml")
        .assert()
        .failure();
}

#[test]
fn combining_two_mode_flags_is_rejected_before_any_config_load() {
    let dir = tempdir().unwrap();
    archiver_cmd()
        .current_dir(dir.path())
        .args(["config.yaml", "--import-only", "--migrate-only"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn unreadable_configuration_store_fails_report_status() {
    let dir = tempdir().unwrap();
    let work_dir = dir.path().join("work");
    let records_dir = dir.path().join("records");
    fs::create_dir_all(&work_dir).unwrap();
    fs::create_dir_all(&records_dir).unwrap();

    let config_path = dir.path().join("config.yaml");
    fs::write(
        &config_path,
        format!(
            r#"
app:
  work_dir: {work_dir}
source_files:
  run_records_dir: {records_dir}
configuration_store:
  uri: /nonexistent/tool
  mode: cli-local
  schema_dir: {records_dir}
archive_store:
  url: http://127.0.0.1:0
  folder: runs
  user: nobody
  password: secret
fhiclize_generate:
  converters: []
"#,
            work_dir = work_dir.display(),
            records_dir = records_dir.display(),
        ),
    )
    .unwrap();

    archiver_cmd()
        .current_dir(dir.path())
        .args(["config.yaml", "--report-status"])
        .assert()
        .failure();
}
