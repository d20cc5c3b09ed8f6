//! CLI end-to-end tests
//!
//! Tests for the reelhouse command-line interface.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

#[allow(deprecated)]
fn reelhouse_cmd() -> Command {
    Command::cargo_bin("reelhouse").unwrap()
}

#[test]
fn test_cli_no_args_shows_help() {
    reelhouse_cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_command() {
    reelhouse_cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("reelhouse"));
}

#[test]
fn test_cli_start_help() {
    reelhouse_cmd()
        .args(["start", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Start the streaming and upload server"));
}

#[test]
fn test_cli_validate_defaults() {
    let dir = tempdir().unwrap();
    reelhouse_cmd()
        .current_dir(dir.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("using defaults"))
        .stdout(predicate::str::contains("burst 5"));
}

#[test]
fn test_cli_validate_good_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("reelhouse.toml");
    fs::write(
        &path,
        r#"
[server]
port = 9000

[transcode]
qualities = ["720p", "360p"]
"#,
    )
    .unwrap();

    reelhouse_cmd()
        .arg("validate")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("720p, 360p"));
}

#[test]
fn test_cli_validate_rejects_unknown_quality() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("reelhouse.toml");
    fs::write(&path, "[transcode]\nqualities = [\"8k\"]\n").unwrap();

    reelhouse_cmd()
        .arg("validate")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("8k"));
}

#[test]
fn test_cli_validate_rejects_zero_burst() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("reelhouse.toml");
    fs::write(&path, "[rate_limit]\nburst = 0\n").unwrap();

    reelhouse_cmd()
        .arg("validate")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("burst"));
}

#[test]
fn test_cli_qualities_lists_variants() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("trip.mov"), b"original").unwrap();
    fs::write(dir.path().join("trip_480p.mp4"), b"variant").unwrap();

    reelhouse_cmd()
        .current_dir(dir.path())
        .arg("qualities")
        .arg(dir.path().join("trip.mov"))
        .assert()
        .success()
        .stdout(predicate::str::contains("original"))
        .stdout(predicate::str::contains("480p"))
        .stdout(predicate::str::contains("720p").not());
}

#[test]
fn test_cli_transcode_missing_input_fails() {
    let dir = tempdir().unwrap();
    reelhouse_cmd()
        .current_dir(dir.path())
        .args(["transcode", "does-not-exist.mp4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}
