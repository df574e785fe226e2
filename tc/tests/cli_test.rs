//! Command-line tests for the `tc` binary

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Config pointing storage into `dir` with the remote NLU disabled
fn write_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("taskchat.yml");
    let yaml = format!(
        "llm:\n  provider: none\nstorage:\n  db-path: {}\n",
        dir.join("tasks.db").display()
    );
    fs::write(&path, yaml).expect("write config");
    path
}

fn tc(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("tc").expect("tc binary");
    cmd.env("XDG_DATA_HOME", dir.join("data"))
        .env("XDG_CONFIG_HOME", dir.join("config"))
        .env("HOME", dir)
        .arg("--config")
        .arg(write_config(dir));
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    Command::cargo_bin("tc")
        .expect("tc binary")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("classify").and(predicate::str::contains("tasks")));
}

#[test]
fn test_classify_meeting_as_json() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    tc(temp_dir.path())
        .args(["classify", "Họp với khách hàng lúc 15:00 ngày mai", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"source\": \"pattern\"").and(predicate::str::contains("meeting")));
}

#[test]
fn test_classify_greeting_text() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    tc(temp_dir.path())
        .args(["classify", "xin chào"])
        .assert()
        .success()
        .stdout(predicate::str::contains("NotTask"));
}

#[test]
fn test_tasks_on_empty_store() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    tc(temp_dir.path())
        .args(["tasks", "--all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No tasks."));
}

#[test]
fn test_config_prints_yaml() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    tc(temp_dir.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("session-timeout-secs"));
}

#[test]
fn test_unknown_format_is_rejected() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    tc(temp_dir.path())
        .args(["classify", "họp", "--format", "yaml"])
        .assert()
        .failure();
}
