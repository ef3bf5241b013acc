//! End-to-end tests for the mcpctl binary

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

fn mcpctl(root: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("mcpctl").expect("binary should build");
    cmd.arg("--root").arg(root.path());
    cmd.env_remove("MCPCTL_ROOT")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}

fn json_stdout(cmd: &mut Command) -> Value {
    let output = cmd.output().expect("failed to run mcpctl");
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

#[test]
fn test_help_lists_subcommands() {
    Command::cargo_bin("mcpctl")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("stopall"))
        .stdout(predicate::str::contains("running"))
        .stdout(predicate::str::contains("clean"));
}

#[test]
fn test_list_discovers_servers() {
    let root = TempDir::new().unwrap();
    fs::create_dir_all(root.path().join("github-mcp")).unwrap();
    fs::create_dir_all(root.path().join("weather-server")).unwrap();
    fs::create_dir_all(root.path().join("scratch")).unwrap();

    mcpctl(&root)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Found 2 MCP servers"))
        .stdout(predicate::str::contains("github-mcp"))
        .stdout(predicate::str::contains("scratch").not());
}

#[test]
fn test_running_json_envelope() {
    let root = TempDir::new().unwrap();
    let json = json_stdout(mcpctl(&root).args(["--format", "json", "running"]));

    assert_eq!(json["command"], "running");
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["total"], 0);
    assert!(json["timestamp"].is_string());
}

#[test]
fn test_stop_unknown_server_exits_nonzero() {
    let root = TempDir::new().unwrap();

    mcpctl(&root)
        .args(["stop", "idle-server"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("does not appear to be running"));
}

#[test]
fn test_stop_unknown_server_json_error_kind() {
    let root = TempDir::new().unwrap();
    let json = json_stdout(mcpctl(&root).args(["--format", "json", "stop", "idle-server"]));

    assert_eq!(json["success"], false);
    assert_eq!(json["error"]["kind"], "not_running");
}

#[test]
fn test_clean_with_stale_entry() {
    let root = TempDir::new().unwrap();
    fs::write(
        root.path().join("running_processes.json"),
        r#"{"old-server": {"pid": 999999999, "started_at": "2024-01-01 10:00:00"}}"#,
    )
    .unwrap();

    mcpctl(&root)
        .arg("clean")
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 1 stale entries"));

    let registry = fs::read_to_string(root.path().join("running_processes.json")).unwrap();
    let table: Value = serde_json::from_str(&registry).unwrap();
    assert!(table.as_object().unwrap().is_empty());
}

#[test]
fn test_start_missing_server_fails() {
    let root = TempDir::new().unwrap();

    mcpctl(&root)
        .args(["start", "nowhere-mcp"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("not found"));
}

#[test]
fn test_config_init_then_validate() {
    let root = TempDir::new().unwrap();

    mcpctl(&root)
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created"));
    assert!(root.path().join("mcpctl.toml").exists());

    mcpctl(&root)
        .args(["config", "init"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("already exists"));

    mcpctl(&root)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"));
}

#[test]
fn test_invalid_config_blocks_commands() {
    let root = TempDir::new().unwrap();
    fs::write(
        root.path().join("mcpctl.toml"),
        "[stop]\npoll_attempts = 0\n",
    )
    .unwrap();

    mcpctl(&root)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("poll_attempts"));

    mcpctl(&root)
        .arg("running")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn test_config_show_json_paths() {
    let root = TempDir::new().unwrap();
    let json = json_stdout(mcpctl(&root).args(["--format", "json", "config", "show"]));

    assert_eq!(json["data"]["config_file_exists"], false);
    assert!(json["data"]["registry"]
        .as_str()
        .unwrap()
        .ends_with("running_processes.json"));
    assert_eq!(json["data"]["config"]["policy"]["on_already_running"], "replace");
}
