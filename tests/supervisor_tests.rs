//! Lifecycle tests for the supervisor
//!
//! Servers here are tiny shell scripts named `app.py`, run with `sh` standing in
//! for the Python interpreter, so real processes are spawned, signalled and reaped.

#![cfg(unix)]

use std::fs;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

use mcpctl::config::McpctlConfig;
use mcpctl::process;
use mcpctl::supervisor::{ErrorKind, ServerStatus, StopOutcome, Supervisor};
use mcpctl::{AlreadyRunningPolicy, LaunchError, RuntimeKind, SupervisorError};

const LONG_RUNNING: &str = "sleep 30\n";
const IGNORES_SIGTERM: &str = "trap '' TERM\nwhile true; do sleep 1; done\n";
const CRASHES: &str = "echo 'boom: missing API key' >&2\nexit 3\n";

fn test_config() -> McpctlConfig {
    let mut config = McpctlConfig::default();
    config.launch.python = "sh".to_string();
    config.launch.settle_delay_ms = 300;
    config.stop.poll_attempts = 3;
    config.stop.poll_interval_ms = 100;
    config
}

fn setup_root() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

/// Create `<root>/<name>/app.py` with the given shell body
fn create_server(root: &TempDir, name: &str, script: &str) {
    let dir = root.path().join(name);
    fs::create_dir_all(&dir).expect("Failed to create server directory");
    fs::write(dir.join("app.py"), script).expect("Failed to write app.py");
}

fn supervisor_with(root: &TempDir, config: McpctlConfig) -> Supervisor {
    Supervisor::from_config(root.path(), config)
}

fn wait_until_dead(pid: u32) {
    for _ in 0..50 {
        if !process::is_alive(pid) {
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
    panic!("process {} is still alive", pid);
}

// ============================================================================
// Start / Stop
// ============================================================================

#[test]
fn test_start_interpreted_script_and_stop() {
    let root = setup_root();
    create_server(&root, "weather-mcp", LONG_RUNNING);
    let supervisor = supervisor_with(&root, test_config());

    let started = supervisor.start("weather-mcp").unwrap();
    assert_eq!(
        started.runtime,
        RuntimeKind::InterpretedScript {
            script: "app.py".into()
        }
    );
    assert_eq!(started.command, "sh app.py");
    assert!(process::is_alive(started.pid));
    assert!(started.logs.stdout.exists());
    assert!(started.logs.stderr.exists());

    let entry = supervisor.entry("weather-mcp").unwrap();
    assert_eq!(entry.pid, started.pid);
    assert_eq!(entry.started_at, started.started_at);

    let stopped = supervisor.stop("weather-mcp").unwrap();
    assert_eq!(stopped.pid, started.pid);
    assert!(matches!(stopped.outcome, StopOutcome::Graceful { .. }));
    assert!(supervisor.entry("weather-mcp").is_none());
    wait_until_dead(started.pid);
}

#[test]
fn test_early_exit_leaves_registry_untouched() {
    let root = setup_root();
    create_server(&root, "broken-server", CRASHES);
    let supervisor = supervisor_with(&root, test_config());

    let err = supervisor.start("broken-server").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EarlyExit);

    match err {
        SupervisorError::Launch(LaunchError::EarlyExit { stderr_tail, .. }) => {
            assert!(stderr_tail.unwrap_or_default().contains("missing API key"));
        }
        other => panic!("unexpected error: {}", other),
    }

    assert!(!supervisor.registry().path().exists());
}

#[test]
fn test_stop_unknown_server_fails_without_mutation() {
    let root = setup_root();
    create_server(&root, "files-server", LONG_RUNNING);
    let supervisor = supervisor_with(&root, test_config());
    let started = supervisor.start("files-server").unwrap();

    let before = fs::read_to_string(supervisor.registry().path()).unwrap();
    let err = supervisor.stop("nope-server").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotRunning);
    assert_eq!(fs::read_to_string(supervisor.registry().path()).unwrap(), before);

    supervisor.stop("files-server").unwrap();
    wait_until_dead(started.pid);
}

#[test]
fn test_stop_externally_killed_server_succeeds() {
    let root = setup_root();
    create_server(&root, "flaky-server", LONG_RUNNING);
    let supervisor = supervisor_with(&root, test_config());

    let started = supervisor.start("flaky-server").unwrap();
    process::force_kill(started.pid).unwrap();
    wait_until_dead(started.pid);

    let stopped = supervisor.stop("flaky-server").unwrap();
    assert_eq!(stopped.pid, started.pid);
    assert!(supervisor.entry("flaky-server").is_none());
}

#[test]
fn test_stop_escalates_to_sigkill() {
    let root = setup_root();
    create_server(&root, "stubborn-server", IGNORES_SIGTERM);
    let supervisor = supervisor_with(&root, test_config());

    let started = supervisor.start("stubborn-server").unwrap();
    let stopped = supervisor.stop("stubborn-server").unwrap();

    assert_eq!(stopped.outcome, StopOutcome::Forced);
    assert!(supervisor.entry("stubborn-server").is_none());
    wait_until_dead(started.pid);
}

// ============================================================================
// Double start policies
// ============================================================================

#[test]
fn test_double_start_replaces_entry_by_default() {
    let root = setup_root();
    create_server(&root, "search-mcp", LONG_RUNNING);
    let supervisor = supervisor_with(&root, test_config());

    let first = supervisor.start("search-mcp").unwrap();
    let second = supervisor.start("search-mcp").unwrap();

    assert_ne!(first.pid, second.pid);
    assert_eq!(second.replaced_pid, Some(first.pid));
    assert_eq!(supervisor.entry("search-mcp").unwrap().pid, second.pid);
    assert_eq!(supervisor.registry().read_all().len(), 1);

    // The replaced process is no longer tracked; clean it up by hand
    process::force_kill(first.pid).unwrap();
    supervisor.stop("search-mcp").unwrap();
    wait_until_dead(first.pid);
    wait_until_dead(second.pid);
}

#[test]
fn test_double_start_refuse_policy() {
    let root = setup_root();
    create_server(&root, "search-mcp", LONG_RUNNING);
    let mut config = test_config();
    config.policy.on_already_running = AlreadyRunningPolicy::Refuse;
    let supervisor = supervisor_with(&root, config);

    let first = supervisor.start("search-mcp").unwrap();
    let err = supervisor.start("search-mcp").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AlreadyRunning);
    assert_eq!(supervisor.entry("search-mcp").unwrap().pid, first.pid);

    supervisor.stop("search-mcp").unwrap();
    wait_until_dead(first.pid);
}

#[test]
fn test_double_start_restart_policy() {
    let root = setup_root();
    create_server(&root, "search-mcp", LONG_RUNNING);
    let mut config = test_config();
    config.policy.on_already_running = AlreadyRunningPolicy::Restart;
    let supervisor = supervisor_with(&root, config);

    let first = supervisor.start("search-mcp").unwrap();
    let second = supervisor.start("search-mcp").unwrap();

    let restarted = second.restarted.as_ref().unwrap();
    assert_eq!(restarted.pid, first.pid);
    assert!(second.replaced_pid.is_none());
    wait_until_dead(first.pid);
    assert_eq!(supervisor.entry("search-mcp").unwrap().pid, second.pid);

    supervisor.stop("search-mcp").unwrap();
    wait_until_dead(second.pid);
}

#[test]
fn test_stale_entry_never_blocks_start() {
    let root = setup_root();
    create_server(&root, "search-mcp", LONG_RUNNING);
    let mut config = test_config();
    config.policy.on_already_running = AlreadyRunningPolicy::Refuse;
    let supervisor = supervisor_with(&root, config);
    supervisor
        .registry()
        .record("search-mcp", 999_999_999, "2024-01-01 10:00:00")
        .unwrap();

    let started = supervisor.start("search-mcp").unwrap();
    assert!(started.replaced_pid.is_none());
    assert_eq!(supervisor.entry("search-mcp").unwrap().pid, started.pid);

    supervisor.stop("search-mcp").unwrap();
    wait_until_dead(started.pid);
}

// ============================================================================
// Listing, stop_all and cleanup
// ============================================================================

#[test]
fn test_list_operations_are_read_only() {
    let root = setup_root();
    create_server(&root, "alpha-server", LONG_RUNNING);
    create_server(&root, "beta-server", LONG_RUNNING);
    let supervisor = supervisor_with(&root, test_config());
    supervisor
        .registry()
        .record("beta-server", 999_999_999, "2024-01-01 10:00:00")
        .unwrap();
    let before = fs::read_to_string(supervisor.registry().path()).unwrap();

    let known = supervisor.list_known().unwrap();
    assert_eq!(known.len(), 2);
    assert_eq!(known[0].name, "alpha-server");
    assert_eq!(known[0].status, ServerStatus::Stopped);
    assert_eq!(known[1].status, ServerStatus::Stale);

    let running = supervisor.list_running();
    assert!(!running.registry_corrupt);
    assert_eq!(running.servers.len(), 1);
    assert!(!running.servers[0].alive);

    assert_eq!(fs::read_to_string(supervisor.registry().path()).unwrap(), before);
}

#[test]
fn test_stop_all_then_running_is_empty() {
    let root = setup_root();
    create_server(&root, "alpha-server", LONG_RUNNING);
    create_server(&root, "beta-server", LONG_RUNNING);
    let supervisor = supervisor_with(&root, test_config());

    let a = supervisor.start("alpha-server").unwrap();
    let b = supervisor.start("beta-server").unwrap();
    supervisor
        .registry()
        .record("ghost-server", 999_999_999, "2024-01-01 10:00:00")
        .unwrap();

    let report = supervisor.stop_all().unwrap();
    assert_eq!(report.attempted, 3);
    assert_eq!(report.stopped, 3);

    assert!(supervisor.list_running().servers.is_empty());
    wait_until_dead(a.pid);
    wait_until_dead(b.pid);
}

#[test]
fn test_clean_stale_is_idempotent() {
    let root = setup_root();
    create_server(&root, "alive-server", LONG_RUNNING);
    let supervisor = supervisor_with(&root, test_config());
    let started = supervisor.start("alive-server").unwrap();
    for name in ["dead-one-server", "dead-two-server"] {
        supervisor
            .registry()
            .record(name, 999_999_999, "2024-01-01 10:00:00")
            .unwrap();
    }

    let first = supervisor.clean_stale().unwrap();
    assert_eq!(first.checked, 3);
    assert_eq!(first.removed.len(), 2);

    let second = supervisor.clean_stale().unwrap();
    assert_eq!(second.checked, 1);
    assert!(second.removed.is_empty());
    assert!(supervisor.entry("alive-server").is_some());

    supervisor.stop("alive-server").unwrap();
    wait_until_dead(started.pid);
}

#[test]
fn test_clean_stale_without_registry_file() {
    let root = setup_root();
    let supervisor = supervisor_with(&root, test_config());

    let report = supervisor.clean_stale().unwrap();
    assert_eq!(report.checked, 0);
    assert!(!supervisor.registry().path().exists());
}

#[test]
fn test_corrupt_registry_lists_nothing() {
    let root = setup_root();
    let supervisor = supervisor_with(&root, test_config());
    fs::write(supervisor.registry().path(), "[1, 2").unwrap();

    let running = supervisor.list_running();
    assert!(running.registry_corrupt);
    assert!(running.servers.is_empty());

    assert_eq!(
        supervisor.clean_stale().unwrap_err().kind(),
        ErrorKind::RegistryCorrupt
    );
    assert_eq!(
        supervisor.stop_all().unwrap_err().kind(),
        ErrorKind::RegistryCorrupt
    );
}
