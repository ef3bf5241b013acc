//! Utility functions for mcpctl
//! Short-lived helper commands (toolchain version probes) run with a timeout so a
//! hung interpreter cannot stall the tool.

use std::process::{Command, Output, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Short timeout for quick commands (5 seconds)
pub const SHORT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of running a command with timeout
#[derive(Debug)]
pub enum CommandResult {
    /// Command completed successfully with output
    Success(Output),
    /// Command failed with output
    Failed(Output),
    /// Command timed out and was killed
    TimedOut,
    /// Command could not be started
    SpawnError(String),
}

impl CommandResult {
    pub fn is_success(&self) -> bool {
        matches!(self, CommandResult::Success(_))
    }
}

/// Run a command with a timeout, capturing stdout and stderr
pub fn run_command_with_timeout(cmd: &str, args: &[&str], timeout: Duration) -> CommandResult {
    // On Windows, run through cmd.exe to properly find .cmd/.bat files in PATH
    #[cfg(windows)]
    let mut child = {
        let full_cmd = if args.is_empty() {
            cmd.to_string()
        } else {
            format!("{} {}", cmd, args.join(" "))
        };
        match Command::new("cmd")
            .args(["/C", &full_cmd])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(c) => c,
            Err(e) => return CommandResult::SpawnError(format!("Failed to start '{}': {}", cmd, e)),
        }
    };

    #[cfg(not(windows))]
    let mut child = match Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(c) => c,
        Err(e) => return CommandResult::SpawnError(format!("Failed to start '{}': {}", cmd, e)),
    };

    match child.wait_timeout(timeout) {
        Ok(Some(status)) => {
            let output = match child.wait_with_output() {
                Ok(o) => o,
                Err(e) => {
                    return CommandResult::SpawnError(format!(
                        "Failed to get output from '{}': {}",
                        cmd, e
                    ))
                }
            };

            if status.success() {
                CommandResult::Success(output)
            } else {
                CommandResult::Failed(output)
            }
        }
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait(); // Reap the zombie process
            CommandResult::TimedOut
        }
        Err(e) => CommandResult::SpawnError(format!("Failed to wait for '{}': {}", cmd, e)),
    }
}

/// Run a command and return the first line it printed, or None if it failed or timed out.
///
/// Some interpreters print `--version` to stderr, so stderr is used when stdout is empty.
pub fn run_command_stdout(cmd: &str, args: &[&str], timeout: Duration) -> Option<String> {
    match run_command_with_timeout(cmd, args, timeout) {
        CommandResult::Success(output) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            let text = if stdout.trim().is_empty() { stderr } else { stdout };
            let first = text
                .lines()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .map(String::from);
            first
        }
        _ => None,
    }
}
