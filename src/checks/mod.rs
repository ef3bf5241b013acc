//! Installation diagnostics for managed servers.
//!
//! A check never starts anything. It inspects the server directory, the `.env`
//! file and the toolchain on `PATH`, and collects human-readable issues.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::McpctlConfig;
use crate::launcher::{
    detect_family, entry_point_for, resolve_runtime, RuntimeFamily, RuntimeKind, Unresolved,
};
use crate::utils::{run_command_stdout, SHORT_COMMAND_TIMEOUT};

/// Above this many issues a server is reported as an error rather than a warning
pub const ERROR_ISSUE_THRESHOLD: usize = 2;

/// Overall verdict for one server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckStatus {
    pub fn from_issue_count(count: usize) -> Self {
        match count {
            0 => CheckStatus::Ok,
            n if n > ERROR_ISSUE_THRESHOLD => CheckStatus::Error,
            _ => CheckStatus::Warning,
        }
    }
}

/// Diagnostic result for one server
#[derive(Debug, Clone, Serialize)]
pub struct ServerCheck {
    pub name: String,
    pub path: PathBuf,
    pub status: CheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<RuntimeKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toolchain: Option<String>,
    pub issues: Vec<String>,
}

/// Totals across a set of checks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckSummary {
    pub total: usize,
    pub passing: usize,
    pub warnings: usize,
    pub errors: usize,
}

impl CheckSummary {
    pub fn from_checks(checks: &[ServerCheck]) -> Self {
        let count = |status| checks.iter().filter(|c| c.status == status).count();
        Self {
            total: checks.len(),
            passing: count(CheckStatus::Ok),
            warnings: count(CheckStatus::Warning),
            errors: count(CheckStatus::Error),
        }
    }
}

/// Runs checks, remembering toolchain versions so each program is probed once
pub struct Checker<'a> {
    config: &'a McpctlConfig,
    versions: HashMap<String, Option<String>>,
}

impl<'a> Checker<'a> {
    pub fn new(config: &'a McpctlConfig) -> Self {
        Self {
            config,
            versions: HashMap::new(),
        }
    }

    /// Diagnose the server at `<root>/<name>`
    pub fn check(&mut self, root: &Path, name: &str) -> ServerCheck {
        let path = root.join(name);
        let mut issues = Vec::new();

        if !path.is_dir() {
            issues.push("Directory not found".to_string());
            return ServerCheck {
                name: name.to_string(),
                status: CheckStatus::Error,
                path,
                runtime: None,
                toolchain: None,
                issues,
            };
        }

        let config = self.config;
        let launch = &config.launch;
        let family = detect_family(&path, launch);

        if family == Some(RuntimeFamily::Node) {
            if !path.join("build").is_dir() && !path.join("dist").is_dir() {
                issues.push("No build directory found".to_string());
            }
            if !path.join("node_modules").is_dir() {
                issues.push("Dependencies not installed (no node_modules)".to_string());
            }
        }

        let runtime = match resolve_runtime(&path, launch) {
            Ok(kind) => Some(kind),
            Err(Unresolved::NoEntryPoint { searched }) => {
                issues.push(format!(
                    "Missing main Python file ({})",
                    searched.join(", ")
                ));
                None
            }
            Err(Unresolved::UnknownRuntime) => {
                issues.push("Unknown server type (no package.json or requirements.txt)".to_string());
                None
            }
        };

        let mut toolchain = None;
        if let Some(ref kind) = runtime {
            let program = entry_point_for(kind, launch).program;
            if which::which(&program).is_err() {
                issues.push(format!("'{}' not found on PATH", program));
            } else {
                toolchain = self.version_of(&program);
            }
        }

        issues.extend(check_env_file(&path, config.required_env(name)));

        ServerCheck {
            name: name.to_string(),
            status: CheckStatus::from_issue_count(issues.len()),
            path,
            runtime,
            toolchain,
            issues,
        }
    }

    fn version_of(&mut self, program: &str) -> Option<String> {
        self.versions
            .entry(program.to_string())
            .or_insert_with(|| run_command_stdout(program, &["--version"], SHORT_COMMAND_TIMEOUT))
            .clone()
    }
}

/// Check that every required variable is defined in `<server>/.env`
pub fn check_env_file(server_path: &Path, required: &[String]) -> Vec<String> {
    if required.is_empty() {
        return Vec::new();
    }

    let env_file = server_path.join(".env");
    let Ok(content) = fs::read_to_string(&env_file) else {
        return vec!["Missing .env file".to_string()];
    };

    let defined = parse_env_keys(&content);
    required
        .iter()
        .filter(|var| !defined.contains(var.as_str()))
        .map(|var| format!("Missing environment variable: {}", var))
        .collect()
}

/// Keys assigned in a dotenv file; comments, blank lines and `export` prefixes are handled
fn parse_env_keys(content: &str) -> BTreeSet<&str> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            line.split_once('=').map(|(key, _)| key.trim())
        })
        .filter(|key| !key.is_empty())
        .collect()
}
