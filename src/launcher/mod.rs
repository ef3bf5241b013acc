//! Server launcher.
//!
//! Inspects a server directory, resolves how to run it, spawns it with output
//! captured to `<logs>/<name>.out.log` and `<logs>/<name>.err.log`, and rejects
//! children that exit within the settle delay.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use wait_timeout::ChildExt;

use crate::config::LaunchConfig;

/// Node.js package manifest
pub const PACKAGE_MANIFEST: &str = "package.json";

/// Python dependency manifests
pub const PYTHON_MANIFESTS: [&str; 2] = ["requirements.txt", "pyproject.toml"];

/// Compiled Node.js entry points, searched in order
pub const COMPILED_ARTIFACTS: [&str; 2] = ["build/index.js", "dist/index.js"];

/// Number of trailing stderr lines attached to an early-exit failure
const STDERR_TAIL_LINES: usize = 10;

/// Runtime family inferred from marker files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeFamily {
    Node,
    Python,
}

impl std::fmt::Display for RuntimeFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeFamily::Node => write!(f, "Node.js"),
            RuntimeFamily::Python => write!(f, "Python"),
        }
    }
}

/// How a server is run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuntimeKind {
    /// A built JavaScript bundle run directly with node
    CompiledArtifact { artifact: PathBuf },
    /// No build output; the package manager's `start` script runs it
    PackageManagerManaged,
    /// A conventional Python entry point
    InterpretedScript { script: PathBuf },
}

impl RuntimeKind {
    pub fn family(&self) -> RuntimeFamily {
        match self {
            RuntimeKind::CompiledArtifact { .. } | RuntimeKind::PackageManagerManaged => {
                RuntimeFamily::Node
            }
            RuntimeKind::InterpretedScript { .. } => RuntimeFamily::Python,
        }
    }
}

impl std::fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeKind::CompiledArtifact { artifact } => {
                write!(f, "Node.js ({})", artifact.display())
            }
            RuntimeKind::PackageManagerManaged => write!(f, "Node.js (npm start)"),
            RuntimeKind::InterpretedScript { script } => {
                write!(f, "Python ({})", script.display())
            }
        }
    }
}

/// Program and arguments to spawn, relative to the server root
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryPoint {
    pub program: String,
    pub args: Vec<String>,
}

impl std::fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Everything needed to launch one server. Recomputed on every call, never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerDescriptor {
    pub name: String,
    pub root_path: PathBuf,
    pub runtime_kind: RuntimeKind,
    pub entry_point: EntryPoint,
}

/// Why no entry point could be determined
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Unresolved {
    /// Neither a package manifest, a Python manifest nor a Python entry point exists
    UnknownRuntime,
    /// Python manifest present but none of the conventional entry points
    NoEntryPoint { searched: Vec<String> },
}

impl std::fmt::Display for Unresolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unresolved::UnknownRuntime => write!(
                f,
                "unknown server type (no package.json, requirements.txt or Python entry point)"
            ),
            Unresolved::NoEntryPoint { searched } => write!(
                f,
                "no Python entry point found (looked for {})",
                searched.join(", ")
            ),
        }
    }
}

/// Captured output locations for one server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogPaths {
    pub stdout: PathBuf,
    pub stderr: PathBuf,
}

impl LogPaths {
    pub fn for_server(logs_dir: &Path, name: &str) -> Self {
        Self {
            stdout: logs_dir.join(format!("{}.out.log", name)),
            stderr: logs_dir.join(format!("{}.err.log", name)),
        }
    }
}

/// A child that survived the settle delay
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchedProcess {
    pub pid: u32,
    pub logs: LogPaths,
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("cannot determine how to start {name}: {reason}")]
    Unresolved { name: String, reason: Unresolved },

    #[error("failed to prepare log files in {path}: {source}")]
    Logs {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("server {name} failed to start ({status}). Check logs: {}", stderr_log.display())]
    EarlyExit {
        name: String,
        status: String,
        stderr_log: PathBuf,
        stderr_tail: Option<String>,
    },
}

/// Infer the runtime family from marker files.
pub fn detect_family(root: &Path, config: &LaunchConfig) -> Option<RuntimeFamily> {
    if root.join(PACKAGE_MANIFEST).is_file() {
        return Some(RuntimeFamily::Node);
    }

    let has_python_manifest = PYTHON_MANIFESTS.iter().any(|m| root.join(m).is_file());
    if has_python_manifest || find_python_entry_point(root, config).is_some() {
        return Some(RuntimeFamily::Python);
    }

    None
}

fn find_python_entry_point(root: &Path, config: &LaunchConfig) -> Option<String> {
    config
        .python_entry_points
        .iter()
        .find(|ep| root.join(ep).is_file())
        .cloned()
}

/// Resolve the runtime kind for a server root. First match wins:
/// compiled artifacts, then `npm start`, then Python entry points.
pub fn resolve_runtime(root: &Path, config: &LaunchConfig) -> Result<RuntimeKind, Unresolved> {
    match detect_family(root, config) {
        Some(RuntimeFamily::Node) => {
            let artifact = COMPILED_ARTIFACTS
                .iter()
                .map(PathBuf::from)
                .find(|rel| root.join(rel).is_file());

            Ok(match artifact {
                Some(artifact) => RuntimeKind::CompiledArtifact { artifact },
                None => RuntimeKind::PackageManagerManaged,
            })
        }
        Some(RuntimeFamily::Python) => match find_python_entry_point(root, config) {
            Some(script) => Ok(RuntimeKind::InterpretedScript {
                script: PathBuf::from(script),
            }),
            None => Err(Unresolved::NoEntryPoint {
                searched: config.python_entry_points.clone(),
            }),
        },
        None => Err(Unresolved::UnknownRuntime),
    }
}

/// Build the command line for a resolved runtime
pub fn entry_point_for(kind: &RuntimeKind, config: &LaunchConfig) -> EntryPoint {
    match kind {
        RuntimeKind::CompiledArtifact { artifact } => EntryPoint {
            program: config.node.clone(),
            args: vec![artifact.to_string_lossy().into_owned()],
        },
        RuntimeKind::PackageManagerManaged => EntryPoint {
            program: config.npm.clone(),
            args: vec!["start".to_string()],
        },
        RuntimeKind::InterpretedScript { script } => EntryPoint {
            program: config.python.clone(),
            args: vec![script.to_string_lossy().into_owned()],
        },
    }
}

/// Inspect a server directory and produce its descriptor.
pub fn inspect(name: &str, root: &Path, config: &LaunchConfig) -> Result<ServerDescriptor, LaunchError> {
    let runtime_kind = resolve_runtime(root, config).map_err(|reason| LaunchError::Unresolved {
        name: name.to_string(),
        reason,
    })?;
    let entry_point = entry_point_for(&runtime_kind, config);

    Ok(ServerDescriptor {
        name: name.to_string(),
        root_path: root.to_path_buf(),
        runtime_kind,
        entry_point,
    })
}

/// Spawns servers and performs the post-spawn settle check
#[derive(Debug, Clone)]
pub struct Launcher {
    config: LaunchConfig,
    logs_dir: PathBuf,
}

impl Launcher {
    pub fn new(config: LaunchConfig, logs_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            logs_dir: logs_dir.into(),
        }
    }

    pub fn config(&self) -> &LaunchConfig {
        &self.config
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    pub fn log_paths(&self, name: &str) -> LogPaths {
        LogPaths::for_server(&self.logs_dir, name)
    }

    /// Inspect `root` and resolve how to run the server found there.
    pub fn inspect(&self, name: &str, root: &Path) -> Result<ServerDescriptor, LaunchError> {
        inspect(name, root, &self.config)
    }

    /// Spawn a resolved server. Log files are truncated on every launch.
    pub fn launch(&self, descriptor: &ServerDescriptor) -> Result<LaunchedProcess, LaunchError> {
        let logs = self.log_paths(&descriptor.name);
        let (stdout, stderr) = self.open_logs(&logs)?;

        info!(
            server = %descriptor.name,
            command = %descriptor.entry_point,
            "starting {} server",
            descriptor.runtime_kind.family()
        );

        let mut child = spawn(descriptor, stdout, stderr)?;
        let pid = child.id();
        debug!(server = %descriptor.name, pid, "spawned, waiting {:?} to settle", self.config.settle_delay());

        if let Some(status) = wait_for_exit(&mut child, self.config.settle_delay()) {
            return Err(LaunchError::EarlyExit {
                name: descriptor.name.clone(),
                status,
                stderr_tail: read_tail(&logs.stderr, STDERR_TAIL_LINES),
                stderr_log: logs.stderr,
            });
        }

        reap_in_background(child);

        Ok(LaunchedProcess { pid, logs })
    }

    fn open_logs(&self, logs: &LogPaths) -> Result<(File, File), LaunchError> {
        let to_logs_err = |source: io::Error| LaunchError::Logs {
            path: self.logs_dir.clone(),
            source,
        };

        fs::create_dir_all(&self.logs_dir).map_err(to_logs_err)?;
        let stdout = File::create(&logs.stdout).map_err(to_logs_err)?;
        let stderr = File::create(&logs.stderr).map_err(to_logs_err)?;
        Ok((stdout, stderr))
    }
}

fn spawn(descriptor: &ServerDescriptor, stdout: File, stderr: File) -> Result<Child, LaunchError> {
    // On Windows, run through cmd.exe so npm.cmd and friends resolve from PATH
    #[cfg(windows)]
    let mut command = {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&descriptor.entry_point.program);
        c
    };

    #[cfg(not(windows))]
    let mut command = Command::new(&descriptor.entry_point.program);

    command
        .args(&descriptor.entry_point.args)
        .current_dir(&descriptor.root_path)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .spawn()
        .map_err(|source| LaunchError::Spawn {
            command: descriptor.entry_point.to_string(),
            source,
        })
}

/// Wait up to `settle` for the child to exit. Returns the exit status if it did.
fn wait_for_exit(child: &mut Child, settle: Duration) -> Option<String> {
    match child.wait_timeout(settle) {
        Ok(Some(status)) => Some(status.to_string()),
        Ok(None) => None,
        // Could not wait; fall back to a non-blocking probe
        Err(_) => match child.try_wait() {
            Ok(Some(status)) => Some(status.to_string()),
            _ => None,
        },
    }
}

/// Keep the child from lingering as a zombie while this process is alive.
fn reap_in_background(mut child: Child) {
    std::thread::spawn(move || {
        let _ = child.wait();
    });
}

fn read_tail(path: &Path, lines: usize) -> Option<String> {
    let content = fs::read_to_string(path).ok()?;
    let all: Vec<&str> = content.lines().collect();
    if all.is_empty() {
        return None;
    }
    let start = all.len().saturating_sub(lines);
    Some(all[start..].join("\n"))
}
