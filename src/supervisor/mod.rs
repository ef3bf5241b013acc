//! Process supervisor.
//!
//! The only component that touches both the [`Launcher`] and the [`Registry`].
//! Per server name the lifecycle is
//! `unknown → starting → running → stopping → stopped`, with `stale` for any
//! registry entry whose PID is no longer alive. Every decision that depends on
//! liveness re-checks the OS; the registry is only a hint.

mod error;

pub use error::{ErrorInfo, ErrorKind, SupervisorError};

use chrono::Local;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::thread;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::checks::{CheckSummary, Checker, ServerCheck};
use crate::config::{AlreadyRunningPolicy, McpctlConfig};
use crate::launcher::{Launcher, LogPaths, RuntimeKind};
use crate::process::{self, SignalDelivery};
use crate::registry::{Registry, RegistryEntry, RegistryError, RegistryState, RegistryTable, STARTED_AT_FORMAT};

/// Result of a successful start
#[derive(Debug, Clone, Serialize)]
pub struct StartReport {
    pub name: String,
    pub pid: u32,
    pub started_at: String,
    pub runtime: RuntimeKind,
    pub command: String,
    pub logs: LogPaths,
    /// PID of a live process that was tracked under this name and is now untracked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaced_pid: Option<u32>,
    /// Stop performed first under the `restart` policy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restarted: Option<StopReport>,
}

/// How a stopped process went away
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StopOutcome {
    /// Exited after SIGTERM, observed on poll number `polls`
    Graceful { polls: u32 },
    /// Still alive after every poll; SIGKILL was sent and not re-verified
    Forced,
    /// No process with the recorded PID existed when SIGTERM was sent
    AlreadyGone,
}

/// Result of a successful stop
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StopReport {
    pub name: String,
    pub pid: u32,
    #[serde(flatten)]
    pub outcome: StopOutcome,
}

/// Registry-derived state of a discovered server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Running,
    Stopped,
    /// Marked running but the recorded PID is dead
    Stale,
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerStatus::Running => write!(f, "running"),
            ServerStatus::Stopped => write!(f, "stopped"),
            ServerStatus::Stale => write!(f, "stale"),
        }
    }
}

/// A server directory found under the root
#[derive(Debug, Clone, Serialize)]
pub struct KnownServer {
    pub name: String,
    pub path: PathBuf,
    pub status: ServerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<RuntimeKind>,
}

/// One registry entry with its verified liveness
#[derive(Debug, Clone, Serialize)]
pub struct RunningServer {
    pub name: String,
    pub pid: u32,
    pub started_at: String,
    pub alive: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunningReport {
    /// The registry file exists but could not be parsed
    pub registry_corrupt: bool,
    /// The registry file exists but could not be read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_error: Option<String>,
    pub servers: Vec<RunningServer>,
}

/// Per-server result inside [`StopAllReport`]
#[derive(Debug, Clone, Serialize)]
pub struct StopAllItem {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stopped: Option<StopReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StopAllReport {
    pub attempted: usize,
    pub stopped: usize,
    pub results: Vec<StopAllItem>,
}

/// An entry removed by [`Supervisor::clean_stale`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaleEntry {
    pub name: String,
    pub pid: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanReport {
    pub checked: usize,
    pub removed: Vec<StaleEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub summary: CheckSummary,
    pub servers: Vec<ServerCheck>,
}

/// Orchestrates start/stop/list/clean for the servers under one root
#[derive(Debug, Clone)]
pub struct Supervisor {
    root: PathBuf,
    config: McpctlConfig,
    registry: Registry,
    launcher: Launcher,
}

impl Supervisor {
    /// Build a supervisor from explicit collaborators.
    pub fn new(root: impl Into<PathBuf>, config: McpctlConfig, registry: Registry, launcher: Launcher) -> Self {
        Self {
            root: root.into(),
            config,
            registry,
            launcher,
        }
    }

    /// Build a supervisor whose registry and launcher follow `config`
    pub fn from_config(root: impl Into<PathBuf>, config: McpctlConfig) -> Self {
        let root = root.into();
        let registry = Registry::new(config.registry_path(&root));
        let launcher = Launcher::new(config.launch.clone(), config.logs_dir(&root));
        Self::new(root, config, registry, launcher)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &McpctlConfig {
        &self.config
    }

    /// Start a server and record it.
    ///
    /// On any failure the registry is left untouched.
    pub fn start(&self, name: &str) -> Result<StartReport, SupervisorError> {
        let server_path = self.server_path(name)?;
        if !server_path.is_dir() {
            return Err(SupervisorError::ServerNotFound {
                name: name.to_string(),
                root: self.root.clone(),
            });
        }

        let descriptor = self.launcher.inspect(name, &server_path)?;

        let mut replaced_pid = None;
        let mut restarted = None;
        if let Some(existing) = self.registry.get(name) {
            if process::is_alive(existing.pid) {
                match self.config.policy.on_already_running {
                    AlreadyRunningPolicy::Refuse => {
                        return Err(SupervisorError::AlreadyRunning {
                            name: name.to_string(),
                            pid: existing.pid,
                        });
                    }
                    AlreadyRunningPolicy::Restart => {
                        info!(server = name, pid = existing.pid, "restarting running server");
                        restarted = Some(self.stop(name)?);
                    }
                    AlreadyRunningPolicy::Replace => {
                        warn!(
                            server = name,
                            pid = existing.pid,
                            "server already running; the old process will no longer be tracked"
                        );
                        replaced_pid = Some(existing.pid);
                    }
                }
            } else {
                debug!(server = name, pid = existing.pid, "overwriting stale registry entry");
            }
        }

        let launched = self.launcher.launch(&descriptor)?;
        let started_at = Local::now().format(STARTED_AT_FORMAT).to_string();
        self.registry.record(name, launched.pid, &started_at)?;

        info!(server = name, pid = launched.pid, "server started");

        Ok(StartReport {
            name: name.to_string(),
            pid: launched.pid,
            started_at,
            command: descriptor.entry_point.to_string(),
            runtime: descriptor.runtime_kind,
            logs: launched.logs,
            replaced_pid,
            restarted,
        })
    }

    /// Stop a recorded server: SIGTERM, poll, then SIGKILL.
    ///
    /// A PID that no longer exists is convergence, not failure: the entry is removed
    /// and the stop succeeds.
    pub fn stop(&self, name: &str) -> Result<StopReport, SupervisorError> {
        let table = self.registry.load()?.into_table();
        let entry = table.get(name).ok_or_else(|| SupervisorError::NotRunning {
            name: name.to_string(),
        })?;

        let outcome = self.terminate(name, entry.pid)?;
        self.registry.remove(name)?;

        info!(server = name, pid = entry.pid, ?outcome, "server stopped");

        Ok(StopReport {
            name: name.to_string(),
            pid: entry.pid,
            outcome,
        })
    }

    fn terminate(&self, name: &str, pid: u32) -> Result<StopOutcome, SupervisorError> {
        let signal_err = |source| SupervisorError::Signal {
            name: name.to_string(),
            pid,
            source,
        };

        if process::terminate(pid).map_err(signal_err)? == SignalDelivery::NoSuchProcess {
            debug!(server = name, pid, "process not found, dropping record");
            return Ok(StopOutcome::AlreadyGone);
        }
        debug!(server = name, pid, "sent SIGTERM");

        let attempts = self.config.stop.poll_attempts;
        for poll in 1..=attempts {
            if !process::is_alive(pid) {
                return Ok(StopOutcome::Graceful { polls: poll });
            }
            thread::sleep(self.config.stop.poll_interval());
        }

        warn!(server = name, pid, "did not terminate gracefully, sending SIGKILL");
        match process::force_kill(pid).map_err(signal_err)? {
            SignalDelivery::Sent => Ok(StopOutcome::Forced),
            // Exited between the last poll and the kill
            SignalDelivery::NoSuchProcess => Ok(StopOutcome::Graceful { polls: attempts }),
        }
    }

    /// Discovered server directories with their registry status. Read-only.
    pub fn list_known(&self) -> Result<Vec<KnownServer>, SupervisorError> {
        let table = self.registry.read_all();
        let mut servers = Vec::new();

        for name in self.discover()? {
            let path = self.root.join(&name);
            let runtime = self.launcher.inspect(&name, &path).ok().map(|d| d.runtime_kind);

            let server = match table.get(&name) {
                Some(entry) => {
                    let status = if process::is_alive(entry.pid) {
                        ServerStatus::Running
                    } else {
                        debug!(
                            server = %name,
                            pid = entry.pid,
                            "marked as running but the process is gone"
                        );
                        ServerStatus::Stale
                    };
                    KnownServer {
                        name,
                        path,
                        status,
                        pid: Some(entry.pid),
                        started_at: Some(entry.started_at.clone()),
                        runtime,
                    }
                }
                None => KnownServer {
                    name,
                    path,
                    status: ServerStatus::Stopped,
                    pid: None,
                    started_at: None,
                    runtime,
                },
            };
            servers.push(server);
        }

        Ok(servers)
    }

    /// Directory names under the root that follow the managed-server naming convention
    pub fn discover(&self) -> Result<Vec<String>, SupervisorError> {
        let mut names = Vec::new();

        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|source| SupervisorError::Discovery {
                path: self.root.clone(),
                source,
            })?;

            // Follows symlinks, so linked checkouts count as servers
            if !entry.path().is_dir() {
                continue;
            }

            let Some(name) = entry.file_name().to_str() else {
                continue;
            };

            if name.starts_with('.') || !self.config.discovery.matches(name) {
                continue;
            }

            names.push(name.to_string());
        }

        names.sort();
        Ok(names)
    }

    /// Registry entries with verified liveness. Never mutates the registry.
    pub fn list_running(&self) -> RunningReport {
        let mut registry_corrupt = false;
        let mut registry_error = None;
        let table = match self.registry.load() {
            Ok(state) => state.into_table(),
            Err(e @ RegistryError::Corrupt { .. }) => {
                debug!("{}", e);
                registry_corrupt = true;
                RegistryTable::new()
            }
            Err(e) => {
                warn!("{}", e);
                registry_error = Some(e.to_string());
                RegistryTable::new()
            }
        };

        let servers = table
            .into_iter()
            .map(|(name, entry)| RunningServer {
                alive: process::is_alive(entry.pid),
                name,
                pid: entry.pid,
                started_at: entry.started_at,
            })
            .collect();

        RunningReport {
            registry_corrupt,
            registry_error,
            servers,
        }
    }

    /// Stop every recorded server independently; failures do not abort the loop.
    pub fn stop_all(&self) -> Result<StopAllReport, SupervisorError> {
        let names: Vec<String> = self.registry.load()?.into_table().into_keys().collect();

        let mut results = Vec::with_capacity(names.len());
        for name in names {
            let item = match self.stop(&name) {
                Ok(report) => StopAllItem {
                    name,
                    stopped: Some(report),
                    error: None,
                },
                Err(e) => {
                    debug!(server = %name, "stop failed: {}", e);
                    StopAllItem {
                        name,
                        stopped: None,
                        error: Some(e.info()),
                    }
                }
            };
            results.push(item);
        }

        Ok(StopAllReport {
            attempted: results.len(),
            stopped: results.iter().filter(|r| r.stopped.is_some()).count(),
            results,
        })
    }

    /// Remove every registry entry whose process is dead.
    pub fn clean_stale(&self) -> Result<CleanReport, SupervisorError> {
        let table = match self.registry.load()? {
            RegistryState::Missing => RegistryTable::new(),
            RegistryState::Loaded(table) => table,
        };

        let stale: Vec<StaleEntry> = table
            .iter()
            .filter(|(_, entry)| !process::is_alive(entry.pid))
            .map(|(name, entry)| StaleEntry {
                name: name.clone(),
                pid: entry.pid,
            })
            .collect();

        for entry in &stale {
            info!(server = %entry.name, pid = entry.pid, "removing stale registry entry");
            self.registry.remove(&entry.name)?;
        }

        Ok(CleanReport {
            checked: table.len(),
            removed: stale,
        })
    }

    /// Diagnose one server, or every discovered server when `name` is None.
    pub fn check(&self, name: Option<&str>) -> Result<CheckReport, SupervisorError> {
        let names = match name {
            Some(n) => {
                validate_name(n)?;
                vec![n.to_string()]
            }
            None => self.discover()?,
        };

        let mut checker = Checker::new(&self.config);
        let servers: Vec<ServerCheck> = names
            .iter()
            .map(|n| checker.check(&self.root, n))
            .collect();

        Ok(CheckReport {
            summary: CheckSummary::from_checks(&servers),
            servers,
        })
    }

    /// Registry entry for a name, if any (lenient)
    pub fn entry(&self, name: &str) -> Option<RegistryEntry> {
        self.registry.get(name)
    }

    fn server_path(&self, name: &str) -> Result<PathBuf, SupervisorError> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }
}

/// Server names are single directory components under the root.
fn validate_name(name: &str) -> Result<(), SupervisorError> {
    let invalid = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);

    if invalid {
        return Err(SupervisorError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}
