use serde::Serialize;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::launcher::LaunchError;
use crate::registry::RegistryError;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("invalid server name '{name}'")]
    InvalidName { name: String },

    #[error("server {name} not found in {}", root.display())]
    ServerNotFound { name: String, root: PathBuf },

    #[error("server {name} does not appear to be running")]
    NotRunning { name: String },

    #[error("server {name} is already running with PID {pid}")]
    AlreadyRunning { name: String, pid: u32 },

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error("failed to signal server {name} (PID {pid}): {source}")]
    Signal {
        name: String,
        pid: u32,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("failed to scan {}: {source}", path.display())]
    Discovery {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Stable, serializable classification of a [`SupervisorError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidName,
    ServerNotFound,
    NotRunning,
    AlreadyRunning,
    RegistryCorrupt,
    Unresolved,
    EarlyExit,
    SpawnFailed,
    SignalFailed,
    Persistence,
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::InvalidName => "invalid_name",
            ErrorKind::ServerNotFound => "server_not_found",
            ErrorKind::NotRunning => "not_running",
            ErrorKind::AlreadyRunning => "already_running",
            ErrorKind::RegistryCorrupt => "registry_corrupt",
            ErrorKind::Unresolved => "unresolved",
            ErrorKind::EarlyExit => "early_exit",
            ErrorKind::SpawnFailed => "spawn_failed",
            ErrorKind::SignalFailed => "signal_failed",
            ErrorKind::Persistence => "persistence",
            ErrorKind::Io => "io",
        };
        write!(f, "{}", s)
    }
}

impl SupervisorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SupervisorError::InvalidName { .. } => ErrorKind::InvalidName,
            SupervisorError::ServerNotFound { .. } => ErrorKind::ServerNotFound,
            SupervisorError::NotRunning { .. } => ErrorKind::NotRunning,
            SupervisorError::AlreadyRunning { .. } => ErrorKind::AlreadyRunning,
            SupervisorError::Launch(LaunchError::Unresolved { .. }) => ErrorKind::Unresolved,
            SupervisorError::Launch(LaunchError::EarlyExit { .. }) => ErrorKind::EarlyExit,
            SupervisorError::Launch(LaunchError::Spawn { .. }) => ErrorKind::SpawnFailed,
            SupervisorError::Launch(LaunchError::Logs { .. }) => ErrorKind::Io,
            SupervisorError::Signal { .. } => ErrorKind::SignalFailed,
            SupervisorError::Registry(RegistryError::Corrupt { .. }) => ErrorKind::RegistryCorrupt,
            SupervisorError::Registry(_) => ErrorKind::Persistence,
            SupervisorError::Discovery { .. } => ErrorKind::Io,
        }
    }

    pub fn info(&self) -> ErrorInfo {
        ErrorInfo::from(self)
    }
}

/// Error kind plus message, for callers that branch on kind or emit JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&SupervisorError> for ErrorInfo {
    fn from(err: &SupervisorError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::Unresolved;

    #[test]
    fn test_kind_distinguishes_launch_failures() {
        let unresolved = SupervisorError::from(LaunchError::Unresolved {
            name: "x-server".to_string(),
            reason: Unresolved::UnknownRuntime,
        });
        let early = SupervisorError::from(LaunchError::EarlyExit {
            name: "x-server".to_string(),
            status: "exit status: 1".to_string(),
            stderr_log: PathBuf::from("logs/x-server.err.log"),
            stderr_tail: None,
        });

        assert_eq!(unresolved.kind(), ErrorKind::Unresolved);
        assert_eq!(early.kind(), ErrorKind::EarlyExit);
        assert!(early.to_string().contains("logs/x-server.err.log"));
    }

    #[test]
    fn test_corrupt_registry_kind() {
        let err = SupervisorError::from(RegistryError::Corrupt {
            path: PathBuf::from("running_processes.json"),
            reason: "expected value".to_string(),
        });
        assert_eq!(err.kind(), ErrorKind::RegistryCorrupt);
        assert_eq!(
            serde_json::to_value(err.info()).unwrap()["kind"],
            "registry_corrupt"
        );
    }
}
