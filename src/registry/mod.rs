//! Persistent process table.
//!
//! Format: a JSON object keyed by server name
//! ```text
//! { "<server>": { "pid": 4242, "started_at": "2024-01-31 09:15:00" } }
//! ```
//!
//! An entry is a hint, not proof that the process is alive. Callers re-verify
//! liveness before acting on it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Timestamp layout used for `started_at`
pub const STARTED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One tracked server process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub pid: u32,
    pub started_at: String,
    /// Keys written by other tools, carried through rewrites untouched
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl RegistryEntry {
    pub fn new(pid: u32, started_at: impl Into<String>) -> Self {
        Self {
            pid,
            started_at: started_at.into(),
            extra: BTreeMap::new(),
        }
    }
}

/// Full table, ordered by server name
pub type RegistryTable = BTreeMap<String, RegistryEntry>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("process registry {path} is corrupted: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("failed to read process registry {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write process registry {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result of a strict load
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryState {
    /// The file does not exist yet
    Missing,
    /// The file exists and parsed
    Loaded(RegistryTable),
}

impl RegistryState {
    pub fn into_table(self) -> RegistryTable {
        match self {
            RegistryState::Missing => RegistryTable::new(),
            RegistryState::Loaded(table) => table,
        }
    }
}

/// Handle on the registry file
#[derive(Debug, Clone)]
pub struct Registry {
    path: PathBuf,
}

impl Registry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Strict read: distinguishes a missing file from a corrupt one.
    pub fn load(&self) -> Result<RegistryState, RegistryError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(RegistryState::Missing),
            Err(e) => {
                return Err(RegistryError::Read {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        parse_table(&content)
            .map(RegistryState::Loaded)
            .map_err(|reason| RegistryError::Corrupt {
                path: self.path.clone(),
                reason,
            })
    }

    /// Lenient read: a missing, unreadable or corrupt file is an empty table.
    pub fn read_all(&self) -> RegistryTable {
        match self.load() {
            Ok(state) => state.into_table(),
            Err(e) => {
                warn!("{}; treating it as empty", e);
                RegistryTable::new()
            }
        }
    }

    /// Look up one entry (lenient)
    pub fn get(&self, name: &str) -> Option<RegistryEntry> {
        self.read_all().remove(name)
    }

    /// Upsert an entry, replacing whatever was recorded for `name`.
    pub fn record(&self, name: &str, pid: u32, started_at: &str) -> Result<(), RegistryError> {
        let mut table = self.read_all();
        table.insert(name.to_string(), RegistryEntry::new(pid, started_at));
        self.write(&table)?;
        debug!(server = name, pid, "recorded registry entry");
        Ok(())
    }

    /// Delete an entry. Returns whether one was present; absent names are a no-op.
    pub fn remove(&self, name: &str) -> Result<bool, RegistryError> {
        if !self.path.exists() {
            return Ok(false);
        }

        let mut table = self.read_all();
        let removed = table.remove(name).is_some();
        self.write(&table)?;
        if removed {
            debug!(server = name, "removed registry entry");
        }
        Ok(removed)
    }

    /// Write the table atomically via a temp file and rename.
    fn write(&self, table: &RegistryTable) -> Result<(), RegistryError> {
        let to_write_err = |source: io::Error| RegistryError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(to_write_err)?;
            }
        }

        let content = serde_json::to_string_pretty(table)
            .map_err(|e| to_write_err(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        let mut temp_name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        temp_name.push(".tmp");
        let temp_path = self.path.with_file_name(temp_name);

        fs::write(&temp_path, content).map_err(to_write_err)?;
        fs::rename(&temp_path, &self.path).map_err(to_write_err)?;

        Ok(())
    }
}

fn parse_table(content: &str) -> Result<RegistryTable, String> {
    serde_json::from_str::<RegistryTable>(content).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry_in(dir: &TempDir) -> Registry {
        Registry::new(dir.path().join("running_processes.json"))
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = TempDir::new().unwrap();
        let registry = registry_in(&dir);

        assert!(registry.read_all().is_empty());
        assert_eq!(registry.load().unwrap(), RegistryState::Missing);
    }

    #[test]
    fn test_corrupt_file_is_lenient_on_read_all() {
        let dir = TempDir::new().unwrap();
        let registry = registry_in(&dir);
        fs::write(registry.path(), "{ not json").unwrap();

        assert!(registry.read_all().is_empty());
        assert!(matches!(
            registry.load(),
            Err(RegistryError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_record_overwrites_existing_entry() {
        let dir = TempDir::new().unwrap();
        let registry = registry_in(&dir);

        registry.record("qdrant-server", 100, "2024-01-01 10:00:00").unwrap();
        registry.record("qdrant-server", 200, "2024-01-01 11:00:00").unwrap();

        let table = registry.read_all();
        assert_eq!(table.len(), 1);
        assert_eq!(table["qdrant-server"].pid, 200);
        assert_eq!(table["qdrant-server"].started_at, "2024-01-01 11:00:00");
    }

    #[test]
    fn test_record_repairs_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let registry = registry_in(&dir);
        fs::write(registry.path(), "garbage").unwrap();

        registry.record("n8n-mcp-server", 7, "2024-01-01 10:00:00").unwrap();

        let state = registry.load().unwrap();
        assert_eq!(state.into_table().len(), 1);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let dir = TempDir::new().unwrap();
        let registry = registry_in(&dir);

        assert!(!registry.remove("nothing").unwrap());
        assert!(!registry.path().exists());

        registry.record("a-server", 1, "2024-01-01 10:00:00").unwrap();
        assert!(!registry.remove("nothing").unwrap());
        assert_eq!(registry.read_all().len(), 1);
        assert!(registry.remove("a-server").unwrap());
        assert!(registry.read_all().is_empty());
    }

    #[test]
    fn test_unknown_keys_survive_rewrite() {
        let dir = TempDir::new().unwrap();
        let registry = registry_in(&dir);
        fs::write(
            registry.path(),
            r#"{"docs-server": {"pid": 5, "started_at": "2024-01-01 10:00:00", "port": 3016}}"#,
        )
        .unwrap();

        registry.record("other-mcp", 6, "2024-01-01 10:05:00").unwrap();

        let table = registry.read_all();
        assert_eq!(table["docs-server"].extra["port"], serde_json::json!(3016));
    }

    #[test]
    fn test_written_file_is_pretty_printed() {
        let dir = TempDir::new().unwrap();
        let registry = registry_in(&dir);
        registry.record("a-server", 1, "2024-01-01 10:00:00").unwrap();

        let content = fs::read_to_string(registry.path()).unwrap();
        assert!(content.contains("\n  \"a-server\": {\n    \"pid\": 1,"));
    }
}
