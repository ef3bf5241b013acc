//! Configuration module for mcpctl
//! Handles loading and parsing of the optional `mcpctl.toml` file that lives in the
//! servers root.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name, looked up inside the servers root
pub const CONFIG_FILE: &str = "mcpctl.toml";

/// Environment variable that overrides the servers root
pub const ROOT_ENV_VAR: &str = "MCPCTL_ROOT";

/// Directory name under the home directory used when no root is given
pub const DEFAULT_ROOT_DIR: &str = "MCP";

/// Upper bound for the settle delay, anything above is almost certainly a typo
const MAX_SETTLE_DELAY_MS: u64 = 60_000;

/// Main configuration structure for mcpctl
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct McpctlConfig {
    /// Where the process table is persisted
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Where per-server output is captured
    #[serde(default)]
    pub logs: LogsConfig,

    /// Runtime programs, entry points and the post-spawn settle delay
    #[serde(default)]
    pub launch: LaunchConfig,

    /// Graceful stop polling
    #[serde(default)]
    pub stop: StopConfig,

    /// Behaviour when a server is started twice
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Which directories under the root count as managed servers
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Per-server settings, keyed by directory name
    #[serde(default)]
    pub servers: BTreeMap<String, ServerConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Registry file, relative paths resolve against the root
    #[serde(default = "default_registry_file")]
    pub file: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            file: default_registry_file(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogsConfig {
    /// Log directory, relative paths resolve against the root
    #[serde(default = "default_logs_dir")]
    pub dir: PathBuf,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            dir: default_logs_dir(),
        }
    }
}

/// Launch settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchConfig {
    /// How long to wait after spawning before declaring the start successful
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Program used for compiled Node.js artifacts
    #[serde(default = "default_node")]
    pub node: String,

    /// Package manager used for the `start` fallback
    #[serde(default = "default_npm")]
    pub npm: String,

    /// Interpreter used for Python entry points
    #[serde(default = "default_python")]
    pub python: String,

    /// Conventional Python entry points, searched in order
    #[serde(default = "default_python_entry_points")]
    pub python_entry_points: Vec<String>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
            node: default_node(),
            npm: default_npm(),
            python: default_python(),
            python_entry_points: default_python_entry_points(),
        }
    }
}

impl LaunchConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Graceful stop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopConfig {
    /// Number of liveness polls after SIGTERM before escalating to SIGKILL
    #[serde(default = "default_poll_attempts")]
    pub poll_attempts: u32,

    /// Pause between liveness polls
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for StopConfig {
    fn default() -> Self {
        Self {
            poll_attempts: default_poll_attempts(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl StopConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// What `start` does when the registry already tracks a live process for the name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlreadyRunningPolicy {
    /// Launch anyway and overwrite the entry; the old process is left untracked
    #[default]
    Replace,
    /// Refuse to start
    Refuse,
    /// Stop the tracked process, then launch
    Restart,
}

impl std::fmt::Display for AlreadyRunningPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlreadyRunningPolicy::Replace => write!(f, "replace"),
            AlreadyRunningPolicy::Refuse => write!(f, "refuse"),
            AlreadyRunningPolicy::Restart => write!(f, "restart"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub on_already_running: AlreadyRunningPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Case-insensitive substrings; a directory matching any of them is a managed server
    #[serde(default = "default_name_patterns")]
    pub name_patterns: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            name_patterns: default_name_patterns(),
        }
    }
}

impl DiscoveryConfig {
    /// Check whether a directory name follows the managed-server naming convention
    pub fn matches(&self, dir_name: &str) -> bool {
        let lower = dir_name.to_lowercase();
        self.name_patterns
            .iter()
            .any(|pattern| lower.contains(&pattern.to_lowercase()))
    }
}

/// Settings for a single server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Variables that must be defined in the server's `.env` file
    #[serde(default)]
    pub required_env: Vec<String>,
}

fn default_registry_file() -> PathBuf {
    PathBuf::from("running_processes.json")
}

fn default_logs_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_settle_delay_ms() -> u64 {
    2000
}

fn default_node() -> String {
    "node".to_string()
}

fn default_npm() -> String {
    "npm".to_string()
}

fn default_python() -> String {
    "python".to_string()
}

fn default_python_entry_points() -> Vec<String> {
    vec![
        "app.py".to_string(),
        "main.py".to_string(),
        "server.py".to_string(),
    ]
}

fn default_poll_attempts() -> u32 {
    5
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_name_patterns() -> Vec<String> {
    vec!["server".to_string(), "mcp".to_string()]
}

/// Resolve the servers root: explicit value, then `$MCPCTL_ROOT`, then `~/MCP`
pub fn resolve_root(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    if let Ok(value) = std::env::var(ROOT_ENV_VAR) {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value));
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(DEFAULT_ROOT_DIR))
}

impl McpctlConfig {
    /// Load configuration from `<root>/mcpctl.toml`
    pub fn load(root: &Path) -> Result<Self> {
        Self::load_from(&root.join(CONFIG_FILE))
    }

    /// Load configuration from a specific path, defaults if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: McpctlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        let header = "# mcpctl configuration\n# Relative paths resolve against the servers root.\n\n";
        let full_content = format!("{}{}", header, content);

        fs::write(path, full_content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Create a default configuration file
    pub fn create_default(path: &Path) -> Result<Self> {
        let config = Self::default();
        config.save(path)?;
        Ok(config)
    }

    /// Absolute path of the registry file for a given root
    pub fn registry_path(&self, root: &Path) -> PathBuf {
        root.join(&self.registry.file)
    }

    /// Absolute path of the logs directory for a given root
    pub fn logs_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.logs.dir)
    }

    /// Required `.env` variables for a server, empty when not configured
    pub fn required_env(&self, server: &str) -> &[String] {
        self.servers
            .get(server)
            .map(|s| s.required_env.as_slice())
            .unwrap_or(&[])
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.stop.poll_attempts == 0 {
            anyhow::bail!("stop.poll_attempts must be at least 1");
        }

        if self.launch.settle_delay_ms > MAX_SETTLE_DELAY_MS {
            anyhow::bail!(
                "launch.settle_delay_ms ({}) exceeds the maximum of {} ms",
                self.launch.settle_delay_ms,
                MAX_SETTLE_DELAY_MS
            );
        }

        if self.launch.python_entry_points.is_empty() {
            anyhow::bail!("launch.python_entry_points must list at least one file");
        }

        if let Some(bad) = self
            .launch
            .python_entry_points
            .iter()
            .find(|ep| ep.contains('/') || ep.contains('\\'))
        {
            anyhow::bail!("launch.python_entry_points entry '{}' must be a bare file name", bad);
        }

        for (field, value) in [
            ("launch.node", &self.launch.node),
            ("launch.npm", &self.launch.npm),
            ("launch.python", &self.launch.python),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("{} must not be empty", field);
            }
        }

        if self.discovery.name_patterns.is_empty()
            || self.discovery.name_patterns.iter().any(|p| p.is_empty())
        {
            anyhow::bail!("discovery.name_patterns must contain non-empty patterns");
        }

        Ok(())
    }
}
