//! mcpctl - MCP server process supervisor
//! This library discovers MCP server directories under a root, launches them as
//! detached background processes, and tracks them in a persistent registry so
//! later invocations can stop, list, and clean them up.

pub mod checks;
pub mod config;
pub mod launcher;
pub mod mcp;
pub mod output;
pub mod process;
pub mod registry;
pub mod supervisor;
pub mod utils;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

// Re-export main types for convenience
pub use checks::{CheckStatus, CheckSummary, ServerCheck};
pub use config::{AlreadyRunningPolicy, McpctlConfig};
pub use launcher::{EntryPoint, LaunchError, Launcher, RuntimeKind, ServerDescriptor};
pub use output::{McpctlOutput, OutputFormat};
pub use registry::{Registry, RegistryEntry, RegistryError};
pub use supervisor::{ErrorKind, Supervisor, SupervisorError};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the global stderr subscriber. `RUST_LOG` wins over `default_filter`.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .try_init();
}
