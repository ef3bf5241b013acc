//! mcpctl MCP Server Binary
//! JSON-RPC server that lets an assistant manage the MCP servers under the root.
//!
//! ## Usage
//! The server communicates via stdio, reading JSON-RPC requests from stdin
//! and writing responses to stdout. Logs go to stderr.
//!
//! ```bash
//! MCPCTL_ROOT=~/MCP mcpctl-mcp
//! ```
//!
//! ## Available Tools
//!
//! - `list_servers` - Every server directory and its status
//! - `list_running` - Registry entries with verified liveness
//! - `start_server` / `stop_server` - Manage one server
//! - `stop_all` - Stop everything recorded
//! - `clean_stale` - Drop entries whose process is gone
//! - `check_servers` - Installation diagnostics

use anyhow::Context;

use mcpctl::config::{self, McpctlConfig};
use mcpctl::mcp::McpServer;
use mcpctl::supervisor::Supervisor;

fn main() {
    mcpctl::init_tracing("warn");

    if let Err(e) = run() {
        eprintln!("MCP server error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let root = config::resolve_root(None)?;
    let config = McpctlConfig::load(&root)?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration under {}", root.display()))?;

    tracing::info!(root = %root.display(), "mcpctl-mcp listening on stdio");

    McpServer::new(Supervisor::from_config(root, config)).run()
}
