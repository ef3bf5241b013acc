//! MCP tool handlers for mcpctl

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::supervisor::{ServerStatus, Supervisor, SupervisorError};

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{0}")]
    InvalidParams(String),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error("Failed to encode tool result: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type ToolResult = Result<Value, ToolError>;

fn to_value<T: Serialize>(value: &T) -> ToolResult {
    Ok(serde_json::to_value(value)?)
}

fn required_server(args: &Value) -> Result<&str, ToolError> {
    args.get("server")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::InvalidParams("Missing required argument: server".to_string()))
}

/// All servers under the root with their status
pub fn list_servers(supervisor: &Supervisor) -> ToolResult {
    let servers = supervisor.list_known()?;
    let running = servers
        .iter()
        .filter(|s| s.status == ServerStatus::Running)
        .count();

    Ok(serde_json::json!({
        "root": supervisor.root(),
        "total": servers.len(),
        "running": running,
        "servers": to_value(&servers)?
    }))
}

pub fn list_running(supervisor: &Supervisor) -> ToolResult {
    to_value(&supervisor.list_running())
}

pub fn start_server(supervisor: &Supervisor, args: &Value) -> ToolResult {
    let name = required_server(args)?;
    to_value(&supervisor.start(name)?)
}

pub fn stop_server(supervisor: &Supervisor, args: &Value) -> ToolResult {
    let name = required_server(args)?;
    to_value(&supervisor.stop(name)?)
}

pub fn stop_all(supervisor: &Supervisor) -> ToolResult {
    to_value(&supervisor.stop_all()?)
}

pub fn clean_stale(supervisor: &Supervisor) -> ToolResult {
    to_value(&supervisor.clean_stale()?)
}

/// Optional `server` narrows the check to one directory
pub fn check_servers(supervisor: &Supervisor, args: &Value) -> ToolResult {
    let name = args.get("server").and_then(|v| v.as_str());
    to_value(&supervisor.check(name)?)
}
