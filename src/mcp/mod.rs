//! MCP server for mcpctl
//! Exposes the supervisor operations as JSON-RPC tools so an assistant can
//! start, stop and inspect the MCP servers living under the root.

pub mod handlers;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use tracing::debug;

use crate::supervisor::Supervisor;

use handlers::ToolError;

pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i32 = -32700;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const TOOL_FAILED: i32 = -32000;

/// MCP server bound to one supervisor
pub struct McpServer {
    pub name: String,
    pub version: String,
    supervisor: Supervisor,
}

/// JSON-RPC request structure
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<serde_json::Value>,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// JSON-RPC response structure
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error structure
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<serde_json::Value>, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<serde_json::Value>, code: i32, message: &str) -> Self {
        Self::error_with_data(id, code, message, None)
    }

    pub fn error_with_data(
        id: Option<serde_json::Value>,
        code: i32,
        message: &str,
        data: Option<serde_json::Value>,
    ) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.to_string(),
                data,
            }),
        }
    }
}

/// MCP Tool definition
#[derive(Debug, Serialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

impl McpServer {
    pub fn new(supervisor: Supervisor) -> Self {
        Self {
            name: "mcpctl-mcp".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            supervisor,
        }
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Run the MCP server (stdio mode)
    pub fn run(&self) -> Result<()> {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        let reader = BufReader::new(stdin.lock());

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            if let Some(response) = self.handle_request(&line) {
                let response_json = serde_json::to_string(&response)?;
                writeln!(stdout, "{}", response_json)?;
                stdout.flush()?;
            }
        }

        Ok(())
    }

    /// Handle a single JSON-RPC line. Notifications get no response.
    pub fn handle_request(&self, input: &str) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(input) {
            Ok(r) => r,
            Err(e) => {
                return Some(JsonRpcResponse::error(
                    None,
                    PARSE_ERROR,
                    &format!("Parse error: {}", e),
                ));
            }
        };

        debug!(method = %request.method, "mcp request");

        if request.method.starts_with("notifications/") {
            return None;
        }

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.id),
            "ping" => JsonRpcResponse::success(request.id, serde_json::json!({})),
            "tools/list" => self.handle_list_tools(request.id),
            "tools/call" => self.handle_call_tool(request.id, request.params),
            _ => JsonRpcResponse::error(
                request.id,
                METHOD_NOT_FOUND,
                &format!("Method not found: {}", request.method),
            ),
        };
        Some(response)
    }

    fn handle_initialize(&self, id: Option<serde_json::Value>) -> JsonRpcResponse {
        JsonRpcResponse::success(
            id,
            serde_json::json!({
                "protocolVersion": PROTOCOL_VERSION,
                "serverInfo": {
                    "name": self.name,
                    "version": self.version
                },
                "capabilities": {
                    "tools": {}
                }
            }),
        )
    }

    fn handle_list_tools(&self, id: Option<serde_json::Value>) -> JsonRpcResponse {
        JsonRpcResponse::success(id, serde_json::json!({ "tools": tool_definitions() }))
    }

    fn handle_call_tool(
        &self,
        id: Option<serde_json::Value>,
        params: serde_json::Value,
    ) -> JsonRpcResponse {
        let name = params.get("name").and_then(|n| n.as_str()).unwrap_or("");
        let arguments = params
            .get("arguments")
            .cloned()
            .unwrap_or(serde_json::json!({}));
        let supervisor = &self.supervisor;

        let result = match name {
            "list_servers" => handlers::list_servers(supervisor),
            "list_running" => handlers::list_running(supervisor),
            "start_server" => handlers::start_server(supervisor, &arguments),
            "stop_server" => handlers::stop_server(supervisor, &arguments),
            "stop_all" => handlers::stop_all(supervisor),
            "clean_stale" => handlers::clean_stale(supervisor),
            "check_servers" => handlers::check_servers(supervisor, &arguments),
            _ => {
                return JsonRpcResponse::error(
                    id,
                    INVALID_PARAMS,
                    &format!("Unknown tool: {}", name),
                );
            }
        };

        match result {
            Ok(content) => JsonRpcResponse::success(
                id,
                serde_json::json!({
                    "content": [{
                        "type": "text",
                        "text": serde_json::to_string_pretty(&content).unwrap_or_default()
                    }]
                }),
            ),
            Err(ToolError::InvalidParams(message)) => {
                JsonRpcResponse::error(id, INVALID_PARAMS, &message)
            }
            Err(ToolError::Supervisor(e)) => JsonRpcResponse::error_with_data(
                id,
                TOOL_FAILED,
                &e.to_string(),
                Some(serde_json::json!({ "kind": e.kind() })),
            ),
            Err(ToolError::Serialize(e)) => {
                JsonRpcResponse::error(id, TOOL_FAILED, &e.to_string())
            }
        }
    }
}

fn tool_definitions() -> Vec<Tool> {
    let server_prop = serde_json::json!({
        "type": "string",
        "description": "Server directory name under the MCP root"
    });
    let no_args = serde_json::json!({
        "type": "object",
        "properties": {},
        "required": []
    });

    vec![
        Tool {
            name: "list_servers".to_string(),
            description: "List every server directory under the MCP root with its runtime and whether it is running, stopped or stale".to_string(),
            input_schema: no_args.clone(),
        },
        Tool {
            name: "list_running".to_string(),
            description: "List servers recorded as running, flagging entries whose process is gone".to_string(),
            input_schema: no_args.clone(),
        },
        Tool {
            name: "start_server".to_string(),
            description: "Launch a server in the background and record its PID. Output goes to <name>.out.log and <name>.err.log in the logs directory".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": { "server": server_prop },
                "required": ["server"]
            }),
        },
        Tool {
            name: "stop_server".to_string(),
            description: "Stop a running server: SIGTERM, wait, then SIGKILL if it is still alive".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": { "server": server_prop },
                "required": ["server"]
            }),
        },
        Tool {
            name: "stop_all".to_string(),
            description: "Stop every recorded server".to_string(),
            input_schema: no_args.clone(),
        },
        Tool {
            name: "clean_stale".to_string(),
            description: "Remove registry entries whose process no longer exists".to_string(),
            input_schema: no_args,
        },
        Tool {
            name: "check_servers".to_string(),
            description: "Diagnose server installations (missing builds, interpreters, .env variables) without starting them".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "server": {
                        "type": "string",
                        "description": "Only check this server (default: all)"
                    }
                },
                "required": []
            }),
        },
    ]
}
