use anyhow::Result;
use colored::Colorize;

use crate::output::{McpctlOutput, OutputFormat};
use crate::supervisor::{KnownServer, ServerStatus, Supervisor};

use super::report_failure;

pub fn run(supervisor: &Supervisor, format: OutputFormat) -> Result<bool> {
    let servers = match supervisor.list_known() {
        Ok(servers) => servers,
        Err(e) => return report_failure("list", &e, format),
    };

    match format {
        OutputFormat::Json => {
            let output = McpctlOutput::new("list").with_data(serde_json::json!({
                "root": supervisor.root(),
                "total": servers.len(),
                "servers": servers,
            }));
            println!("{}", output.to_json()?);
        }
        OutputFormat::Text => output_text(supervisor, &servers),
    }

    Ok(true)
}

fn output_text(supervisor: &Supervisor, servers: &[KnownServer]) {
    println!(
        "{} {}",
        format!("Found {} MCP servers", servers.len()).bold(),
        format!("in {}", supervisor.root().display()).dimmed()
    );
    println!();

    for server in servers {
        let status = match server.status {
            ServerStatus::Running => "running".green(),
            ServerStatus::Stopped => "stopped".dimmed(),
            ServerStatus::Stale => "running".yellow(),
        };
        let runtime = server
            .runtime
            .as_ref()
            .map(|r| r.to_string())
            .unwrap_or_else(|| "unresolved".to_string());

        println!("- {} [{}] {}", server.name.cyan(), status, runtime.dimmed());

        if let (Some(pid), Some(started_at)) = (server.pid, server.started_at.as_ref()) {
            if server.status == ServerStatus::Stale {
                println!(
                    "  {} Process with PID {} is not running, but is marked as running",
                    "WARNING:".yellow().bold(),
                    pid
                );
            } else {
                println!("  PID: {}, Started at: {}", pid, started_at);
            }
        }
    }

    if servers.iter().any(|s| s.status == ServerStatus::Stale) {
        println!();
        println!(
            "{} Run {} to drop stale records.",
            "→".cyan(),
            "mcpctl clean".cyan()
        );
    }
}
