use anyhow::Result;
use colored::Colorize;

use crate::output::{McpctlOutput, OutputFormat};
use crate::supervisor::{RunningReport, Supervisor};

pub fn run(supervisor: &Supervisor, format: OutputFormat) -> Result<bool> {
    let report = supervisor.list_running();

    match format {
        OutputFormat::Json => {
            let stale = report.servers.iter().filter(|s| !s.alive).count();
            let output = McpctlOutput::new("running").with_data(serde_json::json!({
                "registry": supervisor.registry().path(),
                "registry_corrupt": report.registry_corrupt,
                "registry_error": report.registry_error,
                "total": report.servers.len(),
                "stale": stale,
                "servers": report.servers,
            }));
            println!("{}", output.to_json()?);
        }
        OutputFormat::Text => output_text(supervisor, &report),
    }

    Ok(true)
}

fn output_text(supervisor: &Supervisor, report: &RunningReport) {
    if report.registry_corrupt {
        println!(
            "{} Could not parse {}",
            "⚠".yellow(),
            supervisor.registry().path().display()
        );
    } else if let Some(ref error) = report.registry_error {
        println!("{} {}", "⚠".yellow(), error);
    }

    if report.servers.is_empty() {
        println!("No running servers found");
        return;
    }

    println!(
        "{}",
        format!("Running MCP servers ({}):", report.servers.len()).bold()
    );
    for server in &report.servers {
        if server.alive {
            println!("- {}", server.name.cyan());
            println!("  PID: {}, Started at: {}", server.pid, server.started_at);
        } else {
            println!("- {} {}", server.name.cyan(), "(STALE)".yellow().bold());
            println!("  PID: {}, Started at: {}", server.pid, server.started_at);
            println!("  {} Process is no longer running", "WARNING:".yellow().bold());
        }
    }
}
