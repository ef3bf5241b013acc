use anyhow::Result;
use colored::Colorize;

use crate::output::{spinner, McpctlOutput, OutputFormat};
use crate::supervisor::{StartReport, StopOutcome, Supervisor};

use super::report_failure;

pub fn run(supervisor: &Supervisor, server: &str, format: OutputFormat) -> Result<bool> {
    let pb = spinner(format, format!("Starting {}...", server));
    let result = supervisor.start(server);
    pb.finish_and_clear();

    let report = match result {
        Ok(report) => report,
        Err(e) => return report_failure("start", &e, format),
    };

    match format {
        OutputFormat::Json => {
            let output = McpctlOutput::new("start").with_payload(&report)?;
            println!("{}", output.to_json()?);
        }
        OutputFormat::Text => output_text(&report),
    }

    Ok(true)
}

fn output_text(report: &StartReport) {
    if let Some(ref restarted) = report.restarted {
        let how = match restarted.outcome {
            StopOutcome::Forced => "forcefully stopped",
            _ => "stopped",
        };
        println!(
            "{} Previous instance (PID {}) {}",
            "↻".cyan(),
            restarted.pid,
            how
        );
    }

    println!(
        "{} Server {} started with PID {}",
        "✓".green().bold(),
        report.name.cyan(),
        report.pid.to_string().bold()
    );
    println!("  {} {}", "Runtime:".dimmed(), report.runtime);
    println!("  {} {}", "Command:".dimmed(), report.command);
    println!(
        "  {} {}, {}",
        "Logs:".dimmed(),
        report.logs.stdout.display(),
        report.logs.stderr.display()
    );

    if let Some(old_pid) = report.replaced_pid {
        println!();
        println!(
            "{} Previous process {} is still running but is no longer tracked",
            "⚠".yellow(),
            old_pid
        );
        println!(
            "  Set {} in mcpctl.toml to change this.",
            "[policy] on_already_running".cyan()
        );
    }
}
