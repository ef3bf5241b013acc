use anyhow::Result;
use colored::Colorize;

use crate::output::{spinner, McpctlOutput, OutputFormat};
use crate::supervisor::{StopOutcome, StopReport, Supervisor};

use super::report_failure;

pub fn run(supervisor: &Supervisor, server: &str, format: OutputFormat) -> Result<bool> {
    let pb = spinner(format, format!("Stopping {}...", server));
    let result = supervisor.stop(server);
    pb.finish_and_clear();

    let report = match result {
        Ok(report) => report,
        Err(e) => return report_failure("stop", &e, format),
    };

    match format {
        OutputFormat::Json => {
            let output = McpctlOutput::new("stop").with_payload(&report)?;
            println!("{}", output.to_json()?);
        }
        OutputFormat::Text => print_stop(&report),
    }

    Ok(true)
}

/// Text rendering shared with `stopall`
pub(crate) fn print_stop(report: &StopReport) {
    match report.outcome {
        StopOutcome::Graceful { .. } => {
            println!(
                "{} Server {} stopped (PID {})",
                "✓".green().bold(),
                report.name.cyan(),
                report.pid
            );
        }
        StopOutcome::Forced => {
            println!(
                "{} Server {} did not terminate gracefully, sent SIGKILL",
                "⚠".yellow(),
                report.name.cyan()
            );
            println!(
                "{} Server {} forcefully stopped (PID {})",
                "✓".green().bold(),
                report.name.cyan(),
                report.pid
            );
        }
        StopOutcome::AlreadyGone => {
            println!(
                "{} Process {} not found, removed {} from records",
                "✓".green().bold(),
                report.pid,
                report.name.cyan()
            );
        }
    }
}
