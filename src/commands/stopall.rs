use anyhow::Result;
use colored::Colorize;

use crate::output::{spinner, McpctlOutput, OutputFormat};
use crate::supervisor::Supervisor;

use super::report_failure;
use super::stop::print_stop;

pub fn run(supervisor: &Supervisor, format: OutputFormat) -> Result<bool> {
    let pb = spinner(format, "Stopping all running servers...");
    let result = supervisor.stop_all();
    pb.finish_and_clear();

    let report = match result {
        Ok(report) => report,
        Err(e) => return report_failure("stopall", &e, format),
    };
    let all_stopped = report.stopped == report.attempted;

    match format {
        OutputFormat::Json => {
            let output = McpctlOutput::new("stopall")
                .with_success(all_stopped)
                .with_payload(&report)?;
            println!("{}", output.to_json()?);
        }
        OutputFormat::Text => {
            if report.attempted == 0 {
                println!("No running servers found");
                return Ok(true);
            }

            println!(
                "{}",
                format!("Stopping all running MCP servers ({})...", report.attempted).bold()
            );
            for item in &report.results {
                println!();
                if let Some(ref stopped) = item.stopped {
                    print_stop(stopped);
                } else if let Some(ref error) = item.error {
                    println!("{} {} - {}", "✗".red(), item.name.cyan(), error.message);
                }
            }

            println!();
            let summary = format!(
                "Successfully stopped {} out of {} servers",
                report.stopped, report.attempted
            );
            if all_stopped {
                println!("{}", summary.green());
            } else {
                println!("{}", summary.yellow());
            }
        }
    }

    Ok(all_stopped)
}
