use anyhow::Result;
use colored::Colorize;

use crate::output::{McpctlOutput, OutputFormat};
use crate::supervisor::Supervisor;

use super::report_failure;

pub fn run(supervisor: &Supervisor, format: OutputFormat) -> Result<bool> {
    let report = match supervisor.clean_stale() {
        Ok(report) => report,
        Err(e) => return report_failure("clean", &e, format),
    };

    if format == OutputFormat::Json {
        let output = McpctlOutput::new("clean").with_payload(&report)?;
        println!("{}", output.to_json()?);
        return Ok(true);
    }

    if report.checked == 0 {
        println!("No processes to clean");
        return Ok(true);
    }

    println!(
        "Checked {} process records for stale entries",
        report.checked
    );

    if report.removed.is_empty() {
        println!("{} No stale process records found", "✓".green());
        return Ok(true);
    }

    println!();
    println!(
        "{}",
        format!("Removed {} stale entries:", report.removed.len()).bold()
    );
    for entry in &report.removed {
        println!("  {} {} {}", "✓".green(), entry.name.cyan(), format!("(PID: {})", entry.pid).dimmed());
    }

    Ok(true)
}
