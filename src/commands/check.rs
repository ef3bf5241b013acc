use anyhow::Result;
use colored::Colorize;

use crate::checks::CheckStatus;
use crate::output::{McpctlOutput, OutputFormat};
use crate::supervisor::{CheckReport, Supervisor};

use super::report_failure;

pub fn run(supervisor: &Supervisor, server: Option<&str>, format: OutputFormat) -> Result<bool> {
    if format == OutputFormat::Text {
        println!("{}", "Checking MCP server installations...".cyan());
        println!();
    }

    let report = match supervisor.check(server) {
        Ok(report) => report,
        Err(e) => return report_failure("check", &e, format),
    };

    let healthy = report.summary.errors == 0;

    match format {
        OutputFormat::Json => {
            let output = McpctlOutput::new("check")
                .with_success(healthy)
                .with_payload(&report)?;
            println!("{}", output.to_json()?);
        }
        OutputFormat::Text => output_text(&report),
    }

    Ok(healthy)
}

fn output_text(report: &CheckReport) {
    if report.servers.is_empty() {
        println!("No MCP servers found");
        return;
    }

    for check in &report.servers {
        let icon = match check.status {
            CheckStatus::Ok => "✓".green(),
            CheckStatus::Warning => "⚠".yellow(),
            CheckStatus::Error => "✗".red(),
        };

        let runtime = check
            .runtime
            .as_ref()
            .map(|r| r.to_string())
            .unwrap_or_default();
        println!("{} {} {}", icon, check.name.bold(), runtime.dimmed());

        if let Some(ref version) = check.toolchain {
            println!("  {}", version.dimmed());
        }

        for issue in &check.issues {
            println!("  {} {}", "•".dimmed(), issue);
        }
    }

    let summary = &report.summary;
    println!();
    println!(
        "{}: {} passed, {} warnings, {} errors",
        "Summary".bold(),
        summary.passing.to_string().green(),
        summary.warnings.to_string().yellow(),
        summary.errors.to_string().red()
    );

    if summary.warnings == 0 && summary.errors == 0 {
        println!();
        println!("{}", "All servers look ready to start ✨".green().bold());
    }
}
