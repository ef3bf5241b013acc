//! One module per subcommand. Each `run` returns `Ok(true)` when the operation
//! succeeded, `Ok(false)` when it reported a modeled failure.

pub mod check;
pub mod clean;
pub mod config;
pub mod list;
pub mod running;
pub mod start;
pub mod stop;
pub mod stopall;

use anyhow::Result;
use colored::Colorize;

use crate::launcher::LaunchError;
use crate::output::{McpctlOutput, OutputFormat};
use crate::supervisor::SupervisorError;

/// Report a supervisor failure in the requested format
pub(crate) fn report_failure(command: &str, err: &SupervisorError, format: OutputFormat) -> Result<bool> {
    match format {
        OutputFormat::Json => {
            let output = McpctlOutput::new(command).with_error(err);
            println!("{}", output.to_json()?);
        }
        OutputFormat::Text => {
            println!("{} {}", "Error:".red().bold(), err);

            if let SupervisorError::Launch(LaunchError::EarlyExit {
                stderr_tail: Some(tail),
                ..
            }) = err
            {
                println!();
                println!("{}", "Last lines of stderr:".dimmed());
                for line in tail.lines() {
                    println!("  {}", line.dimmed());
                }
            }
        }
    }
    Ok(false)
}
