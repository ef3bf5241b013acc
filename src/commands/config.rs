//! Configuration commands for mcpctl
//! Provides `mcpctl config init`, `mcpctl config validate` and `mcpctl config show`.

use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::path::Path;

use crate::config::McpctlConfig;
use crate::output::{McpctlOutput, OutputFormat};

/// Config subcommand action
#[derive(Debug, Clone)]
pub enum ConfigAction {
    Init { force: bool },
    Validate,
    Show,
}

/// Run the config command
pub fn run(action: ConfigAction, root: &Path, path: &Path, format: OutputFormat) -> Result<bool> {
    match action {
        ConfigAction::Init { force } => run_init(path, force, format),
        ConfigAction::Validate => run_validate(path, format),
        ConfigAction::Show => run_show(root, path, format),
    }
}

/// Create a default mcpctl.toml
fn run_init(path: &Path, force: bool, format: OutputFormat) -> Result<bool> {
    if path.exists() && !force {
        if format == OutputFormat::Json {
            let output = McpctlOutput::new("config init")
                .with_success(false)
                .with_data(serde_json::json!({
                    "error": "Config file already exists",
                    "path": path,
                    "hint": "Use --force to overwrite"
                }));
            println!("{}", output.to_json()?);
        } else {
            println!(
                "{} {} already exists",
                "Error:".red().bold(),
                path.display().to_string().cyan()
            );
            println!("Use {} to overwrite.", "--force".cyan());
        }
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let config = McpctlConfig::create_default(path)?;

    if format == OutputFormat::Json {
        let output = McpctlOutput::new("config init")
            .with_data(serde_json::json!({
                "path": path,
                "created": true,
                "config": config
            }));
        println!("{}", output.to_json()?);
    } else {
        println!(
            "{} Created {}",
            "✓".green().bold(),
            path.display().to_string().cyan()
        );
        println!();
        println!("You can customize:");
        println!("  • {} - Interpreters, entry points, settle delay", "[launch]".cyan());
        println!("  • {} - Graceful stop polling", "[stop]".cyan());
        println!("  • {} - What a second `start` does", "[policy]".cyan());
        println!(
            "  • {} - Required .env variables per server",
            "[servers.<name>]".cyan()
        );
    }

    Ok(true)
}

/// Validate the configuration file
fn run_validate(path: &Path, format: OutputFormat) -> Result<bool> {
    if !path.exists() {
        if format == OutputFormat::Json {
            let output = McpctlOutput::new("config validate")
                .with_success(false)
                .with_data(serde_json::json!({
                    "error": "Config file not found",
                    "path": path,
                    "hint": "Run `mcpctl config init` to create one"
                }));
            println!("{}", output.to_json()?);
        } else {
            println!(
                "{} {} not found",
                "Error:".red().bold(),
                path.display().to_string().cyan()
            );
            println!("Run {} to create one.", "mcpctl config init".cyan());
        }
        return Ok(false);
    }

    let error = match McpctlConfig::load_from(path) {
        Ok(config) => match config.validate() {
            Ok(()) => {
                print_valid(path, &config, format)?;
                return Ok(true);
            }
            Err(e) => format!("{:#}", e),
        },
        Err(e) => format!("{:#}", e),
    };

    if format == OutputFormat::Json {
        let output = McpctlOutput::new("config validate")
            .with_success(false)
            .with_data(serde_json::json!({
                "path": path,
                "valid": false,
                "error": error
            }));
        println!("{}", output.to_json()?);
    } else {
        println!(
            "{} {} has errors",
            "✗".red().bold(),
            path.display().to_string().cyan()
        );
        println!("  {}", error);
    }

    Ok(false)
}

fn print_valid(path: &Path, config: &McpctlConfig, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        let output = McpctlOutput::new("config validate").with_data(serde_json::json!({
            "path": path,
            "valid": true,
            "configured_servers": config.servers.len()
        }));
        println!("{}", output.to_json()?);
        return Ok(());
    }

    println!(
        "{} {} is valid",
        "✓".green().bold(),
        path.display().to_string().cyan()
    );
    println!();
    println!(
        "  {} Double start policy: {}",
        "→".cyan(),
        config.policy.on_already_running
    );
    println!(
        "  {} Stop: {} polls every {} ms",
        "→".cyan(),
        config.stop.poll_attempts,
        config.stop.poll_interval_ms
    );
    if !config.servers.is_empty() {
        println!(
            "  {} per-server sections: {}",
            config.servers.len(),
            config
                .servers
                .keys()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
                .dimmed()
        );
    }

    Ok(())
}

/// Print the effective configuration and resolved paths
fn run_show(root: &Path, path: &Path, format: OutputFormat) -> Result<bool> {
    let config = McpctlConfig::load_from(path)?;

    if format == OutputFormat::Json {
        let output = McpctlOutput::new("config show").with_data(serde_json::json!({
            "root": root,
            "config_file": path,
            "config_file_exists": path.exists(),
            "registry": config.registry_path(root),
            "logs": config.logs_dir(root),
            "config": config
        }));
        println!("{}", output.to_json()?);
        return Ok(true);
    }

    println!("{}", "Effective configuration".bold().cyan());
    println!("{}", "═".repeat(50).dimmed());
    println!("  Root:     {}", root.display());
    let source = if path.exists() {
        path.display().to_string()
    } else {
        format!("{} (not found, using defaults)", path.display())
    };
    println!("  Config:   {}", source);
    println!("  Registry: {}", config.registry_path(root).display());
    println!("  Logs:     {}", config.logs_dir(root).display());
    println!();
    print!(
        "{}",
        toml::to_string_pretty(&config).context("Failed to serialize config")?
    );

    Ok(true)
}
