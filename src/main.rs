use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod commands;

use mcpctl::{checks, config, launcher, output, supervisor};

use commands::config::ConfigAction;
use config::{McpctlConfig, CONFIG_FILE, ROOT_ENV_VAR};
use output::OutputFormat;
use supervisor::Supervisor;

/// mcpctl - start, stop and track MCP servers
/// Launches servers found under the MCP root as background processes and
/// keeps a registry of their PIDs.
#[derive(Parser)]
#[command(name = "mcpctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output format (text, json)
    #[arg(long, global = true, default_value = "text")]
    format: String,

    /// Directory containing the MCP server directories
    #[arg(long, global = true, env = ROOT_ENV_VAR)]
    root: Option<PathBuf>,

    /// Configuration file (defaults to <root>/mcpctl.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a server in the background
    Start {
        /// Server directory name under the root
        server: String,
    },

    /// Stop a running server
    Stop {
        /// Server directory name under the root
        server: String,
    },

    /// List all known servers and their status
    List,

    /// Show servers recorded as running
    Running,

    /// Stop every recorded server
    #[command(name = "stopall")]
    StopAll,

    /// Remove registry entries whose process is gone
    Clean,

    /// Diagnose server installations without starting them
    Check {
        /// Only check this server
        server: Option<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Create a default mcpctl.toml
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Validate configuration file
    Validate,

    /// Print the effective configuration
    Show,
}

fn main() {
    let cli = Cli::parse();
    let format = OutputFormat::from_str(&cli.format);
    let is_json = format == OutputFormat::Json;

    let default_filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    mcpctl::init_tracing(default_filter);

    let result = run(cli, format);

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            if is_json {
                let error_output = serde_json::json!({
                    "success": false,
                    "error": format!("{:#}", e),
                    "timestamp": chrono::Utc::now().to_rfc3339()
                });
                eprintln!(
                    "{}",
                    serde_json::to_string_pretty(&error_output).unwrap_or_default()
                );
            } else {
                eprintln!("{} {:#}", "Error:".red().bold(), e);
            }
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli, format: OutputFormat) -> anyhow::Result<bool> {
    let root = config::resolve_root(cli.root.as_deref())?;
    let config_path = cli.config.unwrap_or_else(|| root.join(CONFIG_FILE));

    if let Commands::Config { action } = cli.command {
        let action = match action {
            ConfigCommands::Init { force } => ConfigAction::Init { force },
            ConfigCommands::Validate => ConfigAction::Validate,
            ConfigCommands::Show => ConfigAction::Show,
        };
        return commands::config::run(action, &root, &config_path, format);
    }

    let config = McpctlConfig::load_from(&config_path)?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", config_path.display()))?;

    tracing::debug!(root = %root.display(), config = %config_path.display(), "resolved paths");

    let supervisor = Supervisor::from_config(root, config);

    match cli.command {
        Commands::Start { server } => commands::start::run(&supervisor, &server, format),
        Commands::Stop { server } => commands::stop::run(&supervisor, &server, format),
        Commands::List => commands::list::run(&supervisor, format),
        Commands::Running => commands::running::run(&supervisor, format),
        Commands::StopAll => commands::stopall::run(&supervisor, format),
        Commands::Clean => commands::clean::run(&supervisor, format),
        Commands::Check { server } => commands::check::run(&supervisor, server.as_deref(), format),
        Commands::Config { .. } => unreachable!("config commands are dispatched above"),
    }
}
