//! ORYON CLI - command line interface for the ORYON operator
//!
//! Chat with LLM providers, turn tasks into change plans and apply them to
//! GitHub, or run the HTTP/WebSocket server.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use oryon_core::{Config, Secrets};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{ApplyArgs, ChatArgs, ConfigArgs, PlanArgs, RunsArgs, ServeArgs, SettingsArgs};

/// ORYON Operator: LLM-assisted chat, planning and GitHub changes
#[derive(Parser, Debug)]
#[command(name = "oryon")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config file (defaults to ~/.config/oryon/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Comma-separated provider list (overrides config and env)
    #[arg(long, global = true)]
    providers: Option<String>,

    /// Run-log state file (overrides config and env)
    #[arg(long, global = true)]
    state_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// Run the HTTP and WebSocket server
    Serve(ServeArgs),

    /// Send one chat message
    Chat(ChatArgs),

    /// Generate a change plan for a task
    #[command(visible_alias = "p")]
    Plan(PlanArgs),

    /// Apply a saved plan to a GitHub repository
    Apply(ApplyArgs),

    /// List recorded runs
    Runs(RunsArgs),

    /// Show or update stored settings
    Settings(SettingsArgs),

    /// Show current configuration
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let config = Config::load_with_overrides(
        cli.config.as_deref(),
        cli.providers.clone(),
        cli.state_path.clone(),
    )?;
    let secrets = Secrets::load_with_env()?;

    if cli.verbose {
        tracing::info!(
            providers = ?config.providers.enabled,
            primary = %config.providers.primary,
            "Configuration loaded"
        );
    }

    match cli.command {
        Some(Commands::Version) => {
            println!("oryon {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Serve(args)) => args.execute(&config, &secrets).await?,
        Some(Commands::Chat(args)) => args.execute(&config, &secrets).await?,
        Some(Commands::Plan(args)) => args.execute(&config, &secrets).await?,
        Some(Commands::Apply(args)) => args.execute(&config, &secrets).await?,
        Some(Commands::Runs(args)) => args.execute(&config)?,
        Some(Commands::Settings(args)) => args.execute(&config)?,
        Some(Commands::Config(args)) => args.execute(&config, &secrets, cli.config.as_deref())?,
        None => {
            println!("ORYON Operator - LLM-assisted chat, planning and GitHub changes");
            println!();
            println!("Use --help for usage information");
        }
    }

    Ok(())
}
