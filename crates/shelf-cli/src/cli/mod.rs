//! CLI entry and dispatch.

use anyhow::{Context, Result};
use clap::Parser;
use shelf_core::config::{self, GATEWAY_URL_ENV};
use shelf_core::logging;

mod commands;

#[derive(Parser)]
#[command(name = "shelf")]
#[command(version)]
#[command(about = "Smart shelf kiosk: shelf grid, job queue, scan validation and LEDs")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Gateway base URL (overrides the config file)
    #[arg(long, value_name = "URL", env = GATEWAY_URL_ENV, global = true)]
    gateway: Option<String>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run the kiosk (default)
    Run,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Inspect or clear the local cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
    /// Print a one-shot summary of the shelf from the Gateway
    Status,
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Set a top-level value (gateway_url or shelf_id)
    Set {
        /// Key to set
        #[arg(value_name = "KEY")]
        key: String,
        /// New value
        #[arg(value_name = "VALUE")]
        value: String,
    },
}

#[derive(clap::Subcommand)]
enum CacheCommands {
    /// Show the cached records
    Show,
    /// Delete the cached records
    Clear,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let mut config = config::Config::load().context("load config")?;

    let Cli { command, gateway } = cli;
    if let Some(url) = gateway.as_deref().map(str::trim)
        && !url.is_empty()
    {
        config.gateway_url = url.to_string();
    }

    // default to the kiosk
    let command = command.unwrap_or(Commands::Run);
    if !matches!(command, Commands::Run) {
        logging::init_stderr();
    }

    match command {
        Commands::Run => commands::run::run(config).await,

        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
            ConfigCommands::Set { key, value } => commands::config::set(&key, &value),
        },

        Commands::Cache { command } => match command {
            CacheCommands::Show => commands::cache::show(&config),
            CacheCommands::Clear => commands::cache::clear(&config),
        },

        Commands::Status => commands::status::run(&config).await,
    }
}
