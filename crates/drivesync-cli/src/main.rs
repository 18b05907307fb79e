//! DriveSync CLI - Archive local files into Google Drive
//!
//! Provides commands for:
//! - One-shot sync of a file or directory tree
//! - Watching a drop directory and syncing what lands in it
//! - Locating (and de-duplicating) remote category folders
//! - Managing the configuration file

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use drivesync_core::config::Config;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;
mod prompt;

use commands::{
    config::ConfigCommand, locate::LocateCommand, sync::SyncCommand, watch::WatchCommand,
    CliContext,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "drivesync", version, about = "Archive local files into Google Drive")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Archive a file or directory
    Sync(SyncCommand),
    /// Archive everything that appears in a directory
    Watch(WatchCommand),
    /// Print the remote folder id of a category
    Locate(LocateCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Picks the log filter: `RUST_LOG` wins, then `-v`, `-q`, and the config
fn log_filter(verbose: u8, quiet: bool, config: &Config) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let level = match verbose {
        0 if quiet => "warn",
        0 if config.logging.verbose => "debug",
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    EnvFilter::new(level)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    // Commands reload and validate; this copy only picks the log level
    let config = Config::load_or_default(&config_path);

    let env_filter = log_filter(cli.verbose, cli.quiet, &config);
    if cli.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let ctx = CliContext {
        format: if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        },
        quiet: cli.quiet,
        config_path,
    };

    match &cli.command {
        Commands::Sync(cmd) => cmd.execute(&ctx).await,
        Commands::Watch(cmd) => cmd.execute(&ctx).await,
        Commands::Locate(cmd) => cmd.execute(&ctx).await,
        Commands::Config(cmd) => cmd.execute(&ctx).await,
    }
}
