//! CLI subcommands and the wiring they share

pub mod config;
pub mod locate;
pub mod sync;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use drivesync_core::config::Config;
use drivesync_core::ports::{Confirm, NonInteractive, RemoteStore};
use drivesync_gdrive::auth::resolve_access_token;
use drivesync_gdrive::client::DriveClient;
use drivesync_gdrive::provider::DriveRemoteStore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::output::{get_formatter, OutputFormat, OutputFormatter};
use crate::prompt::StdinConfirm;

/// Global options every command receives
#[derive(Debug, Clone)]
pub struct CliContext {
    pub format: OutputFormat,
    pub quiet: bool,
    pub config_path: PathBuf,
}

impl CliContext {
    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        get_formatter(self.is_json(), self.quiet)
    }

    /// Loads the config file (defaults if it does not exist) and rejects
    /// invalid values
    pub fn load_config(&self) -> Result<Config> {
        let config = if self.config_path.exists() {
            Config::load(&self.config_path)?
        } else {
            info!(config_path = %self.config_path.display(), "No config file, using defaults");
            Config::default()
        };
        ensure_valid(&config)?;
        Ok(config)
    }
}

/// Fails with every validation error joined into one message
pub fn ensure_valid(config: &Config) -> Result<()> {
    let errors = config.validate();
    if !errors.is_empty() {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        bail!("Invalid configuration: {}", messages.join("; "));
    }
    Ok(())
}

/// Builds the Google Drive store from the configured access token
pub fn connect_store(config: &Config) -> Result<Arc<dyn RemoteStore>> {
    let (token, source) = resolve_access_token(&config.auth)
        .context("No Google Drive access token available")?;
    info!(?source, "Loaded access token");
    Ok(Arc::new(DriveRemoteStore::new(DriveClient::new(token))))
}

/// Prompts on the terminal in interactive mode, answers "no" otherwise
pub fn confirm_for(config: &Config) -> Arc<dyn Confirm> {
    if config.sync.interactive {
        Arc::new(StdinConfirm::new())
    } else {
        Arc::new(NonInteractive)
    }
}

/// Cancels `token` on SIGINT or SIGTERM
pub async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}
