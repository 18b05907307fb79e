//! Sync command - Archive one file or directory
//!
//! Provides the `drivesync sync` CLI command which:
//! 1. Loads configuration and applies the command-line overrides
//! 2. Resolves an access token and builds the Drive adapter
//! 3. Runs the SyncOrchestrator on the target and displays the outcome

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use drivesync_core::config::{Config, ConfigBuilder};
use drivesync_core::domain::newtypes::Category;
use drivesync_core::ports::DefaultCategory;
use drivesync_sync::engine::{normalize_path, SyncOrchestrator, SyncOutcome, SyncReport};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{confirm_for, connect_store, ensure_valid, shutdown_signal, CliContext};
use crate::output::{format_duration_ms, plural, OutputFormatter};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// File or directory to archive
    pub target: PathBuf,

    /// Category folder to archive into (defaults to remote.default_category)
    #[arg(long, short = 'c', conflicts_with = "guess")]
    pub category: Option<String>,

    /// Let the category guesser pick the category from the target's name
    #[arg(long)]
    pub guess: bool,

    /// Name of the archive root folder
    #[arg(long)]
    pub root: Option<String>,

    /// Skip the MD5 comparison after each upload
    #[arg(long)]
    pub no_recheck: bool,

    /// Create missing remote folders without asking
    #[arg(long)]
    pub create_missing: bool,

    /// Ask before creating missing remote folders
    #[arg(long, short = 'i')]
    pub interactive: bool,
}

impl SyncCommand {
    /// Applies the command-line flags on top of the file configuration
    pub fn apply_overrides(&self, config: Config) -> Config {
        let mut builder = ConfigBuilder::from_config(config);
        if let Some(root) = &self.root {
            builder = builder.archive_root(root.clone());
        }
        if self.no_recheck {
            builder = builder.force_recheck(false);
        }
        if self.create_missing {
            builder = builder.create_missing(true);
        }
        if self.interactive {
            builder = builder.interactive(true);
        }
        builder.build()
    }

    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();

        let config = self.apply_overrides(ctx.load_config()?);
        ensure_valid(&config)?;

        let target = normalize_path(&self.target)
            .with_context(|| format!("Failed to resolve {}", self.target.display()))?;
        info!(target = %target.display(), "Starting sync");

        let store = connect_store(&config)?;
        let cancel = CancellationToken::new();
        tokio::spawn(shutdown_signal(cancel.clone()));
        let orchestrator = SyncOrchestrator::new(store, &config, confirm_for(&config), cancel);

        let result = if self.guess {
            let guesser = DefaultCategory::new(
                Category::new(config.remote.default_category.clone())
                    .context("Invalid remote.default_category")?,
            );
            orchestrator.sync_with_guess(&target, &guesser).await
        } else {
            let name = self
                .category
                .clone()
                .unwrap_or_else(|| config.remote.default_category.clone());
            let category = Category::new(name).context("Invalid category")?;
            orchestrator.sync(&target, &category).await
        };
        let outcome = result.with_context(|| format!("Failed to sync {}", target.display()))?;

        report_outcome(ctx, formatter.as_ref(), &target, &outcome);
        Ok(())
    }
}

fn report_json(target: &Path, status: &str, report: Option<&SyncReport>) -> serde_json::Value {
    let mut json = serde_json::json!({
        "path": target.display().to_string(),
        "status": status,
    });
    if let Some(report) = report {
        json["job"] = serde_json::json!(report.job);
        json["files_uploaded"] = serde_json::json!(report.files_uploaded);
        json["folders_created"] = serde_json::json!(report.folders_created);
        json["duration_ms"] = serde_json::json!(report.duration_ms);
    }
    json
}

/// Prints a sync outcome in the selected format
fn report_outcome(
    ctx: &CliContext,
    formatter: &dyn OutputFormatter,
    target: &Path,
    outcome: &SyncOutcome,
) {
    let status = match outcome {
        SyncOutcome::Synced(_) => "synced",
        SyncOutcome::AlreadySynced => "already_synced",
        SyncOutcome::Ignored => "ignored",
        SyncOutcome::MarkFailed { .. } => "mark_failed",
    };
    if ctx.is_json() {
        formatter.print_json(&report_json(target, status, outcome.report()));
        return;
    }

    match outcome {
        SyncOutcome::Synced(report) => {
            formatter.success(&format!(
                "Synced {} in {}",
                target.display(),
                format_duration_ms(report.duration_ms)
            ));
            formatter.info(&format!(
                "Uploaded {}, created {}",
                plural(report.files_uploaded, "file"),
                plural(report.folders_created, "folder")
            ));
        }
        SyncOutcome::AlreadySynced => {
            formatter.info(&format!("{} is already synced", target.display()));
        }
        SyncOutcome::Ignored => {
            formatter.info(&format!("{} is ignored", target.display()));
        }
        SyncOutcome::MarkFailed { report, error } => {
            formatter.warn(&format!(
                "Uploaded {} but could not mark it as synced: {}",
                target.display(),
                error
            ));
            formatter.info(&format!(
                "Uploaded {}, created {}",
                plural(report.files_uploaded, "file"),
                plural(report.folders_created, "folder")
            ));
        }
    }
}
