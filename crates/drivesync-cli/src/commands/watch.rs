//! Watch command - Archive everything dropped into a directory
//!
//! Provides the `drivesync watch` CLI command which:
//! 1. Locks the target directory against a second watcher
//! 2. Syncs every direct child of the target directory once
//! 3. Watches the directory (non-recursively) for new entries
//! 4. Syncs each new entry once it has settled (for a directory, its whole tree)
//! 5. Stops on Ctrl-C / SIGTERM after the in-flight syncs finish

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use drivesync_core::domain::newtypes::Category;
use drivesync_core::ports::{CategoryGuesser, DefaultCategory};
use drivesync_sync::engine::{normalize_path, SyncOrchestrator, SyncOutcome};
use drivesync_sync::lock::DirectoryLock;
use drivesync_sync::watcher::{wait_until_stable, FileWatcher};
use drivesync_sync::SyncError;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{confirm_for, connect_store, shutdown_signal, CliContext};

#[derive(Debug, Args)]
pub struct WatchCommand {
    /// Directory to watch (defaults to watch.target)
    pub target: Option<PathBuf>,
}

impl WatchCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config = ctx.load_config()?;

        let target = self
            .target
            .clone()
            .unwrap_or_else(|| config.watch.target.clone());
        let target = normalize_path(&target)
            .with_context(|| format!("Failed to resolve {}", target.display()))?;
        let meta = tokio::fs::metadata(&target)
            .await
            .with_context(|| format!("Cannot watch {}", target.display()))?;
        anyhow::ensure!(meta.is_dir(), "{} is not a directory", target.display());
        let lock = DirectoryLock::acquire(&target)
            .with_context(|| format!("Cannot watch {}", target.display()))?;

        let store = connect_store(&config)?;
        let cancel = CancellationToken::new();
        tokio::spawn(shutdown_signal(cancel.clone()));

        let orchestrator = Arc::new(SyncOrchestrator::new(
            store,
            &config,
            confirm_for(&config),
            cancel.clone(),
        ));
        let guesser: Arc<dyn CategoryGuesser> = Arc::new(DefaultCategory::new(
            Category::new(config.remote.default_category.clone())
                .context("Invalid remote.default_category")?,
        ));
        let stability_interval = Duration::from_millis(config.watch.stability_check_ms);

        // Subscribe before the initial pass so nothing dropped meanwhile is missed
        let (mut watcher, mut events) = FileWatcher::new()?;
        watcher.watch(&target)?;

        formatter.success(&format!("Watching {}", target.display()));

        info!(target = %target.display(), "Initial sync of existing entries");
        let results = orchestrator
            .sync_children(&target, Arc::clone(&guesser))
            .await
            .with_context(|| format!("Failed to list {}", target.display()))?;
        for (path, result) in results {
            log_result(&path, &result);
        }

        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => {
                    let Some(path) = event else {
                        warn!("Watch event stream closed");
                        break;
                    };
                    if orchestrator.ignore_set().is_ignored_path(&path) {
                        continue;
                    }
                    tasks.spawn(sync_new_entry(
                        Arc::clone(&orchestrator),
                        Arc::clone(&guesser),
                        path,
                        stability_interval,
                        cancel.clone(),
                    ));
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "Sync task failed");
                    }
                }
            }
        }

        info!("Shutting down, waiting for in-flight syncs");
        if let Err(e) = watcher.unwatch(&target) {
            warn!(error = %e, "Failed to stop watching");
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Sync task failed");
            }
        }

        drop(lock);
        formatter.success("Stopped watching");
        Ok(())
    }
}

async fn sync_new_entry(
    orchestrator: Arc<SyncOrchestrator>,
    guesser: Arc<dyn CategoryGuesser>,
    path: PathBuf,
    stability_interval: Duration,
    cancel: CancellationToken,
) {
    if !wait_until_stable(&path, stability_interval, &cancel).await {
        return;
    }
    let result = orchestrator.sync_with_guess(&path, guesser.as_ref()).await;
    log_result(&path, &result);
}

fn log_result(path: &Path, result: &Result<SyncOutcome, SyncError>) {
    match result {
        Ok(SyncOutcome::Synced(report)) => {
            info!(
                job = %report.job,
                path = %path.display(),
                files = report.files_uploaded,
                "Synced"
            );
        }
        Ok(SyncOutcome::AlreadySynced) => {
            info!(path = %path.display(), "Already synced");
        }
        Ok(SyncOutcome::Ignored) => {}
        Ok(SyncOutcome::MarkFailed { error, .. }) => {
            warn!(path = %path.display(), error = %error, "Synced but not marked");
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Sync failed");
        }
    }
}
