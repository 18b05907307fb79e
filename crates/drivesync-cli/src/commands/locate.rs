//! Locate command - Print the remote folder id of a category
//!
//! Resolves `<archive_root>/<category>` the same way a sync does. When a
//! name matches several folders, all ids are listed and, on request, every
//! duplicate but the first is moved to the Drive trash, where its content can
//! still be restored.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use drivesync_core::config::ConfigBuilder;
use drivesync_core::domain::newtypes::{Category, FolderId};
use drivesync_core::ports::{AssumeYes, Confirm, RemoteStore, StoreError};
use drivesync_sync::resolver::{RemoteLocationResolver, ResolutionCache};
use drivesync_sync::retry::{RetryExecutor, RetryPolicy};
use drivesync_sync::ResolveError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{confirm_for, connect_store, CliContext};
use crate::prompt::StdinConfirm;

#[derive(Debug, Args)]
pub struct LocateCommand {
    /// Category to locate
    pub category: String,

    /// Name of the archive root folder
    #[arg(long)]
    pub root: Option<String>,

    /// Create missing folders without asking
    #[arg(long)]
    pub create_missing: bool,

    /// Move all but the first of several same-named folders to the trash
    #[arg(long)]
    pub delete_duplicates: bool,

    /// Do not ask before trashing duplicates
    #[arg(long, short = 'y')]
    pub yes: bool,
}

impl LocateCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();

        let mut builder = ConfigBuilder::from_config(ctx.load_config()?);
        if let Some(root) = &self.root {
            builder = builder.archive_root(root.clone());
        }
        if self.create_missing {
            builder = builder.create_missing(true);
        }
        let config = builder.build();
        let category = Category::new(self.category.clone()).context("Invalid category")?;

        let store = connect_store(&config)?;
        let retry = RetryExecutor::new(RetryPolicy::from(&config.retry), CancellationToken::new());
        let resolver = RemoteLocationResolver::new(
            Arc::clone(&store),
            Arc::new(ResolutionCache::new()),
            confirm_for(&config),
            retry.clone(),
            config.remote.archive_root.clone(),
            config.remote.create_missing,
        );

        let result = resolver.resolve("locate", &category).await;
        let (name, ids) = match result {
            Ok(id) => {
                print_found(ctx, &category, &id);
                return Ok(());
            }
            Err(ResolveError::MultipleResults { name, ids }) => (name, ids),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to locate category '{category}'"))
            }
        };

        if ctx.is_json() {
            formatter.print_json(&serde_json::json!({
                "name": name,
                "duplicates": ids.iter().map(FolderId::as_str).collect::<Vec<_>>(),
            }));
        } else {
            formatter.warn(&format!("Found {} folders named '{}':", ids.len(), name));
            for id in &ids {
                formatter.info(&format!("  {id}"));
            }
        }

        if !self.delete_duplicates {
            anyhow::bail!("Folder '{name}' is ambiguous; rerun with --delete-duplicates to keep only the first");
        }

        let confirm: Arc<dyn Confirm> = if self.yes {
            Arc::new(AssumeYes)
        } else {
            Arc::new(StdinConfirm::new())
        };
        let question = format!(
            "Move {} duplicate folder(s) named '{}' to the trash, keeping {}?",
            ids.len() - 1,
            name,
            ids[0]
        );
        if !confirm.confirm(&question).await {
            formatter.info("Nothing trashed");
            return Ok(());
        }

        let trashed = trash_duplicates(store.as_ref(), &retry, &ids).await?;
        formatter.success(&format!(
            "Moved {trashed} duplicate folder(s) named '{name}' to the trash"
        ));

        let id = resolver
            .resolve("locate", &category)
            .await
            .with_context(|| format!("Failed to locate category '{category}'"))?;
        print_found(ctx, &category, &id);
        Ok(())
    }
}

/// Trashes every id but the first; returns how many were trashed
///
/// Each call runs under `retry`, so rate limits and 5xx answers are retried.
async fn trash_duplicates(
    store: &dyn RemoteStore,
    retry: &RetryExecutor,
    ids: &[FolderId],
) -> Result<usize> {
    let mut trashed = 0;
    for id in ids.iter().skip(1) {
        retry
            .with_retry("locate", "trash_folder", StoreError::is_transient, || {
                store.trash_object(id.as_str())
            })
            .await
            .with_context(|| format!("Failed to trash folder {id}"))?;
        info!(id = %id, "Trashed duplicate folder");
        trashed += 1;
    }
    if trashed == 0 {
        warn!("No duplicates to trash");
    }
    Ok(trashed)
}

fn print_found(ctx: &CliContext, category: &Category, id: &FolderId) {
    let formatter = ctx.formatter();
    if ctx.is_json() {
        formatter.print_json(&serde_json::json!({
            "category": category.as_str(),
            "id": id.as_str(),
        }));
    } else {
        formatter.success(&format!("{category}: {id}"));
    }
}
