//! Watch-mode file notifications
//!
//! [`FileWatcher`] wraps the `notify` crate and reports entries that appear
//! directly inside a watched directory (created or moved in). Hidden names
//! are filtered out before they reach the channel.
//!
//! ```text
//!  inotify / kqueue  ──→  FileWatcher  ──→  mpsc::channel<PathBuf>  ──→  watch command
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::walker::{IgnoreSet, TreeWalker, WalkEntry};

/// Capacity of the event channel
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Watches directories (non-recursively) for new entries
pub struct FileWatcher {
    watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Creates the watcher and the receiver of new-entry paths
    ///
    /// # Errors
    /// Returns an error if the OS watcher cannot be created
    pub fn new() -> Result<(Self, mpsc::Receiver<PathBuf>)> {
        let (tx, rx) = mpsc::channel::<PathBuf>(EVENT_CHANNEL_CAPACITY);

        let watcher = RecommendedWatcher::new(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    if let Some(path) = map_notify_event(&event) {
                        if let Err(e) = tx.blocking_send(path) {
                            warn!(error = %e, "Failed to send watch event (receiver dropped)");
                        }
                    }
                }
                Err(err) => {
                    error!(error = %err, "File watcher error");
                }
            },
            notify::Config::default(),
        )
        .context("Failed to create file watcher")?;

        Ok((Self { watcher }, rx))
    }

    /// Starts watching the direct children of `path`
    pub fn watch(&mut self, path: &Path) -> Result<()> {
        info!(path = %path.display(), "Watching directory");
        self.watcher
            .watch(path, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch path: {}", path.display()))
    }

    pub fn unwatch(&mut self, path: &Path) -> Result<()> {
        info!(path = %path.display(), "Stopping watch");
        self.watcher
            .unwatch(path)
            .with_context(|| format!("Failed to unwatch path: {}", path.display()))
    }
}

/// True if the basename of `path` starts with a dot
pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('.'))
}

/// Maps a raw event to the path of a new entry
///
/// Only creations and the destination side of renames count; hidden paths
/// are dropped.
fn map_notify_event(event: &notify::Event) -> Option<PathBuf> {
    let path = match &event.kind {
        EventKind::Create(_) => event.paths.first()?,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event.paths.first()?,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event.paths.get(1)?,
        _ => return None,
    };

    if is_hidden(path) {
        debug!(path = %path.display(), "Ignoring hidden entry");
        return None;
    }
    debug!(path = %path.display(), kind = ?event.kind, "New entry");
    Some(path.clone())
}

/// Size summary of a file or of a whole directory tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fingerprint {
    /// Number of entries (the root included)
    pub entries: u64,
    /// Total size of the regular files, in bytes
    pub bytes: u64,
}

/// Computes the [`Fingerprint`] of `path`
///
/// A directory is walked the same way a directory sync walks it, so entries
/// copied into any subdirectory change the result.
pub async fn fingerprint(path: &Path) -> io::Result<Fingerprint> {
    let meta = tokio::fs::metadata(path).await?;
    if !meta.is_dir() {
        return Ok(Fingerprint {
            entries: 1,
            bytes: meta.len(),
        });
    }

    let mut total = Fingerprint::default();
    let mut walker = TreeWalker::new(path, IgnoreSet::default());
    while let Some(entry) = walker.next_entry().await {
        total.entries += 1;
        if let WalkEntry::File(file) = entry? {
            total.bytes += tokio::fs::metadata(&file).await?.len();
        }
    }
    Ok(total)
}

/// Checks whether the fingerprint of `path` stays the same over
/// `check_interval`
///
/// Returns `false` if it changed or the path cannot be read.
pub async fn is_stable(path: &Path, check_interval: Duration) -> bool {
    let first = match fingerprint(path).await {
        Ok(f) => f,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Cannot read entry for stability check");
            return false;
        }
    };

    tokio::time::sleep(check_interval).await;

    let second = match fingerprint(path).await {
        Ok(f) => f,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Cannot read entry on second stability check");
            return false;
        }
    };

    let stable = first == second;
    debug!(
        path = %path.display(),
        entries = second.entries,
        bytes = second.bytes,
        stable,
        "Stability check"
    );
    stable
}

/// Waits until `path` stops growing; for a directory, until no entry is
/// added to or grows anywhere in its tree
///
/// Returns `false` if the path disappeared or `cancel` fired first.
pub async fn wait_until_stable(
    path: &Path,
    check_interval: Duration,
    cancel: &CancellationToken,
) -> bool {
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        if tokio::fs::symlink_metadata(path).await.is_err() {
            debug!(path = %path.display(), "Entry vanished before it settled");
            return false;
        }
        tokio::select! {
            stable = is_stable(path, check_interval) => {
                if stable {
                    return true;
                }
            }
            _ = cancel.cancelled() => return false,
        }
    }
}
