//! Sync marks
//!
//! A sync mark is an empty sentinel file co-located with the synced content:
//!
//! - directory `d` is marked by `d/.sync_finished`
//! - file `p/name` is marked by `p/.sync_finished-name`
//!
//! Presence of the mark means the unit was uploaded completely. Marks are
//! written only after full success and never updated or removed here.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Basename of a directory mark, and prefix of file marks
pub const MARK_PREFIX: &str = ".sync_finished";

/// Whether a sync unit is a single file or a directory tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    File,
    Directory,
}

/// Failure to write a sync mark after a successful upload
#[derive(Debug, Error)]
#[error("failed to write sync mark {mark}: {source}")]
pub struct MarkError {
    pub mark: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Returns the mark file path for `path`
pub fn mark_path(path: &Path, kind: UnitKind) -> PathBuf {
    match kind {
        UnitKind::Directory => path.join(MARK_PREFIX),
        UnitKind::File => {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let parent = path.parent().unwrap_or_else(|| Path::new("/"));
            parent.join(format!("{MARK_PREFIX}-{name}"))
        }
    }
}

/// Persists and queries the "already synced" fact for local paths
#[derive(Debug, Clone, Copy, Default)]
pub struct IdempotencyMarker;

impl IdempotencyMarker {
    pub fn new() -> Self {
        Self
    }

    /// Returns true if `path` carries a sync mark
    ///
    /// A missing mark is `Ok(false)`; any other stat failure is an error.
    pub async fn is_marked(&self, path: &Path, kind: UnitKind) -> io::Result<bool> {
        let mark = mark_path(path, kind);
        match tokio::fs::symlink_metadata(&mark).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Writes the sync mark for `path`
    pub async fn mark(&self, path: &Path, kind: UnitKind) -> Result<(), MarkError> {
        let mark = mark_path(path, kind);
        tokio::fs::write(&mark, b"")
            .await
            .map_err(|source| MarkError {
                mark: mark.clone(),
                source,
            })?;
        debug!(mark = %mark.display(), "Wrote sync mark");
        Ok(())
    }
}
