//! DriveSync Sync - Archive sync engine
//!
//! Provides:
//! - At-most-once uploads guarded by on-disk sync marks
//! - Concurrent upload fan-out over a depth-first tree walk
//! - Archive root / category folder resolution with a shared cache
//! - Exponential backoff for transient remote failures
//!
//! ## Modules
//!
//! - [`engine`] - [`SyncOrchestrator`](engine::SyncOrchestrator), the public entry point
//! - [`lock`] - Exclusive lock on a watched directory
//! - [`marker`] - Sync mark files next to the synced content
//! - [`resolver`] - Category name to remote folder id resolution
//! - [`retry`] - Retry executor and backoff policy
//! - [`uploader`] - Single file upload with checksum verification
//! - [`walker`] - Pre-order local tree walk and the ignore set
//! - [`watcher`] - Filesystem notifications for watch mode

pub mod engine;
pub mod lock;
pub mod marker;
pub mod resolver;
pub mod retry;
pub mod uploader;
pub mod walker;
pub mod watcher;

use std::path::PathBuf;

use drivesync_core::domain::newtypes::{Category, FolderId};
use drivesync_core::ports::StoreError;
use thiserror::Error;

pub use marker::MarkError;

/// Errors raised while resolving a category to a remote folder
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No folder with this name exists and creating one was not allowed
    #[error("remote folder '{name}' not found")]
    NotFound { name: String },

    /// Several live folders carry this name; none is picked silently
    #[error("multiple remote folders named '{name}': {}", format_ids(.ids))]
    MultipleResults { name: String, ids: Vec<FolderId> },

    /// The remote store failed in a way retries did not fix
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn format_ids(ids: &[FolderId]) -> String {
    ids.iter()
        .map(FolderId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Fatal errors of a sync unit (one file or one directory tree)
#[derive(Debug, Error)]
pub enum SyncError {
    /// The sync mark could not be checked for a reason other than absence
    #[error("failed to check sync mark for {path}: {source}")]
    MarkCheck {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Local filesystem access failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The target is neither a regular file nor a directory
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(PathBuf),

    /// The category folder could not be resolved
    #[error("cannot resolve category '{category}': {source}")]
    Resolve {
        category: Category,
        #[source]
        source: ResolveError,
    },

    /// A remote folder for a local directory could not be created
    #[error("failed to create remote folder for {path}: {source}")]
    CreateFolder {
        path: PathBuf,
        #[source]
        source: StoreError,
    },

    /// A file upload failed with a non-retryable error
    #[error("failed to upload {path}: {source}")]
    Upload {
        path: PathBuf,
        #[source]
        source: StoreError,
    },

    /// An upload task ended without reporting a result
    #[error("upload task failed: {0}")]
    TaskFailed(String),

    /// The sync was stopped by its cancellation token
    #[error("sync cancelled")]
    Cancelled,
}
