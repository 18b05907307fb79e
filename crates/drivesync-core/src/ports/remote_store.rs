//! Remote store port (driven/secondary port)
//!
//! This module defines the interface the sync engine uses to talk to the
//! remote hierarchical object store. The primary implementation targets
//! Google Drive v3, but the engine only sees folders, files, and opaque ids.
//!
//! ## Design Notes
//!
//! - Errors are a typed [`StoreError`] rather than `anyhow::Error` because the
//!   retry executor needs to classify them as transient or fatal.
//! - Remote identity is assigned once at creation and never updated in place,
//!   so there is no rename/move/update operation.

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::newtypes::{FileId, FolderId};

// ============================================================================
// StoreError
// ============================================================================

/// Errors surfaced by a [`RemoteStore`] implementation or by the local side of
/// an upload
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The store answered with a non-success HTTP status
    #[error("remote API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Transport-level failure (connection reset, timeout, DNS...)
    #[error("network error: {0}")]
    Network(String),

    /// Uploaded content does not match the local file
    #[error("checksum mismatch: remote {remote:?}, local {local}")]
    ChecksumMismatch {
        /// Checksum reported by the store, if any
        remote: Option<String>,
        /// Checksum computed from the local file
        local: String,
    },

    /// The store answered successfully but the body was unusable
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Reading the local file failed
    #[error("local I/O error on {path}: {message}")]
    LocalIo { path: PathBuf, message: String },
}

impl StoreError {
    /// Build a [`StoreError::LocalIo`] from an `std::io::Error`
    pub fn local_io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        Self::LocalIo {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Returns true if retrying the same operation may succeed
    ///
    /// Transient: 5xx, 429, 403 carrying a rate-limit message, checksum
    /// mismatch, and network transport errors. Everything else is fatal.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Api { status, message } => match status {
                500..=599 | 429 => true,
                403 => message.to_lowercase().contains("rate limit"),
                _ => false,
            },
            Self::Network(_) | Self::ChecksumMismatch { .. } => true,
            Self::InvalidResponse(_) | Self::LocalIo { .. } => false,
        }
    }

    /// Returns the HTTP status code, if this error carries one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// ============================================================================
// CreatedFile
// ============================================================================

/// Result of a successful file creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedFile {
    /// Identifier assigned by the store
    pub id: FileId,
    /// MD5 (lowercase hex) computed by the store over the received content
    pub md5_checksum: Option<String>,
}

// ============================================================================
// LocalFile
// ============================================================================

/// Local content handed to [`RemoteStore::create_file`]
///
/// Stores read the file themselves, in chunks if they need to, so callers
/// never hold a whole file in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    /// Path of the file on disk
    pub path: PathBuf,
    /// Size in bytes at the time the upload started
    pub size: u64,
}

// ============================================================================
// RemoteStore trait
// ============================================================================

/// Port trait for remote object store operations
///
/// Implementations must be cheap to share across tasks (`Send + Sync`); the
/// orchestrator holds one behind an `Arc` and calls it from many upload tasks
/// at once.
#[async_trait::async_trait]
pub trait RemoteStore: Send + Sync {
    /// Lists non-trashed folders named `name` that are direct children of
    /// `parent`
    ///
    /// An empty vector means no match. More than one entry is a legitimate
    /// answer; callers decide what to do with duplicates.
    async fn list_folders(&self, name: &str, parent: &FolderId)
        -> Result<Vec<FolderId>, StoreError>;

    /// Creates a folder named `name` under `parent`
    ///
    /// Issues exactly one create call. No duplicate check is performed.
    async fn create_folder(&self, name: &str, parent: &FolderId) -> Result<FolderId, StoreError>;

    /// Creates a file named `name` under `parent` with the content of `file`
    async fn create_file(
        &self,
        name: &str,
        parent: &FolderId,
        file: &LocalFile,
        mime_type: &str,
    ) -> Result<CreatedFile, StoreError>;

    /// Permanently deletes a remote object
    async fn delete_object(&self, id: &str) -> Result<(), StoreError>;

    /// Moves a remote object to the trash, where it can still be restored
    async fn trash_object(&self, id: &str) -> Result<(), StoreError>;
}
