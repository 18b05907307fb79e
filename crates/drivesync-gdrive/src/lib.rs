//! DriveSync GDrive - Google Drive v3 adapter
//!
//! Provides:
//! - A typed HTTP client for the handful of Drive v3 endpoints the archiver needs
//! - The [`RemoteStore`](drivesync_core::ports::RemoteStore) implementation used by the sync engine
//! - Access token provisioning (environment, token file, system keyring)
//!
//! ## Modules
//!
//! - [`auth`] - Token sources and keyring storage
//! - [`client`] - Drive v3 HTTP client
//! - [`provider`] - `RemoteStore` adapter over [`client::DriveClient`]

pub mod auth;
pub mod client;
pub mod provider;

use std::path::PathBuf;

use drivesync_core::ports::StoreError;
use thiserror::Error;

/// Errors that can occur when communicating with the Google Drive API
#[derive(Debug, Error)]
pub enum DriveError {
    /// The API answered with a non-success status
    #[error("Google Drive API error {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// `error.message` from Google's error envelope, or the raw body
        message: String,
    },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The API response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A resumable session kept acknowledging no new bytes
    #[error("Upload session stalled at byte {offset}")]
    Stalled { offset: u64 },

    /// Reading the local file being uploaded failed
    #[error("Local I/O error on {}: {source}", .path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<DriveError> for StoreError {
    fn from(err: DriveError) -> Self {
        match err {
            DriveError::Api { status, message } => StoreError::Api { status, message },
            DriveError::NetworkError(e) if e.is_decode() => {
                StoreError::InvalidResponse(e.to_string())
            }
            DriveError::NetworkError(e) => StoreError::Network(e.to_string()),
            DriveError::InvalidResponse(msg) => StoreError::InvalidResponse(msg),
            DriveError::Stalled { offset } => {
                StoreError::Network(format!("upload session stalled at byte {offset}"))
            }
            DriveError::LocalIo { path, source } => StoreError::local_io(path, &source),
        }
    }
}
