//! Domain error types
//!
//! This module defines error types for domain value validation.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid remote folder or file identifier
    #[error("Invalid remote ID: {0}")]
    InvalidRemoteId(String),

    /// Invalid content hash (expected hex-encoded MD5)
    #[error("Invalid hash format: {0}")]
    InvalidHash(String),

    /// Invalid category name
    #[error("Invalid category: {0}")]
    InvalidCategory(String),
}
