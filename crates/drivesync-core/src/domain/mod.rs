//! Domain types
//!
//! - Newtypes for remote identifiers, checksums, and category names
//! - Domain-specific validation errors

pub mod errors;
pub mod newtypes;

pub use errors::DomainError;
pub use newtypes::*;
