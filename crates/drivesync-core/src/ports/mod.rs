//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the sync engine depends
//! on, but whose implementations live in adapter crates or in the binary.
//!
//! ## Ports Overview
//!
//! - [`RemoteStore`] - Remote folder/file operations (Google Drive)
//! - [`Confirm`] - Yes/no gating for interactive decisions
//! - [`CategoryGuesser`] - Category selection from a target's basename

pub mod category;
pub mod confirm;
pub mod remote_store;

pub use category::{CategoryGuesser, DefaultCategory};
pub use confirm::{AssumeYes, Confirm, NonInteractive};
pub use remote_store::{CreatedFile, LocalFile, RemoteStore, StoreError};
