//! DriveSync Core - Configuration, domain types, and ports
//!
//! This crate contains the hexagonal architecture core with:
//! - **Configuration** - YAML config with validation and a builder
//! - **Domain types** - `FolderId`, `FileId`, `Md5Checksum`, `Category`
//! - **Port definitions** - Traits for adapters: `RemoteStore`, `Confirm`, `CategoryGuesser`
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure value types with no I/O.
//! Ports define trait interfaces that adapter crates implement.
//! The sync engine in `drivesync-sync` drives the ports.

pub mod config;
pub mod domain;
pub mod ports;
