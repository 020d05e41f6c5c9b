//! Core types and configuration for datasync.
//!
//! This crate provides the data model shared by the scanner, the differ and
//! the sync driver: content entries, scanned trees, listing wire records and
//! configuration.

mod config;
mod entry;
mod error;
mod tree;
pub mod wire;

pub use config::{ConfigError, ScanConfig, ScanConfigBuilder, SyncConfig, SyncConfigBuilder};
pub use entry::{ContentEntry, EntryKind, EntrySize, sum_known};
pub use error::{ScanError, ScanWarning, WarningKind};
pub use tree::{ContentTree, TreeStats};
pub use wire::{Listing, RemoteRecord};
