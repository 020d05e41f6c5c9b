//! Local tree scanner for datasync.
//!
//! Walks a local directory and builds a [`ContentTree`] whose shape mirrors a
//! remote dataset listing: every entry has a name, a kind and a size, and
//! directories carry their children and the sum of their sizes.
//!
//! Problems below the root never abort a scan. Unreadable entries become
//! error entries of size 0 and unreadable subdirectories are kept empty, with
//! a [`ScanWarning`] recorded for each. Only an unusable root fails.
//!
//! # Example
//!
//! ```rust,no_run
//! use datasync_scan::TreeScanner;
//!
//! let scanner = TreeScanner::new();
//! let tree = scanner.scan("/path/to/data").unwrap();
//!
//! println!("Total size: {} bytes", tree.total_size());
//! println!("Total files: {}", tree.stats.total_files);
//! ```

mod progress;
mod scanner;

pub use progress::ScanProgress;
pub use scanner::{TreeScanner, scan};

// Re-export core types for convenience
pub use datasync_core::{
    ContentEntry, ContentTree, EntryKind, EntrySize, ScanConfig, ScanError, ScanWarning,
    TreeStats, WarningKind,
};
