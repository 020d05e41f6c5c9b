//! Scanned content tree and statistics.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::entry::ContentEntry;
use crate::error::ScanWarning;

/// Summary statistics for a scanned tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreeStats {
    /// Total size in bytes.
    pub total_size: u64,
    /// Total number of files.
    pub total_files: u64,
    /// Total number of directories (excluding the root).
    pub total_dirs: u64,
    /// Entries that are neither files nor directories.
    pub total_other: u64,
    /// Entries that could not be accessed.
    pub total_errors: u64,
}

impl TreeStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats with a file entry.
    pub fn record_file(&mut self, size: u64) {
        self.total_files += 1;
        self.total_size += size;
    }

    /// Record a directory.
    pub fn record_dir(&mut self) {
        self.total_dirs += 1;
    }

    /// Record an entry of another type.
    pub fn record_other(&mut self) {
        self.total_other += 1;
    }

    /// Record an inaccessible entry.
    pub fn record_error(&mut self) {
        self.total_errors += 1;
    }
}

/// Complete scanned tree rooted at a local directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentTree {
    /// Root entry (always a directory).
    pub root: ContentEntry,

    /// Canonical root path that was scanned.
    pub root_path: PathBuf,

    /// When this scan was performed.
    pub scanned_at: SystemTime,

    /// Duration of the scan.
    pub scan_duration: Duration,

    /// Summary statistics.
    pub stats: TreeStats,

    /// Warnings encountered during scan.
    pub warnings: Vec<ScanWarning>,
}

impl ContentTree {
    /// Create a new content tree.
    pub fn new(
        root: ContentEntry,
        root_path: PathBuf,
        stats: TreeStats,
        scan_duration: Duration,
        warnings: Vec<ScanWarning>,
    ) -> Self {
        Self {
            root,
            root_path,
            scanned_at: SystemTime::now(),
            scan_duration,
            stats,
            warnings,
        }
    }

    /// The tree as a listing: a single-element slice holding the root.
    pub fn as_listing(&self) -> &[ContentEntry] {
        std::slice::from_ref(&self.root)
    }

    /// Get the total size of the tree.
    pub fn total_size(&self) -> u64 {
        self.root.size.known_or_zero()
    }

    /// Check if there were any warnings during scanning.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_stats_record() {
        let mut stats = TreeStats::new();
        stats.record_file(1024);
        stats.record_file(6);
        stats.record_dir();
        stats.record_error();

        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.total_size, 1030);
        assert_eq!(stats.total_dirs, 1);
        assert_eq!(stats.total_errors, 1);
    }

    #[test]
    fn test_as_listing() {
        let root = ContentEntry::directory("data", vec![ContentEntry::file("a.txt", 3u64)]);
        let tree = ContentTree::new(
            root,
            PathBuf::from("/tmp/data"),
            TreeStats::new(),
            Duration::ZERO,
            Vec::new(),
        );
        let listing = tree.as_listing();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].name, "data");
        assert_eq!(tree.total_size(), 3);
    }
}
