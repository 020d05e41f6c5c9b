//! Scan progress snapshots.

use std::path::{Path, PathBuf};
use std::time::Duration;

use datasync_core::TreeStats;

/// Snapshot broadcast while a scan is running.
#[derive(Debug, Clone)]
pub struct ScanProgress {
    /// Counters at the time of the snapshot.
    pub stats: TreeStats,
    /// Entry being processed.
    pub current_path: PathBuf,
    /// Warnings collected so far.
    pub warnings: usize,
    /// Time elapsed since the scan started.
    pub elapsed: Duration,
}

impl ScanProgress {
    pub(crate) fn snapshot(
        stats: &TreeStats,
        current_path: &Path,
        warnings: usize,
        elapsed: Duration,
    ) -> Self {
        Self {
            stats: stats.clone(),
            current_path: current_path.to_path_buf(),
            warnings,
            elapsed,
        }
    }

    /// Files scanned per second so far.
    pub fn files_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.stats.total_files as f64 / secs
        } else {
            0.0
        }
    }
}
