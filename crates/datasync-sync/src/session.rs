//! Sync sessions: one service handle, one configuration, many passes.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use datasync_core::{EntryKind, ScanError, SyncConfig};
use datasync_diff::{DiffResult, MatchOutcome, check_directory, check_file, diff};
use datasync_scan::TreeScanner;

use crate::driver::{SyncDriver, UploadPlan};
use crate::error::{SyncError, SyncWarning};
use crate::listing::{ListingFetch, fetch_listing};
use crate::operation::{SkippedUpload, UploadOperation};
use crate::service::DatasetService;

/// Name used when the local path has no final component.
const FALLBACK_TARGET_NAME: &str = "uploaded_directory";

/// What a sync pass decided to do with the top-level item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncDecision {
    /// Already present with a matching size.
    Skip,
    /// Present but possibly stale: diffed and patched.
    FullDiff,
    /// Absent (or an unconfirmed file): uploaded whole.
    DirectUpload,
}

/// Summary of one sync pass.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    /// Dataset that was synced.
    pub dataset_id: String,
    /// Canonical local path.
    pub local_path: PathBuf,
    /// Name of the item at the dataset root.
    pub target_name: String,
    /// Decision taken after the existence check.
    pub decision: SyncDecision,
    /// Outcome of the existence check.
    pub outcome: MatchOutcome,
    /// Diff, when one was run.
    pub diff: Option<DiffResult>,
    /// Uploads performed, in order.
    pub uploads: Vec<UploadOperation>,
    /// Differences left for manual resolution.
    pub skipped: Vec<SkippedUpload>,
    /// Listing attempts used.
    pub listing_attempts: u32,
    /// Degraded conditions met along the way.
    pub warnings: Vec<SyncWarning>,
}

/// An explicit sync context owning the dataset service and configuration.
///
/// Create one per process and pass it by reference; nothing is cached
/// between passes.
pub struct SyncSession<S: DatasetService> {
    service: S,
    config: SyncConfig,
    scanner: TreeScanner,
}

impl<S: DatasetService> SyncSession<S> {
    /// Create a session with default configuration.
    pub fn new(service: S) -> Self {
        Self::with_config(service, SyncConfig::default())
    }

    /// Create a session with the given configuration.
    pub fn with_config(service: S, config: SyncConfig) -> Self {
        let scanner = TreeScanner::with_config(config.scan.clone());
        Self {
            service,
            config,
            scanner,
        }
    }

    /// The dataset service.
    pub fn service(&self) -> &S {
        &self.service
    }

    /// The session configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The scanner used for local trees.
    pub fn scanner(&self) -> &TreeScanner {
        &self.scanner
    }

    /// Consume the session, returning the service.
    pub fn into_service(self) -> S {
        self.service
    }

    /// Fetch the root listing of a dataset using the configured retry policy.
    pub fn fetch_listing(&self, dataset_id: &str) -> ListingFetch {
        fetch_listing(
            &self.service,
            dataset_id,
            self.config.listing_max_attempts,
            self.config.listing_retry_delay(),
        )
    }

    /// Bring `dataset_id` up to date with the file or directory at `local_path`.
    ///
    /// The item is named after `local_path` as given, so a symlink syncs under
    /// its own name rather than its target's.
    pub fn sync(&self, local_path: &Path, dataset_id: &str) -> Result<SyncReport, SyncError> {
        let given_path = local_path;
        let local_path = given_path
            .canonicalize()
            .map_err(|e| ScanError::io(given_path, e))?;
        let metadata =
            std::fs::metadata(&local_path).map_err(|e| ScanError::io(&local_path, e))?;
        let local_kind = if metadata.is_file() {
            EntryKind::File
        } else if metadata.is_dir() {
            EntryKind::Directory
        } else {
            return Err(SyncError::UnsupportedTarget { path: local_path });
        };

        let listing = self.fetch_listing(dataset_id);
        let mut warnings = Vec::new();
        if !listing.available {
            warnings.push(SyncWarning::ListingUnavailable {
                attempts: listing.attempts,
            });
        }

        let target_name = target_name(given_path, &local_path);
        let mut report = SyncReport {
            dataset_id: dataset_id.to_string(),
            local_path: local_path.clone(),
            target_name: target_name.clone(),
            decision: SyncDecision::Skip,
            outcome: MatchOutcome::NotFound,
            diff: None,
            uploads: Vec::new(),
            skipped: Vec::new(),
            listing_attempts: listing.attempts,
            warnings,
        };

        if let Some(remote) = listing
            .entries
            .iter()
            .find(|entry| entry.name == target_name && !entry.kind.same_kind(&local_kind))
        {
            let reason = format!(
                "Type change: dataset has {}, local has {local_kind}",
                remote.kind
            );
            warn!(dataset_id, target = %target_name, "{reason}");
            report.skipped.push(SkippedUpload {
                path: target_name.clone(),
                local_path: local_path.clone(),
                reason,
            });
            return Ok(report);
        }

        let driver = SyncDriver::new(&self.service, dataset_id);

        if local_kind.is_file() {
            report.outcome = check_file(&listing.entries, &target_name, &local_path);
            if report.outcome.is_match() {
                info!(target = %target_name, "file already in dataset, skipping");
                return Ok(report);
            }

            let upload = UploadOperation::file(given_path, "", true);
            driver.run(&upload)?;
            report.decision = SyncDecision::DirectUpload;
            report.uploads.push(upload);
        } else {
            let tree = self.scanner.scan(&local_path)?;
            report
                .warnings
                .extend(tree.warnings.iter().cloned().map(SyncWarning::from));

            report.outcome = check_directory(&listing.entries, &target_name, tree.total_size());
            if report.outcome.is_found() {
                let mut local_root = tree.root.clone();
                local_root.name = target_name.as_str().into();

                let result = diff(&listing.entries, &[local_root], &local_path);
                report
                    .warnings
                    .extend(result.warnings.iter().cloned().map(SyncWarning::from));

                let UploadPlan { uploads, skipped } = driver.apply(&result)?;
                report.decision = SyncDecision::FullDiff;
                report.uploads = uploads;
                report.skipped = skipped;
                report.diff = Some(result);
            } else {
                let upload = UploadOperation::directory(given_path, "");
                driver.run(&upload)?;
                report.decision = SyncDecision::DirectUpload;
                report.uploads.push(upload);
            }
        }

        for warning in &report.warnings {
            warn!(dataset_id, "{warning}");
        }
        info!(
            dataset_id,
            target = %report.target_name,
            decision = ?report.decision,
            uploads = report.uploads.len(),
            skipped = report.skipped.len(),
            "sync pass complete"
        );

        Ok(report)
    }
}

/// Name of the top-level item in the dataset.
///
/// Paths without a final component (`.`, `..`) fall back to the canonical
/// name.
fn target_name(given_path: &Path, canonical_path: &Path) -> String {
    given_path
        .file_name()
        .or_else(|| canonical_path.file_name())
        .map(|name| name.to_string_lossy().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_TARGET_NAME.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_name() {
        let canonical = Path::new("/data/run_42");
        assert_eq!(target_name(Path::new("/data/run_42"), canonical), "run_42");
        assert_eq!(target_name(Path::new("./latest"), canonical), "latest");
        assert_eq!(target_name(Path::new("."), canonical), "run_42");
        assert_eq!(target_name(Path::new("/"), Path::new("/")), FALLBACK_TARGET_NAME);
    }
}
