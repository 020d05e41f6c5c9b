//! Turning a diff into corrective uploads.

use serde::Serialize;
use tracing::{debug, info, warn};

use datasync_core::EntryKind;
use datasync_core::wire::remote_parent;
use datasync_diff::DiffResult;

use crate::error::SyncError;
use crate::operation::{SkippedUpload, UploadOperation};
use crate::service::DatasetService;

/// Uploads derived from one diff, plus the differences left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadPlan {
    /// Uploads to run, in order.
    pub uploads: Vec<UploadOperation>,
    /// Differences that need manual attention.
    pub skipped: Vec<SkippedUpload>,
}

impl UploadPlan {
    /// Check if nothing needs uploading.
    pub fn is_empty(&self) -> bool {
        self.uploads.is_empty()
    }
}

/// Decide which uploads resolve the differences in `diff`.
///
/// Size mismatches are re-uploaded with overwrite, then local-only entries
/// are uploaded. Entries missing locally are never acted on.
pub fn plan_uploads(diff: &DiffResult) -> UploadPlan {
    let mut plan = UploadPlan::default();

    for mismatch in &diff.mismatches {
        if mismatch.is_actionable() {
            plan.uploads.push(UploadOperation::file(
                &mismatch.local_path,
                remote_parent(&mismatch.path),
                true,
            ));
        } else {
            warn!(path = %mismatch.path, reason = %mismatch.reason, "needs manual resolution");
            plan.skipped.push(SkippedUpload {
                path: mismatch.path.clone(),
                local_path: mismatch.local_path.clone(),
                reason: mismatch.reason.clone(),
            });
        }
    }

    for extra in &diff.extra_locally {
        let parent = remote_parent(&extra.path);
        match &extra.local.kind {
            EntryKind::Directory => {
                plan.uploads
                    .push(UploadOperation::directory(&extra.local_path, parent));
            }
            EntryKind::File => {
                plan.uploads
                    .push(UploadOperation::file(&extra.local_path, parent, true));
            }
            kind => {
                warn!(path = %extra.path, kind = %kind, "not uploading entry of this type");
                plan.skipped.push(SkippedUpload {
                    path: extra.path.clone(),
                    local_path: extra.local_path.clone(),
                    reason: format!("Cannot upload entry of type {kind}"),
                });
            }
        }
    }

    for missing in &diff.missing_locally {
        debug!(path = %missing.path, "present in dataset only, leaving as is");
    }

    plan
}

/// Executes upload plans against one dataset.
pub struct SyncDriver<'a, S: DatasetService + ?Sized> {
    service: &'a S,
    dataset_id: &'a str,
}

impl<'a, S: DatasetService + ?Sized> SyncDriver<'a, S> {
    /// Create a driver for `dataset_id`.
    pub fn new(service: &'a S, dataset_id: &'a str) -> Self {
        Self {
            service,
            dataset_id,
        }
    }

    /// Plan and run the uploads for a diff.
    pub fn apply(&self, diff: &DiffResult) -> Result<UploadPlan, SyncError> {
        let plan = plan_uploads(diff);
        self.execute(&plan)?;
        Ok(plan)
    }

    /// Run uploads sequentially, stopping at the first failure.
    pub fn execute(&self, plan: &UploadPlan) -> Result<(), SyncError> {
        for operation in &plan.uploads {
            self.run(operation)?;
        }
        Ok(())
    }

    /// Run a single upload.
    pub fn run(&self, operation: &UploadOperation) -> Result<(), SyncError> {
        info!(dataset_id = self.dataset_id, "uploading {operation}");
        operation
            .execute(self.service, self.dataset_id)
            .map_err(|source| SyncError::Upload {
                path: operation.local_path().to_path_buf(),
                dataset_id: self.dataset_id.to_string(),
                source,
            })
    }
}
