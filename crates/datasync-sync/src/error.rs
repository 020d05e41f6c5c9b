//! Error and warning types for sync passes.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use datasync_core::{ScanError, ScanWarning};
use datasync_diff::DiffWarning;

/// Errors reported by a dataset service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The service could not be reached or refused the request.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Dataset or remote path does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Target already exists and overwriting was not requested.
    #[error("Already exists: {0}")]
    Conflict(String),

    /// Local or store I/O failure.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Dataset manifest could not be read or written.
    #[error("Invalid manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

impl ServiceError {
    /// Wrap an I/O error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors that abort a sync pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The local path could not be scanned.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// An upload failed; remaining uploads were not attempted.
    #[error("Upload of {path} to dataset {dataset_id} failed: {source}")]
    Upload {
        path: PathBuf,
        dataset_id: String,
        #[source]
        source: ServiceError,
    },

    /// The local path is neither a file nor a directory.
    #[error("{path} is neither a file nor a directory")]
    UnsupportedTarget { path: PathBuf },
}

/// Degraded conditions surfaced in a sync report.
#[derive(Debug, Clone, Serialize)]
pub enum SyncWarning {
    /// The remote listing never became visible; an empty tree was assumed.
    ListingUnavailable { attempts: u32 },
    /// Raised while diffing.
    Diff(DiffWarning),
    /// Raised while scanning the local tree.
    Scan(ScanWarning),
}

impl fmt::Display for SyncWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ListingUnavailable { attempts } => write!(
                f,
                "dataset listing unavailable after {attempts} attempts, assumed empty"
            ),
            Self::Diff(warning) => write!(f, "{warning}"),
            Self::Scan(warning) => write!(f, "{}", warning.message),
        }
    }
}

impl From<DiffWarning> for SyncWarning {
    fn from(warning: DiffWarning) -> Self {
        Self::Diff(warning)
    }
}

impl From<ScanWarning> for SyncWarning {
    fn from(warning: ScanWarning) -> Self {
        Self::Scan(warning)
    }
}
