//! Upload operations derived from a diff.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::ServiceError;
use crate::service::DatasetService;

/// A single corrective upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum UploadOperation {
    /// Upload one file into a remote directory.
    File {
        local_path: PathBuf,
        remote_dir: String,
        overwrite: bool,
    },
    /// Upload a whole directory tree under a remote parent.
    Directory {
        local_path: PathBuf,
        remote_parent: String,
    },
}

impl UploadOperation {
    /// Create a file upload.
    pub fn file(local_path: impl Into<PathBuf>, remote_dir: impl Into<String>, overwrite: bool) -> Self {
        Self::File {
            local_path: local_path.into(),
            remote_dir: remote_dir.into(),
            overwrite,
        }
    }

    /// Create a directory upload.
    pub fn directory(local_path: impl Into<PathBuf>, remote_parent: impl Into<String>) -> Self {
        Self::Directory {
            local_path: local_path.into(),
            remote_parent: remote_parent.into(),
        }
    }

    /// Local path being uploaded.
    pub fn local_path(&self) -> &Path {
        match self {
            Self::File { local_path, .. } | Self::Directory { local_path, .. } => local_path,
        }
    }

    /// Remote directory receiving the upload.
    pub fn remote_target(&self) -> &str {
        match self {
            Self::File { remote_dir, .. } => remote_dir,
            Self::Directory { remote_parent, .. } => remote_parent,
        }
    }

    /// Run the upload against a service.
    pub fn execute<S: DatasetService + ?Sized>(
        &self,
        service: &S,
        dataset_id: &str,
    ) -> Result<(), ServiceError> {
        match self {
            Self::File {
                local_path,
                remote_dir,
                overwrite,
            } => service.put_file(local_path, remote_dir, dataset_id, *overwrite),
            Self::Directory {
                local_path,
                remote_parent,
            } => service.put_directory(local_path, remote_parent, dataset_id),
        }
    }
}

impl fmt::Display for UploadOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = if self.remote_target().is_empty() {
            "/"
        } else {
            self.remote_target()
        };
        match self {
            Self::File { overwrite: true, .. } => {
                write!(f, "file {} -> {target} (overwrite)", self.local_path().display())
            }
            Self::File { .. } => write!(f, "file {} -> {target}", self.local_path().display()),
            Self::Directory { .. } => {
                write!(f, "directory {} -> {target}", self.local_path().display())
            }
        }
    }
}

/// A difference that was deliberately not uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedUpload {
    /// Remote-relative path.
    pub path: String,
    /// Local path.
    pub local_path: PathBuf,
    /// Why nothing was uploaded.
    pub reason: String,
}
