//! Diff result types.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use datasync_core::ContentEntry;

/// Entry present in the remote tree but absent locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingEntry {
    /// Remote-relative path.
    pub path: String,
    /// Where the entry would be found locally.
    pub local_path: PathBuf,
    /// The remote entry.
    pub remote: ContentEntry,
    /// Human-readable explanation.
    pub reason: String,
}

/// Entry present locally but absent from the remote tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraEntry {
    /// Remote-relative path the entry would be uploaded to.
    pub path: String,
    /// Local filesystem path.
    pub local_path: PathBuf,
    /// The full local entry, children included.
    pub local: ContentEntry,
    /// Human-readable explanation.
    pub reason: String,
}

/// Why two entries with the same name do not match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MismatchKind {
    /// Both are files with different known sizes.
    SizeDiffers,
    /// Both are files but the remote size is unknown.
    SizeUnconfirmed,
    /// The entry changed type (e.g. file remotely, directory locally).
    KindChanged,
}

impl fmt::Display for MismatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SizeDiffers => write!(f, "size differs"),
            Self::SizeUnconfirmed => write!(f, "size unconfirmed"),
            Self::KindChanged => write!(f, "type changed"),
        }
    }
}

/// Entry present on both sides that does not match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    /// Remote-relative path.
    pub path: String,
    /// Local filesystem path.
    pub local_path: PathBuf,
    /// The remote entry.
    pub remote: ContentEntry,
    /// The local entry.
    pub local: ContentEntry,
    /// Kind of mismatch.
    pub kind: MismatchKind,
    /// Human-readable explanation.
    pub reason: String,
}

impl Mismatch {
    /// Whether re-uploading the local file resolves this mismatch.
    ///
    /// Type changes need manual resolution.
    pub fn is_actionable(&self) -> bool {
        matches!(
            self.kind,
            MismatchKind::SizeDiffers | MismatchKind::SizeUnconfirmed
        )
    }
}

/// Side of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Remote,
    Local,
}

/// Data-quality warning raised while diffing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffWarning {
    /// Two siblings share a name; the later one was used.
    DuplicateName { path: String, side: Side },
    /// A remote file has no usable size, so it cannot be confirmed.
    SizeUnknown { path: String },
}

impl fmt::Display for DiffWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateName { path, side } => {
                write!(f, "duplicate name in {side:?} listing: {path}")
            }
            Self::SizeUnknown { path } => write!(f, "remote size unknown: {path}"),
        }
    }
}

/// Classification produced by one diff pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    /// Present remotely, absent locally (descendants included).
    pub missing_locally: Vec<MissingEntry>,
    /// Present locally, absent remotely.
    pub extra_locally: Vec<ExtraEntry>,
    /// Present on both sides but different.
    pub mismatches: Vec<Mismatch>,
    /// Files confirmed identical by size.
    pub matched: u64,
    /// Data-quality warnings.
    pub warnings: Vec<DiffWarning>,
}

impl DiffResult {
    /// Create an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a sub-result into this one.
    pub fn merge(&mut self, other: DiffResult) {
        self.missing_locally.extend(other.missing_locally);
        self.extra_locally.extend(other.extra_locally);
        self.mismatches.extend(other.mismatches);
        self.matched += other.matched;
        self.warnings.extend(other.warnings);
    }

    /// True when nothing needs uploading.
    pub fn is_in_sync(&self) -> bool {
        self.extra_locally.is_empty() && !self.mismatches.iter().any(Mismatch::is_actionable)
    }

    /// Number of entries classified as different in any way.
    pub fn difference_count(&self) -> usize {
        self.missing_locally.len() + self.extra_locally.len() + self.mismatches.len()
    }
}
