//! Content verification against remote file digests.
//!
//! Remote digests are computed asynchronously by the service: a hash is
//! requested, then polled at a fixed interval until it completes, fails or the
//! timeout elapses. Digests use the `sha2:<base64 sha256>` format.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use datasync_core::ContentEntry;
use datasync_core::wire::join_remote;

use crate::error::ServiceError;

/// State of a remote hash request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashPoll {
    /// Still computing.
    Pending,
    /// Finished with this digest.
    Completed(String),
    /// The service gave up.
    Failed(String),
}

/// Asynchronous remote hashing.
#[async_trait]
pub trait HashService: Send + Sync {
    /// Start hashing the file at `path` (absolute within the dataset).
    async fn request_hash(&self, dataset_id: &str, path: &str) -> Result<String, ServiceError>;

    /// Check on a request started by [`request_hash`](Self::request_hash).
    async fn poll_hash(&self, request_id: &str) -> Result<HashPoll, ServiceError>;
}

/// Request a remote digest and poll until it is ready.
///
/// Returns `None` when the request fails, the service reports a failure or
/// `timeout` elapses.
pub async fn poll_remote_hash<H: HashService + ?Sized>(
    service: &H,
    dataset_id: &str,
    path: &str,
    interval: Duration,
    timeout: Duration,
) -> Option<String> {
    let request_id = match service.request_hash(dataset_id, path).await {
        Ok(id) => id,
        Err(err) => {
            warn!(dataset_id, path, error = %err, "hash request failed");
            return None;
        }
    };

    let polling = async {
        loop {
            match service.poll_hash(&request_id).await {
                Ok(HashPoll::Completed(digest)) => return Some(digest),
                Ok(HashPoll::Failed(reason)) => {
                    warn!(path, %reason, "remote hashing failed");
                    return None;
                }
                Ok(HashPoll::Pending) => {}
                Err(err) => {
                    warn!(path, error = %err, "hash poll failed");
                    return None;
                }
            }
            tokio::time::sleep(interval).await;
        }
    };

    match tokio::time::timeout(timeout, polling).await {
        Ok(digest) => digest,
        Err(_) => {
            warn!(path, ?timeout, "timed out waiting for remote hash");
            None
        }
    }
}

/// Digest of a local file in the service's `sha2:<base64>` format.
pub fn local_digest(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("sha2:{}", STANDARD.encode(hasher.finalize())))
}

/// Comparison of a remote digest with a local file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum HashVerdict {
    /// Digests agree.
    Match { digest: String },
    /// Digests disagree.
    Differs { remote: String, local: String },
    /// No remote digest could be obtained.
    RemoteUnavailable { local: String },
    /// No local file at the expected path.
    LocalMissing,
    /// The local file could not be read.
    LocalError { message: String },
}

impl HashVerdict {
    /// Short status label for tables.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Match { .. } => "MATCH",
            Self::Differs { .. } => "DIFFERS",
            Self::RemoteUnavailable { .. } => "REMOTE_NA",
            Self::LocalMissing => "MISSING",
            Self::LocalError { .. } => "ERROR",
        }
    }

    /// Local digest, when one was computed.
    pub fn local_digest(&self) -> Option<&str> {
        match self {
            Self::Match { digest } => Some(digest),
            Self::Differs { local, .. } | Self::RemoteUnavailable { local } => Some(local),
            Self::LocalMissing | Self::LocalError { .. } => None,
        }
    }
}

/// Compare a remote digest with the local file at `local_path`.
pub fn verify_file(remote: Option<&str>, local_path: &Path) -> HashVerdict {
    if !local_path.is_file() {
        return HashVerdict::LocalMissing;
    }

    let local = match local_digest(local_path) {
        Ok(digest) => digest,
        Err(err) => {
            debug!(path = %local_path.display(), error = %err, "cannot hash local file");
            return HashVerdict::LocalError {
                message: err.to_string(),
            };
        }
    };

    match remote {
        None => HashVerdict::RemoteUnavailable { local },
        Some(remote) if remote == local => HashVerdict::Match { digest: local },
        Some(remote) => HashVerdict::Differs {
            remote: remote.to_string(),
            local,
        },
    }
}

/// Absolute (`/`-prefixed) paths of every file in a listing.
pub fn remote_file_paths(entries: &[ContentEntry]) -> Vec<String> {
    let mut paths = Vec::new();
    collect_file_paths(entries, "", &mut paths);
    paths
}

fn collect_file_paths(entries: &[ContentEntry], parent: &str, paths: &mut Vec<String>) {
    for entry in entries {
        let path = join_remote(parent, &entry.name);
        if entry.is_file() {
            paths.push(format!("/{path}"));
        } else if entry.is_dir() {
            collect_file_paths(&entry.children, &path, paths);
        }
    }
}

/// Hash status of one remote file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileHash {
    /// Absolute path within the dataset.
    pub path: String,
    /// Remote digest, if obtained.
    pub remote: Option<String>,
    /// Local comparison, when a local directory was given.
    pub verdict: Option<HashVerdict>,
}

/// Fetch remote digests for every file in `entries`, optionally comparing
/// each with the same relative path under `compare_with`.
pub async fn collect_hashes<H: HashService + ?Sized>(
    service: &H,
    dataset_id: &str,
    entries: &[ContentEntry],
    compare_with: Option<&Path>,
    interval: Duration,
    timeout: Duration,
) -> Vec<FileHash> {
    let mut hashes = Vec::new();
    for path in remote_file_paths(entries) {
        let remote = poll_remote_hash(service, dataset_id, &path, interval, timeout).await;
        let verdict = compare_with.map(|dir| {
            let local_path: PathBuf = dir.join(path.trim_start_matches('/'));
            verify_file(remote.as_deref(), &local_path)
        });
        hashes.push(FileHash {
            path,
            remote,
            verdict,
        });
    }
    hashes
}

/// Shorten a digest for display, keeping an `algo:` prefix intact.
pub fn truncate_hash(hash: &str, length: usize) -> String {
    if hash.chars().count() <= length {
        return hash.to_string();
    }
    match hash.split_once(':') {
        Some((prefix, value)) if value.chars().count() > length => {
            format!("{prefix}:{}...", value.chars().take(length).collect::<String>())
        }
        Some(_) => hash.to_string(),
        None => format!("{}...", hash.chars().take(length).collect::<String>()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_hash() {
        assert_eq!(truncate_hash("short", 20), "short");
        assert_eq!(truncate_hash("sha2:abcdefghij", 4), "sha2:abcd...");
        assert_eq!(truncate_hash("sha2:abc", 4), "sha2:abc");
        assert_eq!(truncate_hash("0123456789", 4), "0123...");
    }

    #[test]
    fn test_remote_file_paths() {
        let entries = vec![
            ContentEntry::directory(
                "sim",
                vec![
                    ContentEntry::file("a.nc", 1u64),
                    ContentEntry::directory("logs", vec![ContentEntry::file("out", 1u64)]),
                ],
            ),
            ContentEntry::file("readme", 1u64),
            ContentEntry::other("pipe", 0u64),
        ];

        assert_eq!(
            remote_file_paths(&entries),
            vec!["/sim/a.nc", "/sim/logs/out", "/readme"]
        );
    }

    #[test]
    fn test_local_digest_format() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("empty");
        std::fs::write(&path, b"").unwrap();

        // SHA-256 of the empty input
        assert_eq!(
            local_digest(&path).unwrap(),
            "sha2:47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU="
        );
    }
}
