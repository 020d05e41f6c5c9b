//! Cheap top-level existence checks against a listing.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use datasync_core::{ContentEntry, EntryKind, EntrySize};

/// Outcome of looking up one item in a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOutcome {
    /// Found with a known size equal to the local size.
    Match,
    /// Found with a known size different from the local size.
    Mismatch { remote: EntrySize, local: u64 },
    /// Not present, not confirmable (unknown remote size), or the local side
    /// could not be read.
    NotFound,
}

impl MatchOutcome {
    /// Check if this is a confirmed match.
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match)
    }

    /// Check if the remote item was located at all.
    pub fn is_found(&self) -> bool {
        !matches!(self, Self::NotFound)
    }
}

/// Check whether `name` exists in `listing` as a file matching `local_path`.
///
/// Fails closed: an unreadable local file yields [`MatchOutcome::NotFound`].
pub fn check_file(listing: &[ContentEntry], name: &str, local_path: &Path) -> MatchOutcome {
    let local_size = match std::fs::metadata(local_path) {
        Ok(m) if m.is_file() => m.len(),
        Ok(_) => {
            debug!(path = %local_path.display(), "local path is not a file");
            return MatchOutcome::NotFound;
        }
        Err(err) => {
            debug!(path = %local_path.display(), error = %err, "cannot stat local file");
            return MatchOutcome::NotFound;
        }
    };

    lookup(listing, name, &EntryKind::File, local_size)
}

/// Check whether `name` exists in `listing` as a directory of `local_size` bytes.
pub fn check_directory(listing: &[ContentEntry], name: &str, local_size: u64) -> MatchOutcome {
    lookup(listing, name, &EntryKind::Directory, local_size)
}

fn lookup(listing: &[ContentEntry], name: &str, kind: &EntryKind, local_size: u64) -> MatchOutcome {
    let Some(remote) = listing
        .iter()
        .find(|entry| entry.name == name && entry.kind.same_kind(kind))
    else {
        debug!(name, kind = %kind, "not found in listing");
        return MatchOutcome::NotFound;
    };

    match remote.size {
        EntrySize::Known(remote_size) if remote_size == local_size => {
            debug!(name, size = local_size, "found with matching size");
            MatchOutcome::Match
        }
        EntrySize::Known(remote_size) => {
            debug!(name, remote_size, local_size, "found but sizes differ");
            MatchOutcome::Mismatch {
                remote: remote.size,
                local: local_size,
            }
        }
        EntrySize::Unknown => {
            warn!(name, "remote size unknown, cannot confirm match");
            MatchOutcome::NotFound
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> Vec<ContentEntry> {
        vec![
            ContentEntry::file("a.txt", 100u64),
            ContentEntry::file("nosize.txt", EntrySize::Unknown),
            ContentEntry::directory("run", vec![ContentEntry::file("x", 10u64)]),
        ]
    }

    #[test]
    fn test_directory_match_and_mismatch() {
        assert_eq!(check_directory(&listing(), "run", 10), MatchOutcome::Match);
        assert_eq!(
            check_directory(&listing(), "run", 11),
            MatchOutcome::Mismatch {
                remote: EntrySize::Known(10),
                local: 11
            }
        );
    }

    #[test]
    fn test_kind_must_agree() {
        // A file named like the directory is not a directory match
        assert_eq!(check_directory(&listing(), "a.txt", 100), MatchOutcome::NotFound);
    }

    #[test]
    fn test_empty_listing() {
        assert_eq!(check_directory(&[], "run", 0), MatchOutcome::NotFound);
    }

    #[test]
    fn test_unknown_size_never_matches() {
        let outcome = lookup(&listing(), "nosize.txt", &EntryKind::File, 0);
        assert!(!outcome.is_match());
        assert_eq!(outcome, MatchOutcome::NotFound);
    }

    #[test]
    fn test_directory_with_unknown_size_is_not_found() {
        let listing = vec![ContentEntry::directory_with_size("run", EntrySize::Unknown, vec![])];
        assert_eq!(check_directory(&listing, "run", 10), MatchOutcome::NotFound);
    }
}
