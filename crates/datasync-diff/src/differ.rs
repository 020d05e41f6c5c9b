//! Recursive comparison of a remote listing against a local tree.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::{debug, warn};

use datasync_core::wire::join_remote;
use datasync_core::{ContentEntry, EntrySize};

use crate::result::{
    DiffResult, DiffWarning, ExtraEntry, Mismatch, MismatchKind, MissingEntry, Side,
};

/// Compare a remote listing against a local listing rooted at `local_root`.
///
/// Both slices are sibling lists at the dataset root. Typically the local
/// side is the single-element listing of a scanned tree, in which case the
/// root entry maps to `local_root` itself.
pub fn diff(remote: &[ContentEntry], local: &[ContentEntry], local_root: &Path) -> DiffResult {
    let result = diff_at(remote, local, local_root, "");
    debug!(
        missing = result.missing_locally.len(),
        extra = result.extra_locally.len(),
        mismatched = result.mismatches.len(),
        matched = result.matched,
        "diff complete"
    );
    result
}

/// Compare two sibling lists found under `parent_path`.
///
/// `local_base` is the local directory holding the local siblings, except at
/// the dataset root (empty `parent_path`) where it is the local root entry
/// itself.
pub fn diff_at(
    remote: &[ContentEntry],
    local: &[ContentEntry],
    local_base: &Path,
    parent_path: &str,
) -> DiffResult {
    let mut result = DiffResult::new();

    let remote_by_name = index_by_name(remote, parent_path, Side::Remote, &mut result.warnings);
    let local_by_name = index_by_name(local, parent_path, Side::Local, &mut result.warnings);

    for (name, remote_item) in &remote_by_name {
        let path = join_remote(parent_path, name);
        let local_path = local_item_path(local_base, parent_path, name);

        let Some(local_item) = local_by_name.get(name) else {
            result.missing_locally.push(MissingEntry {
                path: path.clone(),
                local_path: local_path.clone(),
                remote: (*remote_item).clone(),
                reason: "Missing in local data".to_string(),
            });
            if remote_item.is_dir() && !remote_item.children.is_empty() {
                // Everything below is missing too
                result.merge(diff_at(&remote_item.children, &[], &local_path, &path));
            }
            continue;
        };

        if !remote_item.kind.same_kind(&local_item.kind) {
            let reason = format!(
                "Type change: dataset has {}, local has {}",
                remote_item.kind, local_item.kind
            );
            warn!(path = %path, "{reason}");
            result.mismatches.push(Mismatch {
                path,
                local_path,
                remote: (*remote_item).clone(),
                local: (*local_item).clone(),
                kind: MismatchKind::KindChanged,
                reason,
            });
            continue;
        }

        if remote_item.is_dir() {
            result.merge(diff_at(
                &remote_item.children,
                &local_item.children,
                &local_path,
                &path,
            ));
        } else if remote_item.is_file() {
            compare_files(&mut result, path, local_path, remote_item, local_item);
        }
    }

    for (name, local_item) in &local_by_name {
        if remote_by_name.contains_key(name) {
            continue;
        }
        result.extra_locally.push(ExtraEntry {
            path: join_remote(parent_path, name),
            local_path: local_item_path(local_base, parent_path, name),
            local: (*local_item).clone(),
            reason: "Extra in local data, not in dataset".to_string(),
        });
    }

    result
}

fn compare_files(
    result: &mut DiffResult,
    path: String,
    local_path: PathBuf,
    remote: &ContentEntry,
    local: &ContentEntry,
) {
    if remote.size.confirms(local.size) {
        result.matched += 1;
        return;
    }

    let (kind, reason) = match remote.size {
        EntrySize::Unknown => {
            warn!(path = %path, "remote size unknown, file cannot be confirmed");
            result.warnings.push(DiffWarning::SizeUnknown { path: path.clone() });
            (
                MismatchKind::SizeUnconfirmed,
                format!("Size unconfirmed: dataset size is unknown, local is {}", local.size),
            )
        }
        EntrySize::Known(_) => (
            MismatchKind::SizeDiffers,
            format!(
                "Size mismatch: dataset is {}, local is {}",
                remote.size, local.size
            ),
        ),
    };

    result.mismatches.push(Mismatch {
        path,
        local_path,
        remote: remote.clone(),
        local: local.clone(),
        kind,
        reason,
    });
}

/// Build an insertion-ordered name map; duplicates keep the later entry.
fn index_by_name<'a>(
    entries: &'a [ContentEntry],
    parent_path: &str,
    side: Side,
    warnings: &mut Vec<DiffWarning>,
) -> IndexMap<&'a str, &'a ContentEntry> {
    let mut by_name = IndexMap::with_capacity(entries.len());
    for entry in entries {
        if by_name.insert(entry.name.as_str(), entry).is_some() {
            let path = join_remote(parent_path, &entry.name);
            warn!(path = %path, ?side, "duplicate entry name, using the later one");
            warnings.push(DiffWarning::DuplicateName { path, side });
        }
    }
    by_name
}

fn local_item_path(local_base: &Path, parent_path: &str, name: &str) -> PathBuf {
    if parent_path.is_empty() {
        local_base.to_path_buf()
    } else {
        local_base.join(name)
    }
}
