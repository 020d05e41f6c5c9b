use std::collections::HashSet;
use std::fs;
use std::path::Path;

use datasync_core::{ContentEntry, EntrySize};
use datasync_diff::{
    DiffWarning, MatchOutcome, MismatchKind, check_directory, check_file, diff, diff_at,
};
use tempfile::TempDir;

fn root() -> &'static Path {
    Path::new("/data/run")
}

#[test]
fn test_extra_local_file() {
    let remote = vec![ContentEntry::file("a.txt", 100u64)];
    let local = vec![
        ContentEntry::file("a.txt", 100u64),
        ContentEntry::file("b.txt", 50u64),
    ];

    let result = diff_at(&remote, &local, root(), "run");

    assert!(result.missing_locally.is_empty());
    assert!(result.mismatches.is_empty());
    assert_eq!(result.extra_locally.len(), 1);
    assert_eq!(result.extra_locally[0].path, "run/b.txt");
    assert_eq!(result.extra_locally[0].local_path, root().join("b.txt"));
    assert_eq!(result.matched, 1);
}

#[test]
fn test_size_mismatch_reason_embeds_both_sizes() {
    let remote = vec![ContentEntry::file("a.txt", 100u64)];
    let local = vec![ContentEntry::file("a.txt", 200u64)];

    let result = diff_at(&remote, &local, root(), "run");

    assert_eq!(result.mismatches.len(), 1);
    let mismatch = &result.mismatches[0];
    assert_eq!(mismatch.kind, MismatchKind::SizeDiffers);
    assert!(mismatch.reason.contains("100"));
    assert!(mismatch.reason.contains("200"));
    assert!(mismatch.is_actionable());
    assert!(!result.is_in_sync());
}

#[test]
fn test_missing_directory_lists_descendants() {
    let remote = vec![ContentEntry::directory(
        "dir1",
        vec![ContentEntry::file("x.txt", 10u64)],
    )];

    let result = diff_at(&remote, &[], root(), "run");

    let paths: Vec<_> = result
        .missing_locally
        .iter()
        .map(|m| m.path.as_str())
        .collect();
    // The directory comes before its contents
    assert_eq!(paths, vec!["run/dir1", "run/dir1/x.txt"]);
    // Nothing missing locally is ever uploaded
    assert!(result.is_in_sync());
}

#[test]
fn test_missing_directory_with_many_descendants() {
    let remote = vec![ContentEntry::directory(
        "frames",
        vec![
            ContentEntry::file("f1", 1u64),
            ContentEntry::file("f2", 2u64),
            ContentEntry::directory(
                "late",
                vec![ContentEntry::file("f3", 3u64), ContentEntry::file("f4", 4u64)],
            ),
        ],
    )];
    let descendants = remote[0].descendant_count() as usize;

    let result = diff_at(&remote, &[], root(), "run");

    // The directory itself plus every descendant
    assert_eq!(result.missing_locally.len(), descendants + 1);
    assert_eq!(
        result
            .missing_locally
            .iter()
            .filter(|m| m.remote.is_file())
            .count(),
        4
    );
}

#[test]
fn test_unknown_remote_size_is_unconfirmed() {
    let remote = vec![ContentEntry::file("traj.nc", EntrySize::Unknown)];
    let local = vec![ContentEntry::file("traj.nc", 0u64)];

    let result = diff_at(&remote, &local, root(), "run");

    assert_eq!(result.matched, 0);
    assert_eq!(result.mismatches.len(), 1);
    assert_eq!(result.mismatches[0].kind, MismatchKind::SizeUnconfirmed);
    assert_eq!(
        result.warnings,
        vec![DiffWarning::SizeUnknown {
            path: "run/traj.nc".to_string()
        }]
    );
}

#[test]
fn test_kind_change_needs_manual_resolution() {
    let remote = vec![ContentEntry::file("out", 10u64)];
    let local = vec![ContentEntry::directory(
        "out",
        vec![ContentEntry::file("a", 10u64)],
    )];

    let result = diff_at(&remote, &local, root(), "run");

    assert_eq!(result.mismatches.len(), 1);
    let mismatch = &result.mismatches[0];
    assert_eq!(mismatch.kind, MismatchKind::KindChanged);
    assert!(!mismatch.is_actionable());
    // No recursion into the local directory
    assert!(result.extra_locally.is_empty());
    assert!(result.is_in_sync());
}

#[test]
fn test_nested_directories_recurse() {
    let remote = vec![ContentEntry::directory(
        "run",
        vec![
            ContentEntry::directory("logs", vec![ContentEntry::file("out.txt", 5u64)]),
            ContentEntry::file("gone.txt", 1u64),
        ],
    )];
    let local = vec![ContentEntry::directory(
        "run",
        vec![
            ContentEntry::directory(
                "logs",
                vec![
                    ContentEntry::file("out.txt", 6u64),
                    ContentEntry::file("err.txt", 2u64),
                ],
            ),
            ContentEntry::directory("new", Vec::new()),
        ],
    )];

    let result = diff(&remote, &local, root());

    assert_eq!(result.mismatches.len(), 1);
    assert_eq!(result.mismatches[0].path, "run/logs/out.txt");
    assert_eq!(result.mismatches[0].local_path, root().join("logs/out.txt"));

    let extra: Vec<_> = result.extra_locally.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(extra, vec!["run/logs/err.txt", "run/new"]);

    assert_eq!(result.missing_locally.len(), 1);
    assert_eq!(result.missing_locally[0].path, "run/gone.txt");
}

#[test]
fn test_level_totals_cover_distinct_names() {
    let remote = vec![
        ContentEntry::file("a", 1u64),
        ContentEntry::file("b", 2u64),
        ContentEntry::file("c", 3u64),
        ContentEntry::other("pipe", 0u64),
    ];
    let local = vec![
        ContentEntry::file("b", 2u64),
        ContentEntry::file("c", 4u64),
        ContentEntry::file("d", 5u64),
        ContentEntry::other("pipe", 0u64),
    ];

    let result = diff_at(&remote, &local, root(), "run");

    let distinct: HashSet<_> = remote
        .iter()
        .chain(local.iter())
        .map(|e| e.name.as_str())
        .collect();
    let on_both = remote
        .iter()
        .filter(|r| local.iter().any(|l| l.name == r.name))
        .count();

    assert_eq!(
        result.missing_locally.len() + on_both + result.extra_locally.len(),
        distinct.len()
    );
    assert_eq!(result.difference_count(), 3);
}

#[test]
fn test_identical_trees_are_in_sync() {
    let tree = vec![ContentEntry::directory(
        "run",
        vec![
            ContentEntry::file("a", 1u64),
            ContentEntry::directory("sub", vec![ContentEntry::file("b", 2u64)]),
        ],
    )];

    let result = diff(&tree, &tree, root());

    assert_eq!(result.difference_count(), 0);
    assert_eq!(result.matched, 2);
    assert!(result.is_in_sync());
}

#[test]
fn test_check_file_against_local_size() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("traj.nc");
    fs::write(&path, vec![0u8; 100]).unwrap();

    let exact = vec![ContentEntry::file("traj.nc", 100u64)];
    assert_eq!(check_file(&exact, "traj.nc", &path), MatchOutcome::Match);

    let off_by_one = vec![ContentEntry::file("traj.nc", 101u64)];
    assert_eq!(
        check_file(&off_by_one, "traj.nc", &path),
        MatchOutcome::Mismatch {
            remote: EntrySize::Known(101),
            local: 100
        }
    );

    let unknown = vec![ContentEntry::file("traj.nc", EntrySize::Unknown)];
    assert_eq!(check_file(&unknown, "traj.nc", &path), MatchOutcome::NotFound);

    let renamed = vec![ContentEntry::file("other.nc", 100u64)];
    assert_eq!(check_file(&renamed, "traj.nc", &path), MatchOutcome::NotFound);
}

#[test]
fn test_check_file_fails_closed() {
    let temp = TempDir::new().unwrap();
    let listing = vec![ContentEntry::file("gone.nc", 0u64)];

    let outcome = check_file(&listing, "gone.nc", &temp.path().join("gone.nc"));
    assert_eq!(outcome, MatchOutcome::NotFound);
}

#[test]
fn test_check_directory_uses_total_size() {
    let listing = vec![ContentEntry::directory(
        "run",
        vec![ContentEntry::file("a", 10u64), ContentEntry::file("b", 20u64)],
    )];

    assert!(check_directory(&listing, "run", 30).is_match());
    assert!(check_directory(&listing, "run", 29).is_found());
    assert!(!check_directory(&listing, "run", 29).is_match());
}
