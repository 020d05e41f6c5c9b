//! JWalk-based directory scanner.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use compact_str::CompactString;
use jwalk::{Parallelism, WalkDir};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use datasync_core::{
    ContentEntry, ContentTree, ScanConfig, ScanError, ScanWarning, TreeStats, WarningKind,
};

use crate::progress::ScanProgress;

/// Files between two progress broadcasts.
const PROGRESS_INTERVAL: u64 = 1000;

/// Scanner producing listing-shaped content trees.
pub struct TreeScanner {
    config: ScanConfig,
    progress_tx: broadcast::Sender<ScanProgress>,
}

impl TreeScanner {
    /// Create a new scanner with default settings.
    pub fn new() -> Self {
        Self::with_config(ScanConfig::default())
    }

    /// Create a scanner with the given configuration.
    pub fn with_config(config: ScanConfig) -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self {
            config,
            progress_tx,
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Subscribe to scan progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    /// Scan the directory at `root`.
    pub fn scan(&self, root: impl AsRef<Path>) -> Result<ContentTree, ScanError> {
        let start = Instant::now();
        let root = root.as_ref();
        let root_path = root.canonicalize().map_err(|e| ScanError::io(root, e))?;

        let root_metadata =
            std::fs::metadata(&root_path).map_err(|e| ScanError::io(&root_path, e))?;
        if !root_metadata.is_dir() {
            return Err(ScanError::NotADirectory { path: root_path });
        }

        // The root must be listable; failures further down only degrade the tree.
        std::fs::read_dir(&root_path).map_err(|e| ScanError::io(&root_path, e))?;

        let mut stats = TreeStats::new();
        let mut warnings = Vec::new();

        let mut entries = self.collect_entries(&root_path, start, &mut stats, &mut warnings);

        let root_name = root_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| root_path.to_string_lossy().to_string());
        let root_entry = build_node(&root_path, root_name.into(), &mut entries);

        let scan_duration = start.elapsed();
        debug!(
            root = %root_path.display(),
            files = stats.total_files,
            dirs = stats.total_dirs,
            warnings = warnings.len(),
            "scan complete"
        );

        Ok(ContentTree::new(
            root_entry,
            root_path,
            stats,
            scan_duration,
            warnings,
        ))
    }

    /// Collect all entries below the root, grouped by parent directory.
    fn collect_entries(
        &self,
        root_path: &Path,
        start: Instant,
        stats: &mut TreeStats,
        warnings: &mut Vec<ScanWarning>,
    ) -> HashMap<PathBuf, Vec<PendingEntry>> {
        let parallelism = match self.config.threads {
            0 => Parallelism::RayonDefaultPool {
                busy_timeout: Duration::from_millis(100),
            },
            1 => Parallelism::Serial,
            n => Parallelism::RayonNewPool(n),
        };

        // Ignored entries are pruned before jwalk descends into them.
        let ignore = self.config.clone();
        let walker = WalkDir::new(root_path)
            .parallelism(parallelism)
            .skip_hidden(!self.config.include_hidden)
            .follow_links(self.config.follow_symlinks)
            .sort(true)
            .process_read_dir(move |_depth, _path, _state, children| {
                children.retain(|child| match child {
                    Ok(entry) => !ignore.should_ignore(&entry.file_name().to_string_lossy()),
                    Err(_) => true,
                });
            });

        let mut entries_by_parent: HashMap<PathBuf, Vec<PendingEntry>> = HashMap::new();

        for entry_result in walker {
            let entry = match entry_result {
                Ok(e) => e,
                Err(err) => {
                    // A directory whose listing failed keeps whatever was read.
                    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                    warn!(path = %path.display(), error = %err, "could not fully scan directory");
                    warnings.push(ScanWarning::read_error(path, &err));
                    continue;
                }
            };

            if entry.depth() == 0 {
                continue;
            }

            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();

            let Some(parent) = path.parent().map(Path::to_path_buf) else {
                continue;
            };

            let file_type = entry.file_type();
            let kind = if file_type.is_dir() {
                stats.record_dir();
                PendingKind::Directory
            } else if file_type.is_symlink() {
                // Links are sized by their target; a dangling link is an error entry.
                match std::fs::metadata(&path) {
                    Ok(m) if m.is_file() => {
                        stats.record_file(m.len());
                        PendingKind::File(m.len())
                    }
                    Ok(m) => {
                        stats.record_other();
                        PendingKind::Other(m.len())
                    }
                    Err(err) => {
                        stats.record_error();
                        warnings.push(ScanWarning::broken_symlink(&path, &err));
                        PendingKind::Error(format!("Broken link: {err}"))
                    }
                }
            } else {
                match entry.metadata() {
                    Ok(m) if file_type.is_file() => {
                        stats.record_file(m.len());
                        PendingKind::File(m.len())
                    }
                    Ok(m) => {
                        stats.record_other();
                        PendingKind::Other(m.len())
                    }
                    Err(err) => {
                        stats.record_error();
                        let warning = match err.io_error() {
                            Some(io_err) => ScanWarning::metadata_error(&path, io_err),
                            None => ScanWarning::new(
                                &path,
                                format!("Could not access entry: {err}"),
                                WarningKind::MetadataError,
                            ),
                        };
                        warn!(path = %path.display(), error = %err, "could not access entry");
                        warnings.push(warning);
                        PendingKind::Error(err.to_string())
                    }
                }
            };

            if stats.total_files > 0
                && matches!(kind, PendingKind::File(_))
                && stats.total_files % PROGRESS_INTERVAL == 0
            {
                let _ = self.progress_tx.send(ScanProgress::snapshot(
                    stats,
                    &path,
                    warnings.len(),
                    start.elapsed(),
                ));
            }

            entries_by_parent.entry(parent).or_default().push(PendingEntry {
                name: name.into(),
                path,
                kind,
            });
        }

        entries_by_parent
    }
}

impl Default for TreeScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Scan a directory with default settings.
pub fn scan(root: impl AsRef<Path>) -> Result<ContentTree, ScanError> {
    TreeScanner::new().scan(root)
}

/// Entry collected during the walk, before the tree is assembled.
struct PendingEntry {
    name: CompactString,
    path: PathBuf,
    kind: PendingKind,
}

enum PendingKind {
    Directory,
    File(u64),
    Other(u64),
    Error(String),
}

/// Recursively assemble a directory entry from the collected children.
fn build_node(
    path: &Path,
    name: CompactString,
    entries_by_parent: &mut HashMap<PathBuf, Vec<PendingEntry>>,
) -> ContentEntry {
    let pending = entries_by_parent.remove(path).unwrap_or_default();

    let mut children: Vec<ContentEntry> = pending
        .into_iter()
        .map(|entry| match entry.kind {
            PendingKind::Directory => build_node(&entry.path, entry.name, entries_by_parent),
            PendingKind::File(size) => ContentEntry::file(entry.name, size),
            PendingKind::Other(size) => ContentEntry::other(entry.name, size),
            PendingKind::Error(message) => ContentEntry::error(entry.name, message),
        })
        .collect();

    children.sort_by(|a, b| a.name.cmp(&b.name));

    ContentEntry::directory(name, children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use datasync_core::EntrySize;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        fs::create_dir(root.join("dir1")).unwrap();
        fs::create_dir(root.join("dir2")).unwrap();
        fs::create_dir(root.join("dir1/subdir")).unwrap();

        fs::write(root.join("file1.txt"), "hello").unwrap();
        fs::write(root.join("dir1/file2.txt"), "world!").unwrap();
        fs::write(root.join("dir1/subdir/file3.txt"), "nested content").unwrap();
        fs::write(root.join("dir2/file4.txt"), "more").unwrap();

        temp
    }

    #[test]
    fn test_basic_scan() {
        let temp = create_test_tree();
        let tree = TreeScanner::new().scan(temp.path()).unwrap();

        assert_eq!(tree.stats.total_files, 4);
        assert_eq!(tree.stats.total_dirs, 3);
        assert_eq!(tree.root.size, EntrySize::Known(5 + 6 + 14 + 4));
        assert!(tree.root.is_dir());
    }

    #[test]
    fn test_directory_sizes_aggregate() {
        let temp = create_test_tree();
        let tree = TreeScanner::new().scan(temp.path()).unwrap();

        let dir1 = tree.root.child("dir1").unwrap();
        assert_eq!(dir1.size, EntrySize::Known(6 + 14));
        let subdir = dir1.child("subdir").unwrap();
        assert_eq!(subdir.size, EntrySize::Known(14));
    }

    #[test]
    fn test_children_sorted_by_name() {
        let temp = create_test_tree();
        let tree = TreeScanner::new().scan(temp.path()).unwrap();

        let names: Vec<_> = tree.root.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["dir1", "dir2", "file1.txt"]);
    }

    #[test]
    fn test_ignore_patterns() {
        let temp = create_test_tree();
        let config = ScanConfig::builder()
            .ignore_patterns(vec!["dir2".to_string()])
            .build()
            .unwrap();

        let tree = TreeScanner::with_config(config).scan(temp.path()).unwrap();

        assert!(!tree.root.children.iter().any(|c| c.name.as_str() == "dir2"));
        assert_eq!(tree.root.size, EntrySize::Known(5 + 6 + 14));
        // Nothing below an ignored directory is counted
        assert_eq!(tree.stats.total_files, 3);
        assert_eq!(tree.stats.total_dirs, 2);
        assert_eq!(tree.stats.total_size, 5 + 6 + 14);
    }

    #[test]
    fn test_ignored_directory_contents_not_counted() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("cache")).unwrap();
        for i in 0..5 {
            fs::write(temp.path().join(format!("cache/blob{i}")), vec![0u8; 100]).unwrap();
        }
        fs::write(temp.path().join("keep"), vec![0u8; 7]).unwrap();

        let config = ScanConfig::builder()
            .ignore_patterns(vec!["cache".to_string()])
            .build()
            .unwrap();
        let tree = TreeScanner::with_config(config).scan(temp.path()).unwrap();

        assert_eq!(tree.root.size, EntrySize::Known(7));
        assert_eq!(tree.stats.total_files, 1);
        assert_eq!(tree.stats.total_size, 7);
        assert_eq!(tree.stats.total_dirs, 0);
    }

    #[test]
    fn test_root_must_be_directory() {
        let temp = create_test_tree();
        let result = TreeScanner::new().scan(temp.path().join("file1.txt"));
        assert!(matches!(result, Err(ScanError::NotADirectory { .. })));
    }

    #[test]
    fn test_missing_root() {
        let temp = TempDir::new().unwrap();
        let result = TreeScanner::new().scan(temp.path().join("nope"));
        assert!(matches!(result, Err(ScanError::NotFound { .. })));
    }
}
