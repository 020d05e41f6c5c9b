//! Directory-backed, content-addressed dataset store.
//!
//! Layout under the store root:
//!
//! ```text
//! objects/<blake3 hex>     file contents, deduplicated
//! datasets/<id>.json       one manifest per dataset
//! ```
//!
//! Manifests hold the dataset tree. Each file node records its size, the
//! object holding its bytes and the `sha2:` digest served to hash requests.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use datasync_core::wire::join_remote;
use datasync_core::{ContentEntry, EntryKind, Listing, ScanConfig};
use datasync_scan::TreeScanner;

use crate::error::ServiceError;
use crate::service::DatasetService;
use crate::verify::{HashPoll, HashService};

/// Read buffer used while hashing uploads.
const HASH_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Manifest {
    id: String,
    #[serde(default)]
    contents: Vec<ManifestNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ManifestNode {
    File {
        name: String,
        size: u64,
        object: String,
        digest: String,
    },
    Directory {
        name: String,
        #[serde(default)]
        contents: Vec<ManifestNode>,
    },
}

impl ManifestNode {
    fn name(&self) -> &str {
        match self {
            Self::File { name, .. } | Self::Directory { name, .. } => name,
        }
    }

    fn kind_label(&self) -> &'static str {
        match self {
            Self::File { .. } => "file",
            Self::Directory { .. } => "directory",
        }
    }

    fn to_entry(&self) -> ContentEntry {
        match self {
            Self::File { name, size, .. } => ContentEntry::file(name.as_str(), *size),
            Self::Directory { name, contents } => ContentEntry::directory(
                name.as_str(),
                contents.iter().map(ManifestNode::to_entry).collect(),
            ),
        }
    }
}

/// Content-addressed dataset store on the local filesystem.
pub struct ObjectStore {
    root: PathBuf,
    scan_config: ScanConfig,
    pending_hashes: Mutex<HashMap<String, (String, String)>>,
    next_request: AtomicU64,
}

impl ObjectStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ServiceError> {
        let root = root.into();
        for dir in [root.join("objects"), root.join("datasets")] {
            fs::create_dir_all(&dir).map_err(|e| ServiceError::io(&dir, e))?;
        }
        Ok(Self {
            root,
            scan_config: ScanConfig::default(),
            pending_hashes: Mutex::new(HashMap::new()),
            next_request: AtomicU64::new(1),
        })
    }

    /// Walk uploaded directories with `config`.
    ///
    /// Use the configuration the diff scans with, so that whole-directory
    /// uploads and later diffs see the same tree.
    pub fn with_scan_config(mut self, config: ScanConfig) -> Self {
        self.scan_config = config;
        self
    }

    /// Store root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create an empty dataset, making it visible to listings.
    pub fn create_dataset(&self, dataset_id: &str) -> Result<(), ServiceError> {
        validate_id(dataset_id)?;
        if self.manifest_path(dataset_id).exists() {
            return Err(ServiceError::Conflict(format!("dataset {dataset_id}")));
        }
        self.save(&Manifest {
            id: dataset_id.to_string(),
            contents: Vec::new(),
        })?;
        info!(dataset_id, "dataset created");
        Ok(())
    }

    /// Identifiers of all datasets in the store, sorted.
    pub fn datasets(&self) -> Result<Vec<String>, ServiceError> {
        let dir = self.root.join("datasets");
        let mut ids = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| ServiceError::io(&dir, e))? {
            let path = entry.map_err(|e| ServiceError::io(&dir, e))?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem() {
                    ids.push(stem.to_string_lossy().to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Location of the object holding a stored file.
    pub fn object_path(&self, object: &str) -> PathBuf {
        self.root.join("objects").join(object)
    }

    fn manifest_path(&self, dataset_id: &str) -> PathBuf {
        self.root.join("datasets").join(format!("{dataset_id}.json"))
    }

    fn load(&self, dataset_id: &str) -> Result<Option<Manifest>, ServiceError> {
        validate_id(dataset_id)?;
        let path = self.manifest_path(dataset_id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ServiceError::io(&path, e)),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn load_existing(&self, dataset_id: &str) -> Result<Manifest, ServiceError> {
        self.load(dataset_id)?
            .ok_or_else(|| ServiceError::NotFound(format!("dataset {dataset_id}")))
    }

    fn save(&self, manifest: &Manifest) -> Result<(), ServiceError> {
        let path = self.manifest_path(&manifest.id);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(manifest)?;
        fs::write(&tmp, bytes).map_err(|e| ServiceError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| ServiceError::io(&path, e))
    }

    /// Copy a local file into the object area, returning its file node.
    ///
    /// Bytes are staged in a temporary file while hashing and renamed into
    /// place, so an object name always matches the bytes it holds.
    fn store_file(&self, local_path: &Path, name: &str) -> Result<ManifestNode, ServiceError> {
        let mut file = File::open(local_path).map_err(|e| ServiceError::io(local_path, e))?;
        let objects = self.root.join("objects");
        let mut staged =
            NamedTempFile::new_in(&objects).map_err(|e| ServiceError::io(&objects, e))?;
        let mut blake = blake3::Hasher::new();
        let mut sha = Sha256::new();
        let mut buffer = vec![0u8; HASH_BUFFER_SIZE];
        let mut size = 0u64;

        loop {
            let read = file
                .read(&mut buffer)
                .map_err(|e| ServiceError::io(local_path, e))?;
            if read == 0 {
                break;
            }
            blake.update(&buffer[..read]);
            sha.update(&buffer[..read]);
            staged
                .write_all(&buffer[..read])
                .map_err(|e| ServiceError::io(staged.path(), e))?;
            size += read as u64;
        }

        let object = blake.finalize().to_hex().to_string();
        let object_path = self.object_path(&object);
        let stored_len = fs::metadata(&object_path).map(|m| m.len()).ok();
        if stored_len == Some(size) {
            debug!(object = %object, "object already stored");
        } else {
            if stored_len.is_some() {
                warn!(object = %object, "replacing damaged object");
            }
            staged
                .as_file()
                .sync_all()
                .map_err(|e| ServiceError::io(staged.path(), e))?;
            staged
                .persist(&object_path)
                .map_err(|e| ServiceError::io(&object_path, e.error))?;
        }

        Ok(ManifestNode::File {
            name: name.to_string(),
            size,
            object,
            digest: format!("sha2:{}", STANDARD.encode(sha.finalize())),
        })
    }

    /// Store every readable file below `local_path` as a directory node.
    fn store_tree(&self, local_path: &Path, name: &str) -> Result<ManifestNode, ServiceError> {
        let tree = TreeScanner::with_config(self.scan_config.clone())
            .scan(local_path)
            .map_err(|e| ServiceError::io(local_path, std::io::Error::other(e)))?;
        self.store_entry(&tree.root, &tree.root_path, name)
    }

    fn store_entry(
        &self,
        entry: &ContentEntry,
        path: &Path,
        name: &str,
    ) -> Result<ManifestNode, ServiceError> {
        let mut contents = Vec::with_capacity(entry.children.len());
        for child in &entry.children {
            let child_path = path.join(child.name.as_str());
            match child.kind {
                EntryKind::File => contents.push(self.store_file(&child_path, &child.name)?),
                EntryKind::Directory => {
                    contents.push(self.store_entry(child, &child_path, &child.name)?)
                }
                _ => warn!(path = %child_path.display(), "skipping entry that is not a file or directory"),
            }
        }
        Ok(ManifestNode::Directory {
            name: name.to_string(),
            contents,
        })
    }

    /// Look up the digest of the file at `path` (`/`-prefixed or relative).
    fn digest_of(&self, dataset_id: &str, path: &str) -> Result<String, ServiceError> {
        let manifest = self.load_existing(dataset_id)?;
        let mut nodes = &manifest.contents;
        let mut segments = path.split('/').filter(|s| !s.is_empty()).peekable();

        while let Some(segment) = segments.next() {
            let node = nodes
                .iter()
                .find(|n| n.name() == segment)
                .ok_or_else(|| ServiceError::NotFound(format!("{dataset_id}:{path}")))?;
            let last = segments.peek().is_none();
            match node {
                ManifestNode::File { digest, .. } if last => {
                    return Ok(digest.clone());
                }
                ManifestNode::Directory { contents, .. } => nodes = contents,
                ManifestNode::File { .. } => break,
            }
        }

        Err(ServiceError::NotFound(format!("{dataset_id}:{path}")))
    }
}

impl DatasetService for ObjectStore {
    fn get_contents(&self, dataset_id: &str) -> Result<Option<Listing>, ServiceError> {
        let Some(manifest) = self.load(dataset_id)? else {
            debug!(dataset_id, "dataset not in store");
            return Ok(None);
        };
        let entries: Vec<ContentEntry> =
            manifest.contents.iter().map(ManifestNode::to_entry).collect();
        Ok(Some(Listing::from_entries(&entries)))
    }

    fn put_file(
        &self,
        local_path: &Path,
        remote_dir: &str,
        dataset_id: &str,
        overwrite: bool,
    ) -> Result<(), ServiceError> {
        let name = file_name(local_path)?;
        let mut manifest = self.load_existing(dataset_id)?;
        let siblings = directory_mut(&mut manifest.contents, remote_dir)?;

        if let Some(existing) = siblings.iter().position(|n| n.name() == name) {
            if matches!(siblings[existing], ManifestNode::Directory { .. }) {
                return Err(ServiceError::Conflict(format!(
                    "{remote_dir}/{name} is a directory"
                )));
            }
            if !overwrite {
                return Err(ServiceError::Conflict(format!("{remote_dir}/{name}")));
            }
            siblings.remove(existing);
        }

        let node = self.store_file(local_path, &name)?;
        siblings.push(node);
        self.save(&manifest)?;
        debug!(dataset_id, remote_dir, name = %name, "file stored");
        Ok(())
    }

    fn put_directory(
        &self,
        local_path: &Path,
        remote_parent: &str,
        dataset_id: &str,
    ) -> Result<(), ServiceError> {
        let name = file_name(local_path)?;
        let mut manifest = self.load_existing(dataset_id)?;
        let node = self.store_tree(local_path, &name)?;
        let siblings = directory_mut(&mut manifest.contents, remote_parent)?;

        match siblings.iter_mut().find(|n| n.name() == name) {
            Some(existing) => merge_node(existing, node, &join_remote(remote_parent, &name))?,
            None => siblings.push(node),
        }

        self.save(&manifest)?;
        debug!(dataset_id, remote_parent, name = %name, "directory stored");
        Ok(())
    }
}

#[async_trait]
impl HashService for ObjectStore {
    async fn request_hash(&self, dataset_id: &str, path: &str) -> Result<String, ServiceError> {
        self.load_existing(dataset_id)?;
        let mut pending = self
            .pending_hashes
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let request_id = format!("hash-{}", self.next_request.fetch_add(1, Ordering::Relaxed));
        pending.insert(
            request_id.clone(),
            (dataset_id.to_string(), path.to_string()),
        );
        Ok(request_id)
    }

    async fn poll_hash(&self, request_id: &str) -> Result<HashPoll, ServiceError> {
        let request = self
            .pending_hashes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(request_id)
            .cloned();
        let Some((dataset_id, path)) = request else {
            return Err(ServiceError::NotFound(format!("hash request {request_id}")));
        };

        let poll = match self.digest_of(&dataset_id, &path) {
            Ok(digest) => HashPoll::Completed(digest),
            Err(ServiceError::NotFound(what)) => HashPoll::Failed(format!("no such file: {what}")),
            Err(err) => return Err(err),
        };

        // Finished requests are forgotten
        self.pending_hashes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(request_id);
        Ok(poll)
    }
}

/// Walk (creating as needed) to the directory at `path`.
fn directory_mut<'a>(
    mut nodes: &'a mut Vec<ManifestNode>,
    path: &str,
) -> Result<&'a mut Vec<ManifestNode>, ServiceError> {
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        let index = match nodes.iter().position(|n| n.name() == segment) {
            Some(index) => index,
            None => {
                nodes.push(ManifestNode::Directory {
                    name: segment.to_string(),
                    contents: Vec::new(),
                });
                nodes.len() - 1
            }
        };
        nodes = match &mut nodes[index] {
            ManifestNode::Directory { contents, .. } => contents,
            ManifestNode::File { .. } => {
                return Err(ServiceError::Conflict(format!("{path}: {segment} is a file")));
            }
        };
    }
    Ok(nodes)
}

/// Merge an uploaded tree into an existing node at `path`.
///
/// Uploaded files replace stored files. A file and a directory under the same
/// name is a conflict at any depth and leaves the dataset untouched.
fn merge_node(
    existing: &mut ManifestNode,
    incoming: ManifestNode,
    path: &str,
) -> Result<(), ServiceError> {
    match (existing, incoming) {
        (
            ManifestNode::Directory { contents, .. },
            ManifestNode::Directory {
                contents: incoming, ..
            },
        ) => {
            for node in incoming {
                let child_path = join_remote(path, node.name());
                match contents.iter_mut().find(|n| n.name() == node.name()) {
                    Some(current) => merge_node(current, node, &child_path)?,
                    None => contents.push(node),
                }
            }
            Ok(())
        }
        (existing, incoming) => {
            if existing.kind_label() != incoming.kind_label() {
                return Err(ServiceError::Conflict(format!(
                    "{path}: dataset has a {}, upload has a {}",
                    existing.kind_label(),
                    incoming.kind_label()
                )));
            }
            *existing = incoming;
            Ok(())
        }
    }
}

/// Remote name of an uploaded path: its final component as given, or the
/// canonical one for paths like `.`.
fn file_name(local_path: &Path) -> Result<String, ServiceError> {
    if let Some(name) = local_path.file_name() {
        return Ok(name.to_string_lossy().to_string());
    }
    local_path
        .canonicalize()
        .map_err(|e| ServiceError::io(local_path, e))?
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| ServiceError::NotFound(format!("{} has no name", local_path.display())))
}

fn validate_id(dataset_id: &str) -> Result<(), ServiceError> {
    let valid = !dataset_id.is_empty()
        && dataset_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !dataset_id.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(ServiceError::NotFound(format!("invalid dataset id {dataset_id:?}")))
    }
}
