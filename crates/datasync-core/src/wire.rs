//! Listing records as exchanged with the dataset service.
//!
//! Remote records are loosely shaped: names can be missing and sizes arrive as
//! integers, numeric strings, negatives or not at all. Parsing validates each
//! record and turns anything unusable into [`EntrySize::Unknown`] rather than a
//! sentinel number.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::entry::{ContentEntry, EntryKind, EntrySize};

/// One record of a content listing, as found on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Entry name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Entry type (`file`, `directory`, `other`, `broken_link`, `error`).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Size as reported, kept raw until validated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Value>,

    /// Children of a directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<Vec<RemoteRecord>>,

    /// Message for inaccessible entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Response of a dataset content listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    /// Entries at the dataset root. A missing key means an empty dataset.
    #[serde(default)]
    pub contents: Vec<RemoteRecord>,
}

impl Listing {
    /// Build a listing from content entries.
    pub fn from_entries(entries: &[ContentEntry]) -> Self {
        Self {
            contents: entries.iter().map(RemoteRecord::from).collect(),
        }
    }

    /// Validate the records into content entries.
    pub fn into_entries(self) -> Vec<ContentEntry> {
        records_to_entries(&self.contents, "")
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListingDocument {
    Bare(Vec<RemoteRecord>),
    Wrapped(Listing),
}

/// Parse a listing document, either `{"contents": [...]}` or a bare array.
pub fn parse_listing(json: &str) -> Result<Vec<ContentEntry>, serde_json::Error> {
    let records = match serde_json::from_str::<ListingDocument>(json)? {
        ListingDocument::Bare(records) => records,
        ListingDocument::Wrapped(listing) => listing.contents,
    };
    Ok(records_to_entries(&records, ""))
}

/// Interpret a raw size value.
///
/// Non-negative integers and numeric strings are known sizes; fractional
/// values are truncated. Everything else is unknown.
pub fn parse_size(raw: Option<&Value>) -> EntrySize {
    match raw {
        Some(Value::Number(n)) => {
            if let Some(bytes) = n.as_u64() {
                EntrySize::Known(bytes)
            } else if let Some(f) = n.as_f64().filter(|f| f.is_finite() && *f >= 0.0) {
                EntrySize::Known(f as u64)
            } else {
                EntrySize::Unknown
            }
        }
        Some(Value::String(s)) => match s.trim().parse::<i64>() {
            Ok(bytes) if bytes >= 0 => EntrySize::Known(bytes as u64),
            _ => EntrySize::Unknown,
        },
        _ => EntrySize::Unknown,
    }
}

/// Validate a sequence of records found under `parent`.
pub fn records_to_entries(records: &[RemoteRecord], parent: &str) -> Vec<ContentEntry> {
    records
        .iter()
        .filter_map(|record| record_to_entry(record, parent))
        .collect()
}

fn record_to_entry(record: &RemoteRecord, parent: &str) -> Option<ContentEntry> {
    let Some(name) = record.name.as_deref().filter(|n| !n.is_empty()) else {
        warn!(parent, "dropping listing record without a name");
        return None;
    };

    let size = parse_size(record.size.as_ref());
    if !size.is_known() && record.size.is_some() {
        warn!(parent, name, raw = ?record.size, "listing record has an unusable size");
    }

    let entry = match record.kind.as_deref() {
        Some("file") => ContentEntry::file(name, size),
        Some("directory") => {
            let path = join_remote(parent, name);
            let children = record
                .contents
                .as_deref()
                .map(|children| records_to_entries(children, &path))
                .unwrap_or_default();
            ContentEntry::directory_with_size(name, size, children)
        }
        Some("broken_link") | Some("error") => ContentEntry::error(
            name,
            record
                .error_message
                .clone()
                .unwrap_or_else(|| "entry could not be accessed".to_string()),
        ),
        _ => ContentEntry::other(name, size),
    };

    Some(entry)
}

impl From<&ContentEntry> for RemoteRecord {
    fn from(entry: &ContentEntry) -> Self {
        let contents = entry
            .is_dir()
            .then(|| entry.children.iter().map(RemoteRecord::from).collect());
        let error_message = match &entry.kind {
            EntryKind::Error { message } => Some(message.clone()),
            _ => None,
        };

        Self {
            name: Some(entry.name.to_string()),
            kind: Some(entry.kind.label().to_string()),
            size: entry.size.known().map(Value::from),
            contents,
            error_message,
        }
    }
}

/// Join a remote parent path and a name with `/`.
pub fn join_remote(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent.trim_end_matches('/'), name)
    }
}

/// Parent directory of a remote path (empty at the dataset root).
pub fn remote_parent(path: &str) -> &str {
    path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}
