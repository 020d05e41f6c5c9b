//! Content entries shared by local scans and remote listings.

use std::fmt;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Byte size of an entry.
///
/// `Unknown` is kept distinct from `Known(0)`: a remote listing that omits or
/// garbles a size must never be read as an empty file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySize {
    /// Size reported in bytes.
    Known(u64),
    /// Size missing, negative or otherwise unusable.
    #[default]
    Unknown,
}

impl EntrySize {
    /// Get the byte count if known.
    pub fn known(self) -> Option<u64> {
        match self {
            Self::Known(bytes) => Some(bytes),
            Self::Unknown => None,
        }
    }

    /// Check if the size is known.
    pub fn is_known(self) -> bool {
        matches!(self, Self::Known(_))
    }

    /// Byte count, counting unknown sizes as zero (for aggregation).
    pub fn known_or_zero(self) -> u64 {
        self.known().unwrap_or(0)
    }

    /// Two sizes confirm each other only when both are known and equal.
    pub fn confirms(self, other: EntrySize) -> bool {
        matches!((self, other), (Self::Known(a), Self::Known(b)) if a == b)
    }
}

impl From<u64> for EntrySize {
    fn from(bytes: u64) -> Self {
        Self::Known(bytes)
    }
}

impl fmt::Display for EntrySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(bytes) => write!(f, "{bytes}"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Type of a content entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Directory with children.
    Directory,
    /// Anything else (sockets, devices, links to non-files).
    Other,
    /// Entry that could not be accessed.
    Error {
        /// Why the entry could not be read.
        message: String,
    },
}

impl EntryKind {
    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Directory)
    }

    /// Check if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, Self::File)
    }

    /// Check if this entry failed to be read.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Compare kinds ignoring any error message.
    pub fn same_kind(&self, other: &EntryKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Short lowercase label, as used in listings.
    pub fn label(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
            Self::Other => "other",
            Self::Error { .. } => "error",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One filesystem object, either scanned locally or reported by a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEntry {
    /// Entry name (not a path). Unique among siblings.
    pub name: CompactString,

    /// Entry type.
    #[serde(flatten)]
    pub kind: EntryKind,

    /// Size in bytes (aggregate for directories).
    pub size: EntrySize,

    /// Children, only populated for directories.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ContentEntry>,
}

impl ContentEntry {
    /// Create a file entry.
    pub fn file(name: impl Into<CompactString>, size: impl Into<EntrySize>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
            size: size.into(),
            children: Vec::new(),
        }
    }

    /// Create a directory entry whose size is the sum of its children.
    pub fn directory(name: impl Into<CompactString>, children: Vec<ContentEntry>) -> Self {
        let size = EntrySize::Known(sum_known(&children));
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
            size,
            children,
        }
    }

    /// Create a directory entry with an explicitly reported size.
    pub fn directory_with_size(
        name: impl Into<CompactString>,
        size: EntrySize,
        children: Vec<ContentEntry>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
            size,
            children,
        }
    }

    /// Create an entry of another type.
    pub fn other(name: impl Into<CompactString>, size: impl Into<EntrySize>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Other,
            size: size.into(),
            children: Vec::new(),
        }
    }

    /// Create an entry for something that could not be accessed.
    pub fn error(name: impl Into<CompactString>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Error {
                message: message.into(),
            },
            size: EntrySize::Known(0),
            children: Vec::new(),
        }
    }

    /// Check if this entry is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Check if this entry is a file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Error message for entries that could not be read.
    pub fn error_message(&self) -> Option<&str> {
        match &self.kind {
            EntryKind::Error { message } => Some(message),
            _ => None,
        }
    }

    /// Look up a direct child by name.
    pub fn child(&self, name: &str) -> Option<&ContentEntry> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Number of files in this subtree (1 for a file).
    pub fn file_count(&self) -> u64 {
        match self.kind {
            EntryKind::File => 1,
            EntryKind::Directory => self.children.iter().map(ContentEntry::file_count).sum(),
            _ => 0,
        }
    }

    /// Number of entries below this one.
    pub fn descendant_count(&self) -> u64 {
        self.children
            .iter()
            .map(|c| 1 + c.descendant_count())
            .sum()
    }
}

/// Sum the known sizes of a set of entries.
pub fn sum_known(entries: &[ContentEntry]) -> u64 {
    entries.iter().map(|e| e.size.known_or_zero()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_is_not_zero() {
        assert_ne!(EntrySize::Unknown, EntrySize::Known(0));
        assert!(!EntrySize::Unknown.confirms(EntrySize::Known(0)));
        assert!(!EntrySize::Unknown.confirms(EntrySize::Unknown));
        assert!(EntrySize::Known(7).confirms(EntrySize::Known(7)));
    }

    #[test]
    fn test_directory_sums_children() {
        let dir = ContentEntry::directory(
            "dir",
            vec![
                ContentEntry::file("a", 10u64),
                ContentEntry::file("b", EntrySize::Unknown),
                ContentEntry::error("c", "denied"),
                ContentEntry::directory("sub", vec![ContentEntry::file("d", 5u64)]),
            ],
        );
        assert_eq!(dir.size, EntrySize::Known(15));
        assert_eq!(dir.file_count(), 3);
        assert_eq!(dir.descendant_count(), 5);
    }

    #[test]
    fn test_error_entry() {
        let entry = ContentEntry::error("locked", "Permission denied");
        assert!(entry.kind.is_error());
        assert_eq!(entry.size, EntrySize::Known(0));
        assert_eq!(entry.error_message(), Some("Permission denied"));
    }

    #[test]
    fn test_same_kind_ignores_message() {
        let a = EntryKind::Error {
            message: "a".into(),
        };
        let b = EntryKind::Error {
            message: "b".into(),
        };
        assert!(a.same_kind(&b));
        assert!(!EntryKind::File.same_kind(&EntryKind::Directory));
    }
}
