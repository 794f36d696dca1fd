//! Directory entry types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Entry kind as reported by the storage service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Regular file
    File,
    /// Directory
    Directory,
}

impl EntryKind {
    pub fn is_directory(&self) -> bool {
        matches!(self, EntryKind::Directory)
    }
}

/// Opaque entry identifier, unique within one listing.
///
/// The service mints a fresh id per response, so ids are only meaningful
/// relative to the snapshot they came with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Client-minted id for entries synthesized without a server response.
    pub fn local() -> Self {
        Self(format!("local-{:032x}", rand::random::<u128>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A file or directory as known to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: EntryId,
    /// Unique within the parent directory
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Size in bytes (meaningful for files only)
    #[serde(default)]
    pub size: u64,
    /// Modification time, Unix epoch milliseconds (meaningful for files only)
    #[serde(rename = "lastModified", default)]
    pub modified_at: i64,
}

impl Entry {
    pub fn file(name: impl Into<String>, size: u64, modified_at: i64) -> Self {
        Self {
            id: EntryId::local(),
            name: name.into(),
            kind: EntryKind::File,
            size,
            modified_at,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            id: EntryId::local(),
            name: name.into(),
            kind: EntryKind::Directory,
            size: 0,
            modified_at: 0,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_directory(&self) -> bool {
        self.kind.is_directory()
    }

    /// Human readable size, decimal units (empty for directories).
    pub fn display_size(&self) -> String {
        if self.is_directory() {
            return String::new();
        }
        const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
        let mut size = self.size as f64;
        let mut unit = 0;
        while size > 1000.0 && unit < UNITS.len() - 1 {
            size /= 1000.0;
            unit += 1;
        }
        format!("{} {}", (size * 100.0).round() / 100.0, UNITS[unit])
    }
}

/// A file queued for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub data: Vec<u8>,
    /// Local modification time, Unix epoch milliseconds
    pub modified_at: i64,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            modified_at: 0,
        }
    }

    pub fn with_modified_at(mut self, modified_at: i64) -> Self {
        self.modified_at = modified_at;
        self
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// The entry the service would create for this file.
    pub(crate) fn to_entry(&self) -> Entry {
        Entry::file(self.name.clone(), self.size(), self.modified_at)
    }
}

/// A downloaded file body with the name the service declared for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub filename: String,
    pub data: Vec<u8>,
}
