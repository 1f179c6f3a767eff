//! Registry entity structs.

use serde::{Deserialize, Serialize};

use crate::sources::provenance::{Origin, SourceKind};

/// One discovered, classified log file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileInfo {
    pub file_path: String,
    pub lines_count: u64,
    /// Size as reported by the transport (compressed size for gzip files).
    pub file_size: u64,
    #[serde(rename = "type")]
    pub kind: SourceKind,
    /// Remote host for SSH entries, empty otherwise.
    #[serde(default)]
    pub host: String,
}

/// Identity of a registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileKey {
    pub file_path: String,
    pub kind: SourceKind,
    pub host: String,
}

impl FileInfo {
    pub fn new(file_path: impl Into<String>, lines_count: u64, file_size: u64, origin: &Origin) -> Self {
        Self {
            file_path: file_path.into(),
            lines_count,
            file_size,
            kind: origin.kind,
            host: origin.host.clone(),
        }
    }

    pub fn key(&self) -> FileKey {
        FileKey {
            file_path: self.file_path.clone(),
            kind: self.kind,
            host: self.host.clone(),
        }
    }
}
