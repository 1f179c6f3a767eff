//! Local filesystem transport.

use std::path::Path;

use walkdir::WalkDir;

use super::{OpenedFile, ScanError, Transport};
use crate::sources::provenance::Origin;

/// Reads candidates straight from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTransport;

impl LocalTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for LocalTransport {
    fn origin(&self) -> Origin {
        Origin::local()
    }

    fn label(&self) -> String {
        "local".to_string()
    }

    fn expand(&self, pattern: &str) -> Result<Vec<String>, ScanError> {
        let root = Path::new(pattern);
        if root.is_dir() {
            return walk_dir(root, pattern);
        }
        expand_glob(pattern)
    }

    fn open(&self, path: &str) -> Result<OpenedFile, ScanError> {
        OpenedFile::local(Path::new(path)).map_err(|source| ScanError::Probe {
            path: path.to_string(),
            source,
        })
    }
}

/// Every non-directory entry below `root`, in file-name order.
fn walk_dir(root: &Path, pattern: &str) -> Result<Vec<String>, ScanError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| ScanError::expansion(pattern, e))?;
        if entry.file_type().is_dir() {
            continue;
        }
        files.push(entry.path().to_string_lossy().into_owned());
    }
    Ok(files)
}

fn expand_glob(pattern: &str) -> Result<Vec<String>, ScanError> {
    let paths = glob::glob(pattern).map_err(|e| ScanError::expansion(pattern, e))?;

    let mut files = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) if path.is_dir() => {}
            Ok(path) => files.push(path.to_string_lossy().into_owned()),
            Err(e) => tracing::debug!(pattern, "skipping unreadable glob entry: {e}"),
        }
    }
    Ok(files)
}
