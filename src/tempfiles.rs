//! Tracking of temporary files created by logscout.
//!
//! Remote content is materialized into local temp files that live only for
//! one read. They remove themselves on drop, but a process killed mid-read
//! would leak them, so every live path is recorded here and the shutdown
//! hook calls [`cleanup`].

use std::collections::HashSet;
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tempfile::NamedTempFile;

static OUTSTANDING: Lazy<Mutex<HashSet<PathBuf>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Prefix for every temp file logscout creates.
pub const TEMP_PREFIX: &str = "logscout-";

/// Register a path for removal at shutdown.
pub fn track(path: &Path) {
    OUTSTANDING.lock().insert(path.to_path_buf());
}

/// Forget a path (it was removed by its owner).
pub fn untrack(path: &Path) {
    OUTSTANDING.lock().remove(path);
}

/// Paths of temp files still alive.
pub fn outstanding() -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = OUTSTANDING.lock().iter().cloned().collect();
    paths.sort();
    paths
}

/// Remove every outstanding temp file. Returns the number removed.
pub fn cleanup() -> usize {
    let paths: Vec<PathBuf> = OUTSTANDING.lock().drain().collect();
    let mut removed = 0;
    for path in paths {
        match std::fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path.display(), "failed to remove temp file: {e}"),
        }
    }
    if removed > 0 {
        tracing::info!(removed, "removed outstanding temp files");
    }
    removed
}

/// A local copy of remote content, deleted when dropped.
#[derive(Debug)]
pub struct MaterializedFile {
    inner: NamedTempFile,
}

impl MaterializedFile {
    /// Create an empty tracked temp file.
    pub fn new() -> std::io::Result<Self> {
        let inner = tempfile::Builder::new()
            .prefix(&format!("{TEMP_PREFIX}remote-"))
            .tempfile()?;
        track(inner.path());
        Ok(Self { inner })
    }

    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Writer positioned wherever the last write left off.
    pub fn writer(&mut self) -> &mut File {
        self.inner.as_file_mut()
    }

    /// Flush and reopen for reading from the start.
    pub fn reopen(&mut self) -> std::io::Result<File> {
        self.inner.as_file_mut().flush()?;
        let mut file = self.inner.reopen()?;
        file.seek(SeekFrom::Start(0))?;
        Ok(file)
    }
}

impl Drop for MaterializedFile {
    fn drop(&mut self) {
        untrack(self.inner.path());
    }
}
