//! Candidate discovery and inspection.
//!
//! A [`Transport`] knows how to expand a pattern into candidate paths and how
//! to open one candidate as a local, seekable file. Everything downstream
//! ([`probe`], [`stats`]) works on an [`OpenedFile`] and never cares whether
//! the bytes came from disk, an SSH session or a container.

pub mod compression;
pub mod local;
pub mod probe;
pub mod remote;
pub mod stats;

use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::Path;

use thiserror::Error;

use crate::sources::provenance::Origin;
use crate::sources::session::SessionError;
use crate::tempfiles::MaterializedFile;

pub use local::LocalTransport;
pub use probe::{is_readable_file, probe};
pub use remote::{DockerTransport, SshTransport};
pub use stats::{file_stats, stats};

/// Errors that can occur while expanding, probing or measuring candidates.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("failed to expand pattern `{pattern}`: {reason}")]
    PatternExpansion { pattern: String, reason: String },

    #[error("failed to probe {path}: {source}")]
    Probe {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to compute stats for {path}: {source}")]
    Stats {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ScanError {
    pub fn expansion(pattern: &str, reason: impl std::fmt::Display) -> Self {
        Self::PatternExpansion {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A candidate opened for reading.
///
/// Remote candidates keep their temp file alive for as long as this value
/// lives; dropping it deletes the local copy.
#[derive(Debug)]
pub struct OpenedFile {
    file: File,
    size: u64,
    _materialized: Option<MaterializedFile>,
}

impl OpenedFile {
    /// Open a local file.
    pub fn local(path: &Path) -> std::io::Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            file,
            size,
            _materialized: None,
        })
    }

    /// Take ownership of remote content already copied into a temp file.
    pub fn materialized(mut materialized: MaterializedFile) -> std::io::Result<Self> {
        let file = materialized.reopen()?;
        let size = file.metadata()?.len();
        Ok(Self {
            file,
            size,
            _materialized: Some(materialized),
        })
    }

    /// Size in bytes as stored by the transport.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Seek back to the first byte.
    pub fn rewind(&mut self) -> std::io::Result<()> {
        self.file.seek(SeekFrom::Start(0)).map(|_| ())
    }

    pub(crate) fn reader(&mut self) -> &mut File {
        &mut self.file
    }
}

/// How candidates are listed and read for one kind of source.
pub trait Transport: Send + Sync {
    /// Provenance stamped on every file from this transport.
    fn origin(&self) -> Origin;

    /// Human-readable label for logs.
    fn label(&self) -> String;

    /// Expand a path, directory or glob into candidate paths.
    fn expand(&self, pattern: &str) -> Result<Vec<String>, ScanError>;

    /// Open one candidate for local reading.
    fn open(&self, path: &str) -> Result<OpenedFile, ScanError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tempfiles;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use serial_test::serial;
    use std::io::{Read, Write};

    fn gzip(content: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(content).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_opened_file_local_size_and_rewind() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(&path, b"one\ntwo\n").unwrap();

        let mut opened = OpenedFile::local(&path).unwrap();
        assert_eq!(opened.size(), 8);

        let mut first = String::new();
        opened.reader().read_to_string(&mut first).unwrap();
        opened.rewind().unwrap();
        let mut second = String::new();
        opened.reader().read_to_string(&mut second).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    #[serial(tempfiles)]
    fn test_materialized_matches_local_and_is_removed_on_drop() {
        let content: String = (0..300).map(|i| format!("line {i}\n")).collect();
        let dir = tempfile::TempDir::new().unwrap();

        for (name, bytes) in [
            ("plain.log", content.clone().into_bytes()),
            ("rotated.log.gz", gzip(content.as_bytes())),
        ] {
            let local_path = dir.path().join(name);
            std::fs::write(&local_path, &bytes).unwrap();
            let mut local = OpenedFile::local(&local_path).unwrap();
            assert!(probe(&mut local, true).unwrap());
            let expected = stats(&mut local).unwrap();
            assert_eq!(expected.0, 300);

            let mut copy = tempfiles::MaterializedFile::new().unwrap();
            copy.writer().write_all(&bytes).unwrap();
            let temp_path = copy.path().to_path_buf();

            let mut remote = OpenedFile::materialized(copy).unwrap();
            assert!(tempfiles::outstanding().contains(&temp_path));
            assert_eq!(remote.size(), bytes.len() as u64);
            assert!(probe(&mut remote, true).unwrap());
            assert_eq!(stats(&mut remote).unwrap(), expected, "{name}");

            drop(remote);
            assert!(!tempfiles::outstanding().contains(&temp_path));
            assert!(!temp_path.exists());
        }
    }

    #[test]
    fn test_expansion_error_message() {
        let err = ScanError::expansion("/var/log/[", "unclosed bracket");
        assert_eq!(
            err.to_string(),
            "failed to expand pattern `/var/log/[`: unclosed bracket"
        );
    }
}
