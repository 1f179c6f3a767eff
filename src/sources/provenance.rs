//! Provenance types for tracking where a discovered log file comes from.
//!
//! Every [`crate::model::FileInfo`] carries a [`SourceKind`] plus a host label.
//! Together with the path they form the identity of a registry entry.
//!
//! # Example
//!
//! ```rust
//! use logscout::sources::provenance::{Origin, SourceKind};
//!
//! let local = Origin::local();
//! assert_eq!(local.kind, SourceKind::File);
//! assert!(local.host.is_empty());
//!
//! let remote = Origin::ssh("example.com");
//! assert_eq!(remote.kind, SourceKind::Ssh);
//! assert_eq!(remote.host, "example.com");
//! ```

use serde::{Deserialize, Serialize};

/// The kind of transport a log file was discovered through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Local filesystem path (default).
    #[default]
    File,
    /// Remote host reached over SSH.
    Ssh,
    /// File inside a container, read through `docker exec`.
    Docker,
    /// The captured standard-input pipe.
    Stdin,
}

impl SourceKind {
    /// Get the string representation used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Ssh => "ssh",
            Self::Docker => "docker",
            Self::Stdin => "stdin",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Provenance attached to every file produced by one transport.
///
/// `host` is empty for everything except SSH sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Origin {
    pub kind: SourceKind,
    pub host: String,
}

impl Origin {
    /// Origin for files on the local filesystem.
    pub fn local() -> Self {
        Self {
            kind: SourceKind::File,
            host: String::new(),
        }
    }

    /// Origin for files read over SSH from `host`.
    pub fn ssh(host: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Ssh,
            host: host.into(),
        }
    }

    /// Origin for files read out of a container.
    pub fn docker() -> Self {
        Self {
            kind: SourceKind::Docker,
            host: String::new(),
        }
    }

    /// Origin for the captured stdin file.
    pub fn stdin() -> Self {
        Self {
            kind: SourceKind::Stdin,
            host: String::new(),
        }
    }
}

impl Default for Origin {
    fn default() -> Self {
        Self::local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_default() {
        assert_eq!(SourceKind::default(), SourceKind::File);
    }

    #[test]
    fn test_source_kind_serialization() {
        let json = serde_json::to_string(&SourceKind::Ssh).unwrap();
        assert_eq!(json, "\"ssh\"");

        let parsed: SourceKind = serde_json::from_str("\"stdin\"").unwrap();
        assert_eq!(parsed, SourceKind::Stdin);
    }

    #[test]
    fn test_origin_constructors() {
        assert_eq!(Origin::default(), Origin::local());
        assert_eq!(Origin::docker().kind, SourceKind::Docker);
        assert!(Origin::docker().host.is_empty());
        assert_eq!(Origin::stdin().kind, SourceKind::Stdin);

        let ssh = Origin::ssh("box");
        assert_eq!(ssh.kind, SourceKind::Ssh);
        assert_eq!(ssh.host, "box");
    }
}
