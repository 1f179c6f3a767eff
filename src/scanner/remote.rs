//! Transports backed by remote command execution.
//!
//! Both list with `ls <pattern>` and read with `cat <path>`; the only
//! difference is the channel the commands travel over.

use super::{OpenedFile, ScanError, Transport};
use crate::sources::container;
use crate::sources::provenance::Origin;
use crate::sources::session::{self, SessionError, SessionOptions};
use crate::sources::spec::RemoteDescriptor;
use crate::tempfiles::MaterializedFile;

fn open_materialized(
    path: &str,
    read: impl FnOnce() -> Result<MaterializedFile, SessionError>,
) -> Result<OpenedFile, ScanError> {
    let materialized = read()?;
    OpenedFile::materialized(materialized).map_err(|source| ScanError::Probe {
        path: path.to_string(),
        source,
    })
}

/// Files on a host reached over SSH.
#[derive(Debug, Clone)]
pub struct SshTransport {
    descriptor: RemoteDescriptor,
    options: SessionOptions,
}

impl SshTransport {
    pub fn new(descriptor: RemoteDescriptor, options: SessionOptions) -> Self {
        Self {
            descriptor,
            options,
        }
    }
}

impl Transport for SshTransport {
    fn origin(&self) -> Origin {
        Origin::ssh(self.descriptor.host.clone())
    }

    fn label(&self) -> String {
        format!("ssh {}", self.descriptor)
    }

    fn expand(&self, pattern: &str) -> Result<Vec<String>, ScanError> {
        Ok(session::list_files(&self.descriptor, &self.options, pattern)?)
    }

    fn open(&self, path: &str) -> Result<OpenedFile, ScanError> {
        open_materialized(path, || {
            session::read_file(&self.descriptor, &self.options, path)
        })
    }
}

/// Files inside a running container.
#[derive(Debug, Clone)]
pub struct DockerTransport {
    container_id: String,
}

impl DockerTransport {
    pub fn new(container_id: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
        }
    }
}

impl Transport for DockerTransport {
    fn origin(&self) -> Origin {
        Origin::docker()
    }

    fn label(&self) -> String {
        format!("docker {}", self.container_id)
    }

    fn expand(&self, pattern: &str) -> Result<Vec<String>, ScanError> {
        Ok(container::list_files(&self.container_id, pattern)?)
    }

    fn open(&self, path: &str) -> Result<OpenedFile, ScanError> {
        open_materialized(path, || container::read_file(&self.container_id, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::SourceKind;
    use std::net::TcpListener;
    use std::time::Duration;

    fn unreachable_transport() -> SshTransport {
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        SshTransport::new(
            RemoteDescriptor {
                host: "127.0.0.1".to_string(),
                port,
                user: "nobody".to_string(),
                password: Some("pw".to_string()),
                private_key_path: None,
            },
            SessionOptions {
                timeout: Duration::from_secs(2),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_ssh_origin_carries_host() {
        let transport = unreachable_transport();
        let origin = transport.origin();
        assert_eq!(origin.kind, SourceKind::Ssh);
        assert_eq!(origin.host, "127.0.0.1");
        assert!(transport.label().starts_with("ssh nobody@127.0.0.1:"));
    }

    #[test]
    fn test_docker_origin_has_empty_host() {
        let transport = DockerTransport::new("c0ffee");
        let origin = transport.origin();
        assert_eq!(origin.kind, SourceKind::Docker);
        assert!(origin.host.is_empty());
        assert_eq!(transport.label(), "docker c0ffee");
    }

    #[test]
    fn test_unreachable_host_surfaces_session_error() {
        let err = unreachable_transport().expand("/var/log/*.log").unwrap_err();
        match err {
            ScanError::Session(inner) => assert!(inner.is_connection_failure()),
            other => panic!("unexpected error: {other}"),
        }
    }
}
