//! Parsing of remote source spec strings.
//!
//! Two forms are accepted:
//!
//! - SSH: `user@host[:port] [password=P] [private_key=K] /path/or/pattern`
//! - Container: `container_id /path/or/pattern`
//!
//! Tokens are whitespace separated. In the SSH form any token that does not
//! start with `password=` or `private_key=` is taken as the path, so when
//! several bare tokens are present the last one wins.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default SSH port.
pub const DEFAULT_SSH_PORT: u16 = 22;

const PASSWORD_PREFIX: &str = "password=";
const PRIVATE_KEY_PREFIX: &str = "private_key=";

/// Errors that can occur while parsing a spec string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    #[error("malformed source spec `{spec}`: {reason}")]
    Malformed { spec: String, reason: String },
}

impl SpecError {
    fn malformed(spec: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            spec: spec.to_string(),
            reason: reason.into(),
        }
    }
}

/// Connection parameters for one SSH source.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteDescriptor {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub private_key_path: Option<PathBuf>,
}

impl RemoteDescriptor {
    /// `host:port` address suitable for a TCP connect.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// Passwords never reach logs.
impl std::fmt::Debug for RemoteDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteDescriptor")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("private_key_path", &self.private_key_path)
            .finish()
    }
}

impl std::fmt::Display for RemoteDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}:{}", self.user, self.host, self.port)
    }
}

/// A parsed SSH spec: where to connect and which path/pattern to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshPathSpec {
    pub descriptor: RemoteDescriptor,
    pub file_path: String,
}

/// A parsed container spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerPathSpec {
    pub container_id: String,
    pub file_path: String,
}

/// Any parsed source spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    Ssh(SshPathSpec),
    Container(ContainerPathSpec),
}

/// Default private key, `<home>/.ssh/id_rsa`.
pub fn default_private_key_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".ssh").join("id_rsa"))
}

/// Parse `user@host[:port] [password=P] [private_key=K] /path`.
pub fn parse_ssh_spec(spec: &str) -> Result<SshPathSpec, SpecError> {
    let parts: Vec<&str> = spec.split_whitespace().collect();
    if parts.len() < 2 {
        return Err(SpecError::malformed(
            spec,
            "expected `user@host[:port] [options] /path`",
        ));
    }

    let user_host: Vec<&str> = parts[0].split('@').collect();
    if user_host.len() != 2 {
        return Err(SpecError::malformed(
            spec,
            "user@host[:port] part does not have the correct format",
        ));
    }

    let host_port: Vec<&str> = user_host[1].split(':').collect();
    let host = host_port[0];
    if user_host[0].is_empty() || host.is_empty() {
        return Err(SpecError::malformed(spec, "user and host must not be empty"));
    }
    let port = if host_port.len() == 2 {
        host_port[1]
            .parse::<u16>()
            .map_err(|_| SpecError::malformed(spec, format!("invalid port `{}`", host_port[1])))?
    } else {
        DEFAULT_SSH_PORT
    };

    let mut password = None;
    let mut private_key_path = default_private_key_path();
    let mut file_path: Option<&str> = None;

    for part in &parts[1..] {
        if let Some(pw) = part.strip_prefix(PASSWORD_PREFIX) {
            password = Some(pw.to_string());
        } else if let Some(key) = part.strip_prefix(PRIVATE_KEY_PREFIX) {
            private_key_path = Some(PathBuf::from(key));
        } else {
            file_path = Some(part);
        }
    }

    let file_path = file_path.ok_or_else(|| SpecError::malformed(spec, "file path is missing"))?;

    Ok(SshPathSpec {
        descriptor: RemoteDescriptor {
            host: host.to_string(),
            port,
            user: user_host[0].to_string(),
            password,
            private_key_path,
        },
        file_path: file_path.to_string(),
    })
}

/// Parse `container_id /path`.
pub fn parse_container_spec(spec: &str) -> Result<ContainerPathSpec, SpecError> {
    let parts: Vec<&str> = spec.split_whitespace().collect();
    if parts.len() < 2 {
        return Err(SpecError::malformed(spec, "expected `container_id /path`"));
    }
    Ok(ContainerPathSpec {
        container_id: parts[0].to_string(),
        file_path: parts[1].to_string(),
    })
}
