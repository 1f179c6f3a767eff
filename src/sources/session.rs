//! Remote session management over SSH.
//!
//! Each public operation opens a fresh session, authenticates, runs exactly
//! one read-only command and disconnects before returning:
//!
//! - [`read_file`] runs `cat <path>` and streams stdout into a new
//!   [`MaterializedFile`].
//! - [`list_files`] runs `ls <pattern>` and splits stdout into paths.
//!
//! Sessions are not pooled. Every blocking libssh2 call is bounded by
//! [`SessionOptions::timeout`].
//!
//! # Host keys
//!
//! With [`HostKeyPolicy::Ignore`] (the default) the server key is accepted
//! without any check. This is logged once per host at warn level. Use
//! [`HostKeyPolicy::KnownHosts`] to verify against an OpenSSH known_hosts file.

use std::collections::HashSet;
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use ssh2::{CheckResult, KnownHostFileKind, Session};
use thiserror::Error;

use super::spec::RemoteDescriptor;
use crate::tempfiles::MaterializedFile;

/// Default timeout for connect and every remote command.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(30);

static UNVERIFIED_HOSTS: Lazy<Mutex<HashSet<String>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Errors that can occur while talking to a remote host.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("failed to connect to {address}: {source}")]
    Connection {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("SSH protocol error during {context}: {source}")]
    Protocol {
        context: &'static str,
        #[source]
        source: ssh2::Error,
    },

    #[error("authentication failed for {user}@{host}: {reason}")]
    Authentication {
        user: String,
        host: String,
        reason: String,
    },

    #[error("private key {path} is unusable: {reason}")]
    KeyFile { path: PathBuf, reason: String },

    #[error("host key verification failed for {host}: {reason}")]
    HostKey { host: String, reason: String },

    #[error("remote command `{command}` exited with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("I/O error during remote operation: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    /// Connection-level failures (unreachable host, bad credentials, key mismatch).
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::Authentication { .. }
                | Self::KeyFile { .. }
                | Self::HostKey { .. }
        )
    }
}

/// Host key verification policy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HostKeyPolicy {
    /// Accept any host key.
    #[default]
    Ignore,
    /// Verify against a known_hosts file (`~/.ssh/known_hosts` when `None`).
    KnownHosts(Option<PathBuf>),
}

/// Options shared by every session opened during one refresh.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub timeout: Duration,
    pub host_key_policy: HostKeyPolicy,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_SESSION_TIMEOUT,
            host_key_policy: HostKeyPolicy::Ignore,
        }
    }
}

/// An authenticated SSH session.
pub struct RemoteSession {
    session: Session,
    descriptor: RemoteDescriptor,
}

impl RemoteSession {
    /// Connect, verify the host key per policy and authenticate.
    pub fn connect(
        descriptor: &RemoteDescriptor,
        options: &SessionOptions,
    ) -> Result<Self, SessionError> {
        let start = Instant::now();
        let address = descriptor.address();
        let plan = auth_plan(descriptor)?;

        let socket_addr = (descriptor.host.as_str(), descriptor.port)
            .to_socket_addrs()
            .and_then(|mut addrs| {
                addrs.next().ok_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::NotFound, "no address resolved")
                })
            })
            .map_err(|source| SessionError::Connection {
                address: address.clone(),
                source,
            })?;

        let tcp = TcpStream::connect_timeout(&socket_addr, options.timeout).map_err(|source| {
            SessionError::Connection {
                address: address.clone(),
                source,
            }
        })?;

        let mut session = Session::new().map_err(|source| SessionError::Protocol {
            context: "session init",
            source,
        })?;
        session.set_tcp_stream(tcp);
        session.set_timeout(timeout_millis(options.timeout));
        session.handshake().map_err(|source| SessionError::Protocol {
            context: "handshake",
            source,
        })?;

        verify_host_key(&session, descriptor, &options.host_key_policy)?;
        authenticate(&session, descriptor, plan)?;

        tracing::debug!(
            remote = %descriptor,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "ssh session established"
        );

        Ok(Self {
            session,
            descriptor: descriptor.clone(),
        })
    }

    /// Run one command, copying its stdout into `stdout`.
    pub fn exec(&self, command: &str, stdout: &mut dyn Write) -> Result<u64, SessionError> {
        let mut channel = self
            .session
            .channel_session()
            .map_err(|source| SessionError::Protocol {
                context: "channel open",
                source,
            })?;
        channel
            .exec(command)
            .map_err(|source| SessionError::Protocol {
                context: "exec",
                source,
            })?;

        let copied = std::io::copy(&mut channel, stdout)?;

        let mut stderr = String::new();
        // stderr is informational only; a read failure must not mask the exit status
        let _ = channel.stderr().read_to_string(&mut stderr);

        channel
            .wait_close()
            .map_err(|source| SessionError::Protocol {
                context: "channel close",
                source,
            })?;
        let status = channel
            .exit_status()
            .map_err(|source| SessionError::Protocol {
                context: "exit status",
                source,
            })?;

        if status != 0 {
            return Err(SessionError::CommandFailed {
                command: command.to_string(),
                status,
                stderr: stderr.trim().to_string(),
            });
        }

        tracing::trace!(remote = %self.descriptor, command, bytes = copied, "remote command done");
        Ok(copied)
    }

    /// Disconnect politely.
    pub fn close(self) {
        if let Err(e) = self.session.disconnect(None, "logscout done", None) {
            tracing::debug!(remote = %self.descriptor, "ssh disconnect failed: {e}");
        }
    }
}

/// Read a remote file into a fresh local temp file.
pub fn read_file(
    descriptor: &RemoteDescriptor,
    options: &SessionOptions,
    path: &str,
) -> Result<MaterializedFile, SessionError> {
    let session = RemoteSession::connect(descriptor, options)?;
    let mut file = MaterializedFile::new()?;
    let command = cat_command(path);
    let result = session.exec(&command, file.writer());
    session.close();
    result?;
    Ok(file)
}

/// List remote files matching `pattern` (expanded by the remote shell).
pub fn list_files(
    descriptor: &RemoteDescriptor,
    options: &SessionOptions,
    pattern: &str,
) -> Result<Vec<String>, SessionError> {
    let session = RemoteSession::connect(descriptor, options)?;
    let mut buf: Vec<u8> = Vec::new();
    let command = format!("ls {pattern}");
    let result = session.exec(&command, &mut buf);
    session.close();
    result?;
    Ok(split_listing(&String::from_utf8_lossy(&buf)))
}

/// `cat` with the path quoted so it is never re-interpreted by the remote shell.
pub(crate) fn cat_command(path: &str) -> String {
    format!("cat {}", shell_words::quote(path))
}

/// Split `ls` output into one path per non-empty line.
pub(crate) fn split_listing(output: &str) -> Vec<String> {
    output
        .trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn timeout_millis(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX)
}

/// One credential attempt against the server, in the order they are tried.
#[derive(Debug, Clone, PartialEq, Eq)]
enum AuthStep {
    Password,
    PublicKey(PathBuf),
}

/// Credential attempts for a descriptor plus notes on anything skipped.
#[derive(Debug, Default)]
struct AuthPlan {
    steps: Vec<AuthStep>,
    skipped: Vec<String>,
}

/// Decide which credentials to try before any socket is opened.
///
/// The password goes first; the key is only tried if the session is still
/// unauthenticated. A missing key file is fatal when there is no password
/// to fall back on.
fn auth_plan(descriptor: &RemoteDescriptor) -> Result<AuthPlan, SessionError> {
    let mut plan = AuthPlan::default();

    if descriptor.password.is_some() {
        plan.steps.push(AuthStep::Password);
    }

    if let Some(key) = &descriptor.private_key_path {
        if key.exists() {
            plan.steps.push(AuthStep::PublicKey(key.clone()));
        } else if descriptor.password.is_none() {
            return Err(SessionError::KeyFile {
                path: key.clone(),
                reason: "file not found".to_string(),
            });
        } else {
            plan.skipped.push(format!("key {} not found", key.display()));
        }
    }

    if plan.steps.is_empty() {
        return Err(SessionError::Authentication {
            user: descriptor.user.clone(),
            host: descriptor.host.clone(),
            reason: "no password or private key configured".to_string(),
        });
    }
    Ok(plan)
}

fn authenticate(
    session: &Session,
    descriptor: &RemoteDescriptor,
    plan: AuthPlan,
) -> Result<(), SessionError> {
    let mut failures = plan.skipped;

    for step in &plan.steps {
        if session.authenticated() {
            break;
        }
        let result = match step {
            AuthStep::Password => match &descriptor.password {
                Some(password) => session.userauth_password(&descriptor.user, password),
                None => continue,
            },
            AuthStep::PublicKey(key) => {
                session.userauth_pubkey_file(&descriptor.user, None, key, None)
            }
        };
        if let Err(e) = result {
            failures.push(match step {
                AuthStep::Password => format!("password: {e}"),
                AuthStep::PublicKey(key) => format!("key {}: {e}", key.display()),
            });
        }
    }

    if session.authenticated() {
        return Ok(());
    }
    Err(SessionError::Authentication {
        user: descriptor.user.clone(),
        host: descriptor.host.clone(),
        reason: failures.join("; "),
    })
}

fn verify_host_key(
    session: &Session,
    descriptor: &RemoteDescriptor,
    policy: &HostKeyPolicy,
) -> Result<(), SessionError> {
    let known_hosts_file = match policy {
        HostKeyPolicy::Ignore => {
            if UNVERIFIED_HOSTS.lock().insert(descriptor.address()) {
                tracing::warn!(
                    remote = %descriptor,
                    "host key verification disabled; accepting any key"
                );
            }
            return Ok(());
        }
        HostKeyPolicy::KnownHosts(Some(path)) => path.clone(),
        HostKeyPolicy::KnownHosts(None) => default_known_hosts().ok_or_else(|| {
            SessionError::HostKey {
                host: descriptor.host.clone(),
                reason: "cannot locate ~/.ssh/known_hosts".to_string(),
            }
        })?,
    };

    let host_key_error = |reason: String| SessionError::HostKey {
        host: descriptor.host.clone(),
        reason,
    };

    let (key, _key_type) = session
        .host_key()
        .ok_or_else(|| host_key_error("server sent no host key".to_string()))?;

    let mut known_hosts = session
        .known_hosts()
        .map_err(|e| host_key_error(format!("known_hosts init: {e}")))?;
    known_hosts
        .read_file(&known_hosts_file, KnownHostFileKind::OpenSSH)
        .map_err(|e| host_key_error(format!("reading {}: {e}", known_hosts_file.display())))?;

    match known_hosts.check_port(&descriptor.host, descriptor.port, key) {
        CheckResult::Match => Ok(()),
        CheckResult::NotFound => Err(host_key_error(format!(
            "host not present in {}",
            known_hosts_file.display()
        ))),
        CheckResult::Mismatch => Err(host_key_error("host key mismatch".to_string())),
        CheckResult::Failure => Err(host_key_error("known_hosts check failed".to_string())),
    }
}

fn default_known_hosts() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".ssh").join("known_hosts"))
}
