//! Runtime configuration.
//!
//! Values are layered: built-in defaults, then `config.toml`, then
//! `LOGSCOUT_*` environment variables, then command-line flags (applied by
//! the caller).
//!
//! ```toml
//! limit = 500
//! every = 30
//! files = ["/var/log/*.log"]
//! ssh = ["deploy@web1:22 /var/log/nginx/*.log"]
//! docker = ["c0ffee /var/log/app.log"]
//! verify_host_key = true
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sources::session::{HostKeyPolicy, SessionOptions};

pub const DEFAULT_LIMIT: usize = 1000;
pub const DEFAULT_EVERY_SECS: u64 = 10;
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 30;

const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Discovery settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum candidates kept per pattern.
    pub limit: usize,
    /// Seconds between watcher rebuilds.
    pub every: u64,
    pub check_utf8: bool,
    pub verify_host_key: bool,
    /// known_hosts file used when `verify_host_key` is set.
    pub known_hosts: Option<PathBuf>,
    pub remote_timeout_secs: u64,
    /// Local paths, directories or globs.
    pub files: Vec<String>,
    /// `user@host[:port] [password=P] [private_key=K] /path` specs.
    pub ssh: Vec<String>,
    /// `container_id /path` specs.
    pub docker: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            every: DEFAULT_EVERY_SECS,
            check_utf8: false,
            verify_host_key: false,
            known_hosts: None,
            remote_timeout_secs: DEFAULT_REMOTE_TIMEOUT_SECS,
            files: Vec::new(),
            ssh: Vec::new(),
            docker: Vec::new(),
        }
    }
}

impl Config {
    /// Load from `explicit` if given, else from the default location when it
    /// exists, then apply environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut cfg = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        cfg.apply_env();
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(cfg)
    }

    /// Apply `LOGSCOUT_*` overrides. Unparseable values are ignored.
    pub fn apply_env(&mut self) {
        if let Ok(val) = dotenvy::var("LOGSCOUT_LIMIT")
            && let Ok(n) = val.parse()
        {
            self.limit = n;
        }

        if let Ok(val) = dotenvy::var("LOGSCOUT_EVERY")
            && let Ok(secs) = val.parse()
        {
            self.every = secs;
        }

        if let Ok(val) = dotenvy::var("LOGSCOUT_CHECK_UTF8") {
            self.check_utf8 = parse_flag(&val);
        }

        if let Ok(val) = dotenvy::var("LOGSCOUT_VERIFY_HOST_KEY") {
            self.verify_host_key = parse_flag(&val);
        }

        if let Ok(path) = dotenvy::var("LOGSCOUT_KNOWN_HOSTS") {
            self.known_hosts = Some(PathBuf::from(path));
        }

        if let Ok(val) = dotenvy::var("LOGSCOUT_REMOTE_TIMEOUT_SECS")
            && let Ok(secs) = val.parse()
        {
            self.remote_timeout_secs = secs;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limit == 0 {
            return Err(ConfigError::Invalid {
                field: "limit",
                reason: "must be at least 1".into(),
            });
        }
        if self.every == 0 {
            return Err(ConfigError::Invalid {
                field: "every",
                reason: "interval must be at least 1 second".into(),
            });
        }
        if self.remote_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "remote_timeout_secs",
                reason: "timeout must be at least 1 second".into(),
            });
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.every)
    }

    pub fn session_options(&self) -> SessionOptions {
        let host_key_policy = if self.verify_host_key {
            HostKeyPolicy::KnownHosts(self.known_hosts.clone())
        } else {
            HostKeyPolicy::Ignore
        };
        SessionOptions {
            timeout: Duration::from_secs(self.remote_timeout_secs),
            host_key_policy,
        }
    }
}

/// `<config_dir>/logscout/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "logscout", "logscout")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

fn parse_flag(val: &str) -> bool {
    matches!(
        val.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    const ENV_KEYS: [&str; 6] = [
        "LOGSCOUT_LIMIT",
        "LOGSCOUT_EVERY",
        "LOGSCOUT_CHECK_UTF8",
        "LOGSCOUT_VERIFY_HOST_KEY",
        "LOGSCOUT_KNOWN_HOSTS",
        "LOGSCOUT_REMOTE_TIMEOUT_SECS",
    ];

    struct EnvGuard;

    impl EnvGuard {
        fn set(vars: &[(&str, &str)]) -> Self {
            for (key, val) in vars {
                // SAFETY: tests touching the environment run under #[serial(env)].
                unsafe {
                    std::env::set_var(key, val);
                }
            }
            EnvGuard
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for key in ENV_KEYS {
                // SAFETY: tests touching the environment run under #[serial(env)].
                unsafe {
                    std::env::remove_var(key);
                }
            }
        }
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.limit, 1000);
        assert_eq!(cfg.every, 10);
        assert!(!cfg.check_utf8);
        assert!(!cfg.verify_host_key);
        assert_eq!(cfg.remote_timeout_secs, 30);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "limit = 5\nfiles = [\"/var/log/*.log\"]\ndocker = [\"abc /var/log/x.log\"]\n",
        )
        .unwrap();

        let cfg = Config::from_file(&path).unwrap();
        assert_eq!(cfg.limit, 5);
        assert_eq!(cfg.every, DEFAULT_EVERY_SECS);
        assert_eq!(cfg.files, vec!["/var/log/*.log"]);
        assert_eq!(cfg.docker, vec!["abc /var/log/x.log"]);
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "limit = \"lots\"").unwrap();

        assert!(matches!(
            Config::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_explicit_file_is_read_error() {
        let err = Config::load(Some(Path::new("/nonexistent/logscout.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    #[serial(env)]
    fn test_env_overrides() {
        let _guard = EnvGuard::set(&[
            ("LOGSCOUT_LIMIT", "42"),
            ("LOGSCOUT_EVERY", "3"),
            ("LOGSCOUT_CHECK_UTF8", "true"),
            ("LOGSCOUT_VERIFY_HOST_KEY", "1"),
            ("LOGSCOUT_KNOWN_HOSTS", "/tmp/known_hosts"),
            ("LOGSCOUT_REMOTE_TIMEOUT_SECS", "7"),
        ]);

        let mut cfg = Config::default();
        cfg.apply_env();
        assert_eq!(cfg.limit, 42);
        assert_eq!(cfg.every, 3);
        assert!(cfg.check_utf8);

        let opts = cfg.session_options();
        assert_eq!(opts.timeout, Duration::from_secs(7));
        assert_eq!(
            opts.host_key_policy,
            HostKeyPolicy::KnownHosts(Some(PathBuf::from("/tmp/known_hosts")))
        );
    }

    #[test]
    #[serial(env)]
    fn test_unparseable_env_is_ignored() {
        let _guard = EnvGuard::set(&[("LOGSCOUT_LIMIT", "many")]);
        let mut cfg = Config::default();
        cfg.apply_env();
        assert_eq!(cfg.limit, DEFAULT_LIMIT);
    }

    #[test]
    fn test_validate_rejects_zero() {
        let cfg = Config {
            limit: 0,
            ..Config::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { field: "limit", .. })
        ));

        let cfg = Config {
            every: 0,
            ..Config::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { field: "every", .. })
        ));

        let cfg = Config {
            remote_timeout_secs: 0,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_ignore_policy_by_default() {
        assert_eq!(
            Config::default().session_options().host_key_policy,
            HostKeyPolicy::Ignore
        );
    }
}
