//! The registry of discovered log files.
//!
//! A build walks every configured source, expands its pattern, probes and
//! measures each candidate, and returns a deduplicated `Vec<FileInfo>`.
//! [`Registry`] holds the latest build behind an `Arc` that is swapped
//! wholesale, so readers never observe a half-built list.
//!
//! Failures are isolated per candidate and per source: an unreachable host
//! or an unreadable file is logged and skipped, and the rest of the build
//! proceeds.

pub mod watcher;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::config::Config;
use crate::model::{FileInfo, QueryParams};
use crate::scanner::{
    DockerTransport, LocalTransport, OpenedFile, ScanError, SshTransport, Transport, probe, stats,
};
use crate::sources::provenance::{Origin, SourceKind};
use crate::sources::session::SessionOptions;
use crate::sources::spec::{SourceSpec, parse_container_spec, parse_ssh_spec};

pub use watcher::{WatchHandle, WatchState, Watcher};

static GLOBAL: Lazy<Arc<Registry>> = Lazy::new(|| Arc::new(Registry::new()));

/// Process-wide snapshot container.
#[derive(Debug, Default)]
pub struct Registry {
    current: RwLock<Arc<Vec<FileInfo>>>,
    generation: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by the whole process.
    pub fn global() -> Arc<Registry> {
        Arc::clone(&GLOBAL)
    }

    /// Current snapshot. Cheap; the lock is held only to clone the `Arc`.
    pub fn snapshot(&self) -> Arc<Vec<FileInfo>> {
        Arc::clone(&self.current.read())
    }

    /// Replace the snapshot and return the new generation number.
    pub fn publish(&self, files: Vec<FileInfo>) -> u64 {
        let next = Arc::new(files);
        *self.current.write() = next;
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Number of completed publishes.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Look up one entry by its identity.
    pub fn select(&self, file_path: &str, host: &str, kind: SourceKind) -> Option<FileInfo> {
        self.snapshot()
            .iter()
            .find(|f| f.file_path == file_path && f.host == host && f.kind == kind)
            .cloned()
    }

    /// Entry addressed by a query request.
    pub fn select_for(&self, params: &QueryParams) -> Option<FileInfo> {
        self.select(&params.file_path, &params.host, params.kind)
    }

    pub fn len(&self) -> usize {
        self.current.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-build knobs shared by every pattern.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub limit: usize,
    pub check_utf8: bool,
    /// Local path of the stdin capture; entries at this path are tagged `stdin`.
    pub stdin_path: Option<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            limit: crate::config::DEFAULT_LIMIT,
            check_utf8: false,
            stdin_path: None,
        }
    }
}

/// One pattern to scan through one transport.
#[derive(Clone)]
pub struct ScanJob {
    pub transport: Arc<dyn Transport>,
    pub pattern: String,
}

impl ScanJob {
    pub fn new(transport: Arc<dyn Transport>, pattern: impl Into<String>) -> Self {
        Self {
            transport,
            pattern: pattern.into(),
        }
    }
}

impl std::fmt::Debug for ScanJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanJob")
            .field("transport", &self.transport.label())
            .field("pattern", &self.pattern)
            .finish()
    }
}

/// Every source to scan, parsed once and reused on each rebuild.
#[derive(Debug, Clone)]
pub struct SourceSet {
    pub files: Vec<String>,
    pub stdin_path: Option<PathBuf>,
    pub specs: Vec<SourceSpec>,
    pub limit: usize,
    pub check_utf8: bool,
    pub session: SessionOptions,
}

impl Default for SourceSet {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            stdin_path: None,
            specs: Vec::new(),
            limit: crate::config::DEFAULT_LIMIT,
            check_utf8: false,
            session: SessionOptions::default(),
        }
    }
}

impl SourceSet {
    /// Parse the spec strings in `config`. A malformed spec is logged and
    /// left out; it never prevents the other sources from being scanned.
    pub fn from_config(config: &Config, stdin_path: Option<PathBuf>) -> Self {
        let mut specs = Vec::with_capacity(config.ssh.len() + config.docker.len());

        for raw in &config.ssh {
            match parse_ssh_spec(raw) {
                Ok(spec) => specs.push(SourceSpec::Ssh(spec)),
                Err(e) => tracing::error!("ignoring ssh source: {e}"),
            }
        }
        for raw in &config.docker {
            match parse_container_spec(raw) {
                Ok(spec) => specs.push(SourceSpec::Container(spec)),
                Err(e) => tracing::error!("ignoring docker source: {e}"),
            }
        }

        Self {
            files: config.files.clone(),
            stdin_path,
            specs,
            limit: config.limit,
            check_utf8: config.check_utf8,
            session: config.session_options(),
        }
    }

    pub fn options(&self) -> ScanOptions {
        ScanOptions {
            limit: self.limit,
            check_utf8: self.check_utf8,
            stdin_path: self
                .stdin_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
        }
    }

    /// Jobs in scan order: local patterns, the stdin capture, then remote specs.
    pub fn jobs(&self) -> Vec<ScanJob> {
        let local: Arc<dyn Transport> = Arc::new(LocalTransport::new());
        let mut jobs: Vec<ScanJob> = self
            .files
            .iter()
            .map(|pattern| ScanJob::new(Arc::clone(&local), pattern.clone()))
            .collect();

        // an empty capture is left out until the pipe has delivered bytes
        if let Some(path) = &self.stdin_path
            && std::fs::metadata(path).is_ok_and(|m| m.len() > 0)
        {
            jobs.push(ScanJob::new(
                Arc::clone(&local),
                path.to_string_lossy().into_owned(),
            ));
        }

        for spec in &self.specs {
            let job = match spec {
                SourceSpec::Ssh(s) => ScanJob::new(
                    Arc::new(SshTransport::new(s.descriptor.clone(), self.session.clone())),
                    s.file_path.clone(),
                ),
                SourceSpec::Container(c) => ScanJob::new(
                    Arc::new(DockerTransport::new(c.container_id.clone())),
                    c.file_path.clone(),
                ),
            };
            jobs.push(job);
        }
        jobs
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.stdin_path.is_none() && self.specs.is_empty()
    }

    pub fn build(&self) -> Vec<FileInfo> {
        build_registry(&self.jobs(), &self.options())
    }
}

/// Scan every job and return the deduplicated registry contents.
pub fn build_registry(jobs: &[ScanJob], opts: &ScanOptions) -> Vec<FileInfo> {
    let start = Instant::now();
    let mut files = Vec::new();

    for job in jobs {
        match file_infos_for_pattern(job.transport.as_ref(), &job.pattern, opts) {
            Ok(found) => files.extend(found),
            Err(e) => tracing::warn!(
                source = %job.transport.label(),
                pattern = %job.pattern,
                "skipping source: {e}"
            ),
        }
    }

    let files = dedupe(files);
    tracing::debug!(
        files = files.len(),
        jobs = jobs.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "registry build complete"
    );
    files
}

/// Expand one pattern and turn every usable candidate into a [`FileInfo`].
///
/// Only expansion failures are returned; per-candidate failures are logged
/// and the candidate is dropped.
pub fn file_infos_for_pattern(
    transport: &dyn Transport,
    pattern: &str,
    opts: &ScanOptions,
) -> Result<Vec<FileInfo>, ScanError> {
    let mut candidates = transport.expand(pattern)?;
    if candidates.is_empty() {
        tracing::info!(source = %transport.label(), pattern, "no files matched");
        return Ok(Vec::new());
    }

    if candidates.len() > opts.limit {
        tracing::warn!(
            source = %transport.label(),
            pattern,
            found = candidates.len(),
            limit = opts.limit,
            "pattern matched more files than the limit, truncating"
        );
        candidates.truncate(opts.limit);
    }

    let origin = transport.origin();
    let mut infos = Vec::with_capacity(candidates.len());
    for path in candidates {
        let Some((lines, size)) = inspect(transport, &path, opts.check_utf8) else {
            continue;
        };
        let tag = if origin.kind == SourceKind::File && opts.stdin_path.as_deref() == Some(path.as_str()) {
            Origin::stdin()
        } else {
            origin.clone()
        };
        infos.push(FileInfo::new(path, lines, size, &tag));
    }
    Ok(infos)
}

/// Open, probe and measure one candidate. `None` means "leave it out".
fn inspect(transport: &dyn Transport, path: &str, check_utf8: bool) -> Option<(u64, u64)> {
    let mut file: OpenedFile = match transport.open(path) {
        Ok(file) => file,
        Err(e) => {
            tracing::warn!(source = %transport.label(), "dropping candidate: {e}");
            return None;
        }
    };

    match probe::probe(&mut file, check_utf8) {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(source = %transport.label(), path, "skipping non-text file");
            return None;
        }
        Err(source) => {
            let e = ScanError::Probe {
                path: path.to_string(),
                source,
            };
            tracing::warn!(source = %transport.label(), "dropping candidate: {e}");
            return None;
        }
    }

    match stats::stats(&mut file) {
        Ok(counts) => Some(counts),
        Err(source) => {
            let e = ScanError::Stats {
                path: path.to_string(),
                source,
            };
            tracing::error!(source = %transport.label(), "dropping candidate: {e}");
            None
        }
    }
}

/// Drop later duplicates of `(file_path, type, host)`, keeping first-seen order.
pub fn dedupe(files: Vec<FileInfo>) -> Vec<FileInfo> {
    let mut seen = HashSet::with_capacity(files.len());
    files.into_iter().filter(|f| seen.insert(f.key())).collect()
}
