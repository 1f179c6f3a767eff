use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use flate2::Compression;
use flate2::write::GzEncoder;
use logscout::scanner::{OpenedFile, ScanError, Transport};
use logscout::sources::Origin;
use std::io::Write;

/// Captures tracing output for tests.
#[allow(dead_code)]
pub struct TestTracing {
    buffer: std::sync::Arc<std::sync::Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl TestTracing {
    pub fn new() -> Self {
        Self {
            buffer: std::sync::Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.buffer.clone();
        let make_writer = move || TestWriter(writer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(make_writer)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn output(&self) -> String {
        let buf = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Assert that the captured log output contains the provided substring.
    pub fn assert_contains(&self, needle: &str) {
        let out = self.output();
        assert!(
            out.contains(needle),
            "expected logs to contain `{needle}`, got:\n{out}"
        );
    }
}

struct TestWriter(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.0.lock().unwrap();
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Write `content` to `dir/name`, creating parent dirs.
#[allow(dead_code)]
pub fn write_log(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
}

/// Gzip `content` into `dir/name`.
#[allow(dead_code)]
pub fn write_gzip(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(content).unwrap();
    write_log(dir, name, &enc.finish().unwrap())
}

/// `count` lines of log-ish text.
#[allow(dead_code)]
pub fn log_lines(count: usize) -> String {
    (0..count)
        .map(|i| format!("2024-05-01T12:00:{:02}Z INFO request {i} served\n", i % 60))
        .collect()
}

/// Poll `cond` until it holds or `timeout` elapses.
#[allow(dead_code)]
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    cond()
}

/// A remote-looking transport serving files from a local directory.
///
/// Listing and reading go to `root`, but entries are tagged as SSH from
/// `host`, which lets tests mix "remote" results with real failures.
#[allow(dead_code)]
pub struct DirBackedTransport {
    pub root: PathBuf,
    pub host: String,
}

impl Transport for DirBackedTransport {
    fn origin(&self) -> Origin {
        Origin::ssh(self.host.clone())
    }

    fn label(&self) -> String {
        format!("fake ssh {}", self.host)
    }

    fn expand(&self, pattern: &str) -> Result<Vec<String>, ScanError> {
        let full = self.root.join(pattern.trim_start_matches('/'));
        let mut found: Vec<String> = glob::glob(&full.to_string_lossy())
            .map_err(|e| ScanError::expansion(pattern, e))?
            .flatten()
            .filter_map(|p| {
                p.strip_prefix(&self.root)
                    .ok()
                    .map(|rel| format!("/{}", rel.to_string_lossy()))
            })
            .collect();
        found.sort();
        Ok(found)
    }

    fn open(&self, path: &str) -> Result<OpenedFile, ScanError> {
        OpenedFile::local(&self.root.join(path.trim_start_matches('/'))).map_err(|source| {
            ScanError::Probe {
                path: path.to_string(),
                source,
            }
        })
    }
}
