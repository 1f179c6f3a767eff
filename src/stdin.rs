//! Capture of piped standard input.
//!
//! When logscout is fed through a pipe, the stream is copied into a temp file
//! on a background thread. That file is then scanned like any local pattern
//! and tagged as `stdin` in the registry.

use std::io::{self, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use once_cell::sync::{Lazy, OnceCell};
use parking_lot::Mutex;

use crate::tempfiles::{self, TEMP_PREFIX};

static CAPTURED: OnceCell<PathBuf> = OnceCell::new();
static COPIER: Lazy<Mutex<Option<JoinHandle<io::Result<u64>>>>> = Lazy::new(|| Mutex::new(None));

/// True when stdin is a pipe or a redirected file.
///
/// Terminals and character devices such as `/dev/null` do not count.
pub fn is_input_from_pipe() -> bool {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::fd::AsFd;
        use std::os::unix::fs::FileTypeExt;

        if let Ok(fd) = stdin.as_fd().try_clone_to_owned()
            && let Ok(meta) = std::fs::File::from(fd).metadata()
        {
            return !meta.file_type().is_char_device();
        }
    }
    true
}

/// Copy `reader` into a new tracked temp file on a background thread.
///
/// The file exists (possibly still empty) when this returns; the handle
/// yields the number of bytes copied once the reader is exhausted.
pub fn capture_from<R>(mut reader: R) -> io::Result<(PathBuf, JoinHandle<io::Result<u64>>)>
where
    R: Read + Send + 'static,
{
    let (mut file, path) = tempfile::Builder::new()
        .prefix(&format!("{TEMP_PREFIX}stdin-"))
        .tempfile()?
        .keep()
        .map_err(|e| e.error)?;
    tempfiles::track(&path);

    let thread_path = path.clone();
    let handle = std::thread::Builder::new()
        .name("logscout-stdin".into())
        .spawn(move || {
            let copied = io::copy(&mut reader, &mut file);
            match &copied {
                Ok(bytes) => {
                    tracing::debug!(path = %thread_path.display(), bytes, "stdin capture finished")
                }
                Err(e) => {
                    tracing::warn!(path = %thread_path.display(), "stdin capture failed: {e}")
                }
            }
            file.flush()?;
            copied
        })?;

    Ok((path, handle))
}

/// Capture the process's stdin, once. Later calls return the first path.
pub fn capture_stdin() -> io::Result<PathBuf> {
    CAPTURED
        .get_or_try_init(|| {
            let (path, handle) = capture_from(io::stdin())?;
            *COPIER.lock() = Some(handle);
            tracing::info!(path = %path.display(), "capturing piped stdin");
            Ok(path)
        })
        .cloned()
}

/// Block until the stdin copy has finished. Returns the bytes copied, or 0
/// when there is nothing to wait for.
pub fn wait_for_capture() -> io::Result<u64> {
    let Some(handle) = COPIER.lock().take() else {
        return Ok(0);
    };
    handle
        .join()
        .map_err(|_| io::Error::other("stdin capture thread panicked"))?
}

/// Path of the stdin capture, if one was made.
pub fn captured_path() -> Option<&'static Path> {
    CAPTURED.get().map(PathBuf::as_path)
}

/// True when `path` is the stdin capture file.
pub fn is_stdin_path(path: &str) -> bool {
    captured_path().is_some_and(|captured| captured == Path::new(path))
}
