//! Periodic registry rebuilds.
//!
//! [`Watcher::start`] performs one synchronous build so the registry is
//! populated before anything reads it, then hands the loop to a dedicated
//! thread. The loop waits on a ticker and a command channel; builds run on
//! that thread only, so two builds never overlap. Ticks that fire while a
//! build is in progress are drained afterwards and counted as skipped.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, select};
use parking_lot::Mutex;

use super::{Registry, SourceSet};
use crate::model::FileInfo;

type BuildFn = Box<dyn Fn() -> Vec<FileInfo> + Send + 'static>;

/// Lifecycle of a watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchCommand {
    Refresh,
    Stop,
}

struct Shared {
    state: Mutex<WatchState>,
    skipped_ticks: AtomicU64,
    failed_builds: AtomicU64,
}

/// Rebuilds the registry on a fixed interval.
pub struct Watcher {
    registry: Arc<Registry>,
    build: BuildFn,
    every: Duration,
    shared: Arc<Shared>,
}

impl Watcher {
    /// Watch `sources`, rebuilding every `every`.
    pub fn new(registry: Arc<Registry>, sources: SourceSet, every: Duration) -> Self {
        Self::with_builder(registry, move || sources.build(), every)
    }

    /// Watch with a custom build function.
    pub fn with_builder<F>(registry: Arc<Registry>, build: F, every: Duration) -> Self
    where
        F: Fn() -> Vec<FileInfo> + Send + 'static,
    {
        Self {
            registry,
            build: Box::new(build),
            every,
            shared: Arc::new(Shared {
                state: Mutex::new(WatchState::Idle),
                skipped_ticks: AtomicU64::new(0),
                failed_builds: AtomicU64::new(0),
            }),
        }
    }

    pub fn state(&self) -> WatchState {
        *self.shared.state.lock()
    }

    /// Build and publish once, then spawn the periodic loop.
    pub fn start(self) -> std::io::Result<WatchHandle> {
        self.rebuild("initial");

        let (tx, rx) = crossbeam_channel::unbounded();
        let shared = Arc::clone(&self.shared);
        let registry = Arc::clone(&self.registry);
        *shared.state.lock() = WatchState::Running;

        let thread = std::thread::Builder::new()
            .name("logscout-watcher".into())
            .spawn(move || self.run(rx));

        let thread = match thread {
            Ok(thread) => thread,
            Err(e) => {
                *shared.state.lock() = WatchState::Idle;
                return Err(e);
            }
        };

        Ok(WatchHandle {
            commands: tx,
            thread: Some(thread),
            shared,
            registry,
        })
    }

    fn run(self, commands: Receiver<WatchCommand>) {
        let ticker = crossbeam_channel::tick(self.every);
        tracing::info!(every_secs = self.every.as_secs_f64(), "watcher started");

        loop {
            select! {
                recv(ticker) -> _ => self.rebuild("tick"),
                recv(commands) -> cmd => match cmd {
                    Ok(WatchCommand::Refresh) => self.rebuild("refresh"),
                    Ok(WatchCommand::Stop) | Err(_) => break,
                },
            }

            let mut skipped = 0u64;
            while ticker.try_recv().is_ok() {
                skipped += 1;
            }
            if skipped > 0 {
                self.shared.skipped_ticks.fetch_add(skipped, Ordering::Relaxed);
                tracing::debug!(skipped, "ticks fired during a build were skipped");
            }
        }

        *self.shared.state.lock() = WatchState::Idle;
        tracing::info!("watcher stopped");
    }

    /// Run one build and publish it. A panicking build keeps the previous
    /// snapshot.
    fn rebuild(&self, trigger: &'static str) {
        let start = Instant::now();
        match std::panic::catch_unwind(AssertUnwindSafe(|| (self.build)())) {
            Ok(files) => {
                let count = files.len();
                let generation = self.registry.publish(files);
                tracing::info!(
                    trigger,
                    files = count,
                    generation,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "registry refreshed"
                );
            }
            Err(_) => {
                self.shared.failed_builds.fetch_add(1, Ordering::Relaxed);
                tracing::error!(trigger, "registry build panicked, keeping previous snapshot");
            }
        }
    }
}

/// Control handle for a running watcher. Dropping it stops the loop.
pub struct WatchHandle {
    commands: Sender<WatchCommand>,
    thread: Option<JoinHandle<()>>,
    shared: Arc<Shared>,
    registry: Arc<Registry>,
}

impl WatchHandle {
    /// Ask for an immediate rebuild outside the regular schedule.
    pub fn refresh(&self) {
        let _ = self.commands.send(WatchCommand::Refresh);
    }

    /// Stop the loop and wait for the thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    pub fn state(&self) -> WatchState {
        *self.shared.state.lock()
    }

    pub fn skipped_ticks(&self) -> u64 {
        self.shared.skipped_ticks.load(Ordering::Relaxed)
    }

    pub fn failed_builds(&self) -> u64 {
        self.shared.failed_builds.load(Ordering::Relaxed)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    fn shutdown(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.commands.send(WatchCommand::Stop);
            if thread.join().is_err() {
                tracing::error!("watcher thread panicked");
            }
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::provenance::Origin;
    use std::sync::atomic::AtomicUsize;

    fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        cond()
    }

    fn numbered(n: usize) -> Vec<FileInfo> {
        (0..n)
            .map(|i| FileInfo::new(format!("/log/{i}"), 1, 1, &Origin::local()))
            .collect()
    }

    #[test]
    fn test_start_publishes_before_returning() {
        let registry = Arc::new(Registry::new());
        let watcher =
            Watcher::with_builder(Arc::clone(&registry), || numbered(3), Duration::from_secs(60));
        assert_eq!(watcher.state(), WatchState::Idle);

        let handle = watcher.start().unwrap();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.generation(), 1);
        assert_eq!(handle.state(), WatchState::Running);
        handle.stop();
    }

    #[test]
    fn test_refresh_triggers_rebuild() {
        let registry = Arc::new(Registry::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handle = Watcher::with_builder(
            Arc::clone(&registry),
            move || numbered(counter.fetch_add(1, Ordering::SeqCst) + 1),
            Duration::from_secs(60),
        )
        .start()
        .unwrap();

        assert_eq!(registry.len(), 1);
        handle.refresh();
        assert!(wait_until(Duration::from_secs(5), || registry.len() == 2));
        handle.stop();
    }

    #[test]
    fn test_ticks_rebuild_periodically() {
        let registry = Arc::new(Registry::new());
        let handle =
            Watcher::with_builder(Arc::clone(&registry), || numbered(1), Duration::from_millis(20))
                .start()
                .unwrap();

        assert!(wait_until(Duration::from_secs(5), || registry.generation() >= 3));
        handle.stop();
    }

    #[test]
    fn test_panicking_build_keeps_previous_snapshot() {
        let registry = Arc::new(Registry::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handle = Watcher::with_builder(
            Arc::clone(&registry),
            move || {
                if counter.fetch_add(1, Ordering::SeqCst) > 0 {
                    panic!("build exploded");
                }
                numbered(2)
            },
            Duration::from_secs(60),
        )
        .start()
        .unwrap();

        handle.refresh();
        assert!(wait_until(Duration::from_secs(5), || handle.failed_builds() == 1));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.generation(), 1);
        assert_eq!(handle.state(), WatchState::Running);
        handle.stop();
    }

    #[test]
    fn test_slow_build_skips_ticks() {
        let registry = Arc::new(Registry::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handle = Watcher::with_builder(
            Arc::clone(&registry),
            move || {
                // the first call is the synchronous initial build
                if counter.fetch_add(1, Ordering::SeqCst) > 0 {
                    std::thread::sleep(Duration::from_millis(150));
                }
                numbered(1)
            },
            Duration::from_millis(30),
        )
        .start()
        .unwrap();

        assert!(wait_until(Duration::from_secs(5), || handle.skipped_ticks() >= 1));
        handle.stop();
    }

    #[test]
    fn test_drop_stops_thread() {
        let registry = Arc::new(Registry::new());
        let handle =
            Watcher::with_builder(Arc::clone(&registry), || numbered(1), Duration::from_millis(10))
                .start()
                .unwrap();
        drop(handle);

        let generation = registry.generation();
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(registry.generation(), generation);
    }
}
