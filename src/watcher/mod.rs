//! Filesystem watcher with debounced batch events.
//!
//! All events within a debounce window are collected, filtered through the
//! same ignore rules as the indexing driver, de-duplicated, sorted
//! lexicographically, and emitted as one batch. The same final store state
//! results regardless of event arrival order.

use anyhow::Result;
use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::filter::FileFilter;

/// Bounded queue capacity between the watcher thread and the driver.
const BATCH_QUEUE_CAPACITY: usize = 256;

/// Deterministic batch of dirty file paths, sorted lexicographically.
///
/// Carries only paths: the debouncer does not preserve event kinds, so the
/// driver reconciles each path against filesystem state (present means
/// re-index, absent means delete).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WatcherBatch {
    pub paths: Vec<PathBuf>,
}

impl WatcherBatch {
    fn from_set(paths: BTreeSet<PathBuf>) -> Self {
        Self {
            paths: paths.into_iter().collect(),
        }
    }

    pub fn empty() -> Self {
        Self { paths: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Watcher configuration.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Debounce window in milliseconds
    pub debounce_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self { debounce_ms: 250 }
    }
}

/// Filesystem watcher emitting debounced batches of dirty paths.
pub struct FileSystemWatcher {
    watcher_thread: Option<thread::JoinHandle<()>>,
    batch_receiver: Receiver<WatcherBatch>,
    shutdown: Arc<AtomicBool>,
}

impl FileSystemWatcher {
    /// Watch a directory recursively.
    ///
    /// # Arguments
    /// * `root` - Directory to watch (also the ignore-rule root)
    /// * `config` - Debounce configuration
    pub fn new(root: PathBuf, config: WatcherConfig) -> Result<Self> {
        let (batch_tx, batch_rx) = sync_channel(BATCH_QUEUE_CAPACITY);
        let shutdown = Arc::new(AtomicBool::new(false));
        let thread_shutdown = Arc::clone(&shutdown);

        let thread = thread::spawn(move || {
            if let Err(e) = run_watcher(root, batch_tx, config, thread_shutdown) {
                tracing::error!("watcher error: {e:?}");
            }
        });

        Ok(Self {
            watcher_thread: Some(thread),
            batch_receiver: batch_rx,
            shutdown,
        })
    }

    /// Receive the next batch, blocking until available.
    ///
    /// Returns `None` once the watcher thread has terminated.
    pub fn recv_batch(&self) -> Option<WatcherBatch> {
        self.batch_receiver.recv().ok()
    }

    /// Try to receive a batch without blocking.
    pub fn try_recv_batch(&self) -> Option<WatcherBatch> {
        self.batch_receiver.try_recv().ok()
    }

    /// Receive the next batch with a timeout. `Ok(None)` means the watcher
    /// terminated; `Err(())` means the timeout elapsed.
    pub fn recv_batch_timeout(&self, timeout: Duration) -> Result<Option<WatcherBatch>, ()> {
        match self.batch_receiver.recv_timeout(timeout) {
            Ok(batch) => Ok(Some(batch)),
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => Err(()),
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => Ok(None),
        }
    }

    /// Stop watching and join the background thread.
    pub fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(thread) = self.watcher_thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for FileSystemWatcher {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(thread) = self.watcher_thread.take() {
            let _ = thread.join();
        }
    }
}

/// Run the debounced watcher until shutdown is signalled.
fn run_watcher(
    root: PathBuf,
    tx: SyncSender<WatcherBatch>,
    config: WatcherConfig,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    // Built once: re-parsing ignore rules on every event would dominate
    // the debounce window on large trees.
    let filter = match FileFilter::new(&root, &[], &[]) {
        Ok(filter) => Some(filter),
        Err(e) => {
            tracing::warn!("ignore rules unavailable for watcher: {e}");
            None
        }
    };
    let callback_root = root.clone();

    let mut debouncer = new_debouncer(
        Duration::from_millis(config.debounce_ms),
        move |result: notify_debouncer_mini::DebounceEventResult| match result {
            Ok(events) => {
                let dirty = extract_dirty_paths(&events, &callback_root, filter.as_ref());
                if dirty.is_empty() {
                    return;
                }
                match tx.try_send(WatcherBatch::from_set(dirty)) {
                    Ok(()) => {}
                    Err(TrySendError::Full(batch)) => {
                        tracing::warn!(
                            "watcher queue full; dropping batch of {} paths",
                            batch.paths.len()
                        );
                    }
                    Err(TrySendError::Disconnected(_)) => {}
                }
            }
            Err(error) => {
                tracing::warn!("watch event error: {error:?}");
            }
        },
    )?;

    debouncer.watcher().watch(&root, RecursiveMode::Recursive)?;

    while !shutdown.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(100));
    }

    Ok(())
}

/// Filter a debouncer batch down to relevant dirty paths.
///
/// Deleted files no longer exist, so `should_skip` (which stats the path)
/// cannot be used directly; deleted paths pass through on extension alone
/// and the driver reconciles them.
fn extract_dirty_paths(
    events: &[notify_debouncer_mini::DebouncedEvent],
    root: &Path,
    filter: Option<&FileFilter>,
) -> BTreeSet<PathBuf> {
    let mut dirty = BTreeSet::new();

    for event in events {
        let path = &event.path;

        if path.is_dir() {
            continue;
        }
        if FileFilter::is_database_file(path) {
            continue;
        }

        if let Some(filter) = filter {
            if path.exists() {
                if filter.should_skip(path).is_some() {
                    continue;
                }
                // Reject events escaping the project root (symlinked
                // editors, temp dirs).
                if crate::validation::validate_path_within_root(path, root).is_err() {
                    tracing::warn!("watcher rejected path outside root: {}", path.display());
                    continue;
                }
            } else {
                // Deleted: keep only paths that look like sources we track
                let rel = filter.relative_path(path);
                if crate::common::language_for_path(&rel).is_none() {
                    continue;
                }
            }
        }

        dirty.insert(path.clone());
    }

    dirty
}
