//! In-memory registry cache.
//!
//! The policy evaluator runs on every filesystem event and must not hit the
//! database each time. [`RegistryCache`] keeps an immutable
//! [`CacheSnapshot`] behind an `RwLock<Arc<_>>`: readers clone the `Arc`
//! and release the lock immediately, and a refresh builds a whole new
//! snapshot outside the lock before swapping it in.
//!
//! If a refresh fails the previous snapshot stays in place, so the engine
//! degrades to stale-cache operation instead of losing protection.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};

use super::database::{RecordSource, RegistryResult};
use super::record::CacheEntry;

/// Immutable `hash -> (allowed directory, filename)` map.
#[derive(Debug, Default)]
pub struct CacheSnapshot {
    entries: HashMap<String, CacheEntry>,
    loaded_at: Option<Instant>,
}

impl CacheSnapshot {
    /// Entry for `hash`, if registered.
    #[must_use]
    pub fn get(&self, hash: &str) -> Option<&CacheEntry> {
        self.entries.get(hash)
    }

    /// Number of cached records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// When this snapshot was built. `None` for the startup placeholder.
    #[must_use]
    pub fn loaded_at(&self) -> Option<Instant> {
        self.loaded_at
    }
}

/// Read-optimized mirror of the registry.
pub struct RegistryCache {
    source: Arc<dyn RecordSource>,
    snapshot: RwLock<Arc<CacheSnapshot>>,
}

impl std::fmt::Debug for RegistryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryCache")
            .field("entries", &self.snapshot().len())
            .finish()
    }
}

impl RegistryCache {
    /// Create an empty cache over `source`. Call [`refresh`](Self::refresh)
    /// before relying on lookups.
    #[must_use]
    pub fn new(source: Arc<dyn RecordSource>) -> Self {
        Self {
            source,
            snapshot: RwLock::new(Arc::new(CacheSnapshot::default())),
        }
    }

    /// Reload every record and atomically replace the snapshot.
    ///
    /// Returns the number of cached records.
    ///
    /// # Errors
    ///
    /// Propagates the source's error; the previous snapshot is kept.
    pub fn refresh(&self) -> RegistryResult<usize> {
        let records = self.source.list_all()?;
        let entries: HashMap<String, CacheEntry> = records
            .iter()
            .map(|r| (r.hash_value.clone(), CacheEntry::from(r)))
            .collect();
        let count = entries.len();
        let fresh = Arc::new(CacheSnapshot {
            entries,
            loaded_at: Some(Instant::now()),
        });

        match self.snapshot.write() {
            Ok(mut guard) => *guard = fresh,
            Err(poisoned) => *poisoned.into_inner() = fresh,
        }
        log::debug!("Sensitive hash cache refreshed ({} record(s))", count);
        Ok(count)
    }

    /// The current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<CacheSnapshot> {
        match self.snapshot.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Look up `hash` in the current snapshot.
    #[must_use]
    pub fn lookup(&self, hash: &str) -> Option<CacheEntry> {
        self.snapshot().get(hash).cloned()
    }

    /// Persist a new filename for `hash`.
    ///
    /// The cache itself picks the change up on the next refresh tick.
    ///
    /// # Errors
    ///
    /// Propagates the source's error.
    pub fn update_filename(&self, hash: &str, new_filename: &str) -> RegistryResult<()> {
        self.source.update_filename(hash, new_filename)
    }

    /// Start the background refresh loop.
    ///
    /// The loop refreshes every `interval` until the returned
    /// [`RefreshTask`] is stopped.
    pub fn spawn_refresher(self: &Arc<Self>, interval: Duration) -> std::io::Result<RefreshTask> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let cache = Arc::clone(self);

        let handle = thread::Builder::new()
            .name("dlpwatch-refresh".into())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if let Err(e) = cache.refresh() {
                            log::warn!("Cache refresh failed, keeping last snapshot: {}", e);
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                        log::debug!("Cache refresher stopping");
                        break;
                    }
                }
            })?;

        Ok(RefreshTask {
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }
}

/// Handle to a running refresh loop.
///
/// Dropping the handle stops the loop and joins the thread.
#[derive(Debug)]
pub struct RefreshTask {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl RefreshTask {
    /// Stop the loop and wait for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Cache refresher panicked");
            }
        }
    }
}

impl Drop for RefreshTask {
    fn drop(&mut self) {
        self.shutdown();
    }
}
