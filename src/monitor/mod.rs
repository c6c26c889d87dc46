//! Filesystem event monitor.
//!
//! # Architecture
//!
//! ```text
//! notify watcher (recursive, OS thread)
//!   -> event_target + EventFilter
//!   -> PathRouter: lane = hash(path) % workers
//!   -> worker N (single consumer per lane)
//!   -> PathHandler::handle_path
//! ```
//!
//! Routing by path hash means every event for one path lands on the same
//! worker, in delivery order, so a rapid create-then-modify can never be
//! remediated twice concurrently. Different paths spread over the pool.

pub mod filter;

pub use filter::{event_target, EventFilter};

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;

use crate::scanner::path_utils::path_key;

/// Receives filtered file paths from the monitor's workers.
pub trait PathHandler: Send + Sync + 'static {
    /// Process one path. Must not panic on vanished or unreadable files.
    fn handle_path(&self, path: &Path);
}

/// Errors starting the monitor.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The watch root does not exist or is not a directory.
    #[error("watch root is not a directory: {0}")]
    RootNotDirectory(PathBuf),

    /// The OS notification backend refused the watch.
    #[error("failed to watch {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Routes each path to a fixed worker lane.
#[derive(Debug, Clone)]
struct PathRouter {
    lanes: Vec<Sender<PathBuf>>,
}

impl PathRouter {
    fn lane_for(&self, path: &Path) -> usize {
        lane_index(path, self.lanes.len())
    }

    fn route(&self, path: PathBuf) {
        let lane = self.lane_for(&path);
        if self.lanes[lane].send(path).is_err() {
            log::trace!("Worker lane {} closed, dropping event", lane);
        }
    }
}

/// Lane for `path` among `lanes` workers.
fn lane_index(path: &Path, lanes: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    path_key(path).hash(&mut hasher);
    (hasher.finish() % lanes.max(1) as u64) as usize
}

/// A running watcher plus its worker pool.
///
/// Dropping the monitor stops watching and joins the workers. Paths still
/// queued at that point are discarded.
pub struct EventMonitor {
    root: PathBuf,
    watcher: Option<RecommendedWatcher>,
    stop: Option<Sender<()>>,
    workers: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for EventMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventMonitor")
            .field("root", &self.root)
            .field("workers", &self.workers.len())
            .finish()
    }
}

impl EventMonitor {
    /// Start watching `root` recursively.
    ///
    /// `workers` is clamped to at least one.
    ///
    /// # Errors
    ///
    /// `RootNotDirectory` if `root` is not a directory, `Watch` if the OS
    /// backend refuses it, `Spawn` if a worker cannot be started.
    pub fn start(
        root: &Path,
        filter: EventFilter,
        workers: usize,
        handler: Arc<dyn PathHandler>,
    ) -> Result<Self, MonitorError> {
        if !root.is_dir() {
            return Err(MonitorError::RootNotDirectory(root.to_path_buf()));
        }

        let (stop_tx, stop_rx) = bounded::<()>(0);
        let mut lanes = Vec::with_capacity(workers.max(1));
        let mut handles = Vec::with_capacity(workers.max(1));
        for i in 0..workers.max(1) {
            let (tx, rx) = unbounded::<PathBuf>();
            lanes.push(tx);
            let handler = Arc::clone(&handler);
            let stop_rx = stop_rx.clone();
            handles.push(
                thread::Builder::new()
                    .name(format!("dlpwatch-worker-{i}"))
                    .spawn(move || worker_loop(&rx, &stop_rx, handler.as_ref()))?,
            );
        }

        let router = PathRouter { lanes };
        let watch_err = |source| MonitorError::Watch {
            path: root.to_path_buf(),
            source,
        };
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => dispatch(&event, &filter, &router),
                Err(e) => log::warn!("Filesystem watch error: {}", e),
            }
        })
        .map_err(watch_err)?;
        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(watch_err)?;

        log::info!(
            "Monitoring {} with {} worker(s)",
            root.display(),
            handles.len()
        );
        Ok(Self {
            root: root.to_path_buf(),
            watcher: Some(watcher),
            stop: Some(stop_tx),
            workers: handles,
        })
    }

    /// The watched root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stop watching and join the workers.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        drop(self.watcher.take());
        drop(self.stop.take());
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("Monitor worker panicked");
            }
        }
    }
}

impl Drop for EventMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn dispatch(event: &Event, filter: &EventFilter, router: &PathRouter) {
    let Some(path) = event_target(event) else {
        return;
    };
    if !filter.accepts(&path) {
        log::trace!("Filtered: {}", path.display());
        return;
    }
    log::debug!("[EVENT] {:?}: {}", event.kind, path.display());
    router.route(path);
}

fn worker_loop(paths: &Receiver<PathBuf>, stop: &Receiver<()>, handler: &dyn PathHandler) {
    loop {
        select! {
            recv(paths) -> msg => match msg {
                Ok(path) => handler.handle_path(&path),
                Err(_) => break,
            },
            recv(stop) -> _ => break,
        }
    }
}
