//! The enforcement engine.
//!
//! Wires the registry cache, policy evaluator, remediator and alert
//! dispatcher together and runs them behind the event monitor:
//!
//! ```text
//! EventMonitor worker -> Engine::process
//!   -> PolicyEvaluator::evaluate   (hash + cache lookup + classification)
//!   -> Remediator::remediate       (delete copy / restore original)
//!   -> AlertDispatcher::record     (log append, then live fan-out)
//! ```
//!
//! Remediation and alerting run synchronously on the worker that observed
//! the event. Nothing here is fatal: vanished or unreadable files are
//! dropped and failed remediations become alerts.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::actions::{is_in_trash, trash_dirs, DeleteMode, Remediator};
use crate::alerts::{AlertDispatcher, AlertRecord};
use crate::monitor::{EventFilter, EventMonitor, MonitorError, PathHandler};
use crate::policy::{PolicyEvaluator, Verdict};
use crate::registry::{RefreshTask, RegistryCache, RegistryError};
use crate::scanner::Hasher;

/// Errors starting a watch session.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The initial cache load failed.
    #[error("initial registry load failed: {0}")]
    Registry(#[from] RegistryError),

    /// The filesystem monitor could not start.
    #[error(transparent)]
    Monitor(#[from] MonitorError),

    /// The refresh thread could not be spawned.
    #[error("failed to spawn refresh thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// What to watch and how.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub root: PathBuf,
    pub extensions: Vec<String>,
    /// Subtrees to ignore in addition to the engine's own state directories.
    pub ignore_paths: Vec<PathBuf>,
    pub ignore_patterns: Vec<String>,
    pub workers: usize,
    pub refresh_interval: Duration,
}

/// Evaluates observed paths and enforces policy on violations.
#[derive(Debug)]
pub struct Engine {
    cache: Arc<RegistryCache>,
    evaluator: PolicyEvaluator,
    remediator: Remediator,
    delete_mode: DeleteMode,
    alerts: Arc<AlertDispatcher>,
}

impl Engine {
    #[must_use]
    pub fn new(
        cache: Arc<RegistryCache>,
        hasher: Hasher,
        delete_mode: DeleteMode,
        alerts: Arc<AlertDispatcher>,
    ) -> Self {
        Self {
            evaluator: PolicyEvaluator::new(Arc::clone(&cache), hasher),
            remediator: Remediator::new(Arc::clone(&cache), delete_mode),
            delete_mode,
            cache,
            alerts,
        }
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<RegistryCache> {
        &self.cache
    }

    #[must_use]
    pub fn alerts(&self) -> &Arc<AlertDispatcher> {
        &self.alerts
    }

    /// Evaluate one path and enforce policy.
    ///
    /// Returns the alert that was raised, if the file was a violation.
    /// In trash mode, files already in a trash directory are left alone.
    pub fn process(&self, path: &Path) -> Option<AlertRecord> {
        if self.delete_mode == DeleteMode::Trash && is_in_trash(path) {
            log::trace!("In trash, skipping: {}", path.display());
            return None;
        }
        let violation = match self.evaluator.evaluate(path) {
            Ok(Verdict::Violation(v)) => v,
            Ok(_) => return None,
            Err(e) => {
                log::debug!("Skipping {}: {}", path.display(), e);
                return None;
            }
        };

        let outcome = self.remediator.remediate(&violation);
        let alert = AlertRecord::new(&violation, outcome);
        let message = alert.message();
        if alert.outcome.succeeded() {
            log::info!("{}", message);
        } else {
            log::warn!("{}", message);
        }
        if let Err(e) = self.alerts.record(&message) {
            log::error!("Failed to record alert: {}", e);
        }
        Some(alert)
    }

    /// Load the cache, start the refresher and the monitor.
    ///
    /// The alert log's directory is always excluded from monitoring, and so
    /// is the home trash when copies are sent there.
    ///
    /// # Errors
    ///
    /// Fails if the first registry load, the refresh thread or the monitor
    /// cannot be started. Later refresh failures only log a warning.
    pub fn start(self: &Arc<Self>, options: &WatchOptions) -> Result<WatchSession, EngineError> {
        let loaded = self.cache.refresh()?;
        log::info!("Loaded {} protected record(s)", loaded);

        let refresher = self
            .cache
            .spawn_refresher(options.refresh_interval)
            .map_err(EngineError::Spawn)?;

        let mut ignored = options.ignore_paths.clone();
        if let Some(dir) = self.alerts.log_path().parent() {
            ignored.push(dir.to_path_buf());
        }
        if self.delete_mode == DeleteMode::Trash {
            ignored.extend(trash_dirs());
        }
        let filter = EventFilter::new(&options.root, &options.extensions)
            .with_ignored_dirs(ignored)
            .with_patterns(&options.ignore_patterns);

        let handler: Arc<dyn PathHandler> = Arc::clone(self) as Arc<dyn PathHandler>;
        let monitor = EventMonitor::start(&options.root, filter, options.workers, handler)?;

        Ok(WatchSession { refresher, monitor })
    }
}

impl PathHandler for Engine {
    fn handle_path(&self, path: &Path) {
        if !path.is_file() {
            log::trace!("Not a regular file, skipping: {}", path.display());
            return;
        }
        self.process(path);
    }
}

/// A running refresher + monitor pair.
#[derive(Debug)]
pub struct WatchSession {
    refresher: RefreshTask,
    monitor: EventMonitor,
}

impl WatchSession {
    /// The watched root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.monitor.root()
    }

    /// Stop monitoring, then stop the refresher. Both threads are joined.
    pub fn stop(self) {
        self.monitor.stop();
        self.refresher.stop();
        log::info!("Watch stopped");
    }
}
