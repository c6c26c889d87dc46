//! Security alerts.
//!
//! Every policy violation produces exactly one [`AlertRecord`]. The
//! [`AlertDispatcher`] appends it to a durable, human-readable log (one
//! block per alert, separated by a blank line) and then publishes the same
//! text to every live [`AlertSubscription`].
//!
//! # Delivery
//!
//! - Subscribers receive every alert published after they subscribed. There
//!   is no replay for late joiners.
//! - Each subscriber owns an unbounded queue, so publishing never waits on
//!   a slow reader. Queues whose receiver was dropped are pruned on the next
//!   publish.
//! - Appending and publishing happen under one lock, so the log order and
//!   the live order are the same and blocks never interleave.
//!
//! # Example
//!
//! ```no_run
//! use dlpwatch::alerts::AlertDispatcher;
//! use std::path::Path;
//!
//! let alerts = AlertDispatcher::new(Path::new("/var/lib/dlpwatch/alerts_log.txt")).unwrap();
//! let feed = alerts.subscribe();
//! std::thread::spawn(move || {
//!     for message in feed {
//!         println!("{message}");
//!     }
//! });
//! ```

mod record;

pub use record::{AlertOutcome, AlertRecord};

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use thiserror::Error;

/// Delimiter between alert blocks in the durable log.
pub const BLOCK_SEPARATOR: &str = "\n\n";

/// Errors raised by the alert log.
#[derive(Debug, Error)]
pub enum AlertError {
    /// The alert log could not be read or written.
    #[error("alert log I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The dispatcher lock was poisoned by a panicking thread.
    #[error("alert dispatcher lock poisoned")]
    LockPoisoned,
}

/// Durable alert log plus live fan-out.
#[derive(Debug)]
pub struct AlertDispatcher {
    log_path: PathBuf,
    subscribers: Mutex<Vec<Sender<String>>>,
}

impl AlertDispatcher {
    /// Create a dispatcher writing to `log_path`.
    ///
    /// The parent directory and an empty log file are created if missing.
    pub fn new(log_path: &Path) -> Result<Self, AlertError> {
        let io_err = |source| AlertError::Io {
            path: log_path.to_path_buf(),
            source,
        };
        if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .map_err(io_err)?;

        Ok(Self {
            log_path: log_path.to_path_buf(),
            subscribers: Mutex::new(Vec::new()),
        })
    }

    /// Path of the durable log.
    #[must_use]
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Sender<String>>>, AlertError> {
        self.subscribers.lock().map_err(|_| AlertError::LockPoisoned)
    }

    /// Append `message` to the log, then publish it to live subscribers.
    ///
    /// Nothing is published if the append fails.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the log could not be written.
    pub fn record(&self, message: &str) -> Result<(), AlertError> {
        let mut subscribers = self.lock()?;

        let block = format!("{}{}", message.trim_end(), BLOCK_SEPARATOR);
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .and_then(|mut file| file.write_all(block.as_bytes()))
            .map_err(|source| AlertError::Io {
                path: self.log_path.clone(),
                source,
            })?;

        let before = subscribers.len();
        subscribers.retain(|tx| tx.send(message.to_string()).is_ok());
        if subscribers.len() < before {
            log::debug!("Dropped {} closed alert subscriber(s)", before - subscribers.len());
        }
        Ok(())
    }

    /// Open a live feed of alerts published from now on.
    #[must_use]
    pub fn subscribe(&self) -> AlertSubscription {
        let (tx, rx) = unbounded();
        match self.subscribers.lock() {
            Ok(mut subs) => subs.push(tx),
            Err(poisoned) => poisoned.into_inner().push(tx),
        }
        AlertSubscription { rx }
    }

    /// Number of currently attached subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map_or(0, |subs| subs.len())
    }

    /// Historical alert blocks, most recent first.
    ///
    /// A missing log reads as empty.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the log exists but cannot be read.
    pub fn list(&self) -> Result<Vec<String>, AlertError> {
        let _guard = self.lock()?;
        match fs::read_to_string(&self.log_path) {
            Ok(content) => Ok(parse_blocks(&content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(source) => Err(AlertError::Io {
                path: self.log_path.clone(),
                source,
            }),
        }
    }

    /// Truncate the durable log. Messages already queued for live
    /// subscribers are not affected.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the log cannot be truncated.
    pub fn clear(&self) -> Result<(), AlertError> {
        let _guard = self.lock()?;
        match OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.log_path)
        {
            Ok(_) => {
                log::info!("Cleared alert log {}", self.log_path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(AlertError::Io {
                path: self.log_path.clone(),
                source,
            }),
        }
    }
}

/// Split log content into alert blocks, most recent first.
#[must_use]
pub fn parse_blocks(content: &str) -> Vec<String> {
    let mut blocks: Vec<String> = content
        .split(BLOCK_SEPARATOR)
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(str::to_string)
        .collect();
    blocks.reverse();
    blocks
}

/// Receiving end of a live alert feed.
///
/// Iterating blocks until the next alert arrives and ends only when the
/// dispatcher is dropped.
#[derive(Debug)]
pub struct AlertSubscription {
    rx: Receiver<String>,
}

impl AlertSubscription {
    /// Block until the next alert. `None` once the dispatcher is gone.
    pub fn recv(&self) -> Option<String> {
        self.rx.recv().ok()
    }

    /// Wait up to `timeout` for the next alert.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<String> {
        match self.rx.recv_timeout(timeout) {
            Ok(msg) => Some(msg),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Take an alert if one is already queued.
    pub fn try_recv(&self) -> Option<String> {
        self.rx.try_recv().ok()
    }
}

impl Iterator for AlertSubscription {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.recv()
    }
}
