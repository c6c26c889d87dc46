//! Sensitive-file registry.
//!
//! This module owns the list of protected files, keyed by content hash.
//!
//! # Architecture
//!
//! * [`record`]: the persisted [`SensitiveRecord`] and the derived [`CacheEntry`].
//! * [`database`]: SQLite persistence and the [`RecordSource`] seam the engine reads through.
//! * [`cache`]: the in-memory snapshot the policy evaluator consults, refreshed on a timer.
//!
//! # Consistency
//!
//! The cache is rebuilt wholesale on every refresh tick and swapped in
//! atomically. A registration made between two ticks becomes visible to
//! the watcher on the next tick, never earlier.

pub mod cache;
pub mod database;
pub mod record;

pub use cache::{CacheSnapshot, RefreshTask, RegistryCache};
pub use database::{Registry, RegistryError, RegistryResult, RecordSource};
pub use record::{CacheEntry, SensitiveRecord};
