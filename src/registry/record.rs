//! Registry record definitions.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One protected file, identified by its content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensitiveRecord {
    /// Surrogate id assigned by the registry.
    pub id: i64,
    /// Last known base name of the file.
    pub filename: String,
    /// Content hash (unique).
    pub hash_value: String,
    /// Name of the hash function that produced `hash_value`.
    pub hash_algorithm: String,
    /// The single directory this content may live in.
    pub allowed_directory: PathBuf,
    /// First registration time.
    pub created_at: DateTime<Utc>,
}

impl SensitiveRecord {
    /// Where the registered file is expected to be.
    #[must_use]
    pub fn expected_path(&self) -> PathBuf {
        self.allowed_directory.join(&self.filename)
    }
}

/// Cached view of a record: just what policy evaluation needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Directory the content is allowed in.
    pub allowed_directory: PathBuf,
    /// Base name expected inside `allowed_directory`.
    pub filename: String,
}

impl CacheEntry {
    /// `allowed_directory/filename`.
    #[must_use]
    pub fn expected_path(&self) -> PathBuf {
        self.allowed_directory.join(&self.filename)
    }
}

impl From<&SensitiveRecord> for CacheEntry {
    fn from(record: &SensitiveRecord) -> Self {
        Self {
            allowed_directory: record.allowed_directory.clone(),
            filename: record.filename.clone(),
        }
    }
}
