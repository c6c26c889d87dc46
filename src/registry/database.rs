//! SQLite-backed sensitive-hash registry.
//!
//! One row per unique content hash. Re-registering a hash updates the
//! stored filename and allowed directory in place (upsert on `hash_value`).

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::DateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;

use super::record::SensitiveRecord;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sensitive_hashes (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    filename          TEXT    NOT NULL,
    hash_value        TEXT    UNIQUE NOT NULL,
    hash_type         TEXT    NOT NULL,
    allowed_directory TEXT    NOT NULL,
    created_at        INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);
CREATE INDEX IF NOT EXISTS idx_hash ON sensitive_hashes(hash_value);
"#;

const SELECT_COLUMNS: &str =
    "SELECT id, filename, hash_value, hash_type, allowed_directory, created_at FROM sensitive_hashes";

/// Errors raised by the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The database could not be opened or queried.
    #[error("registry database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The database directory could not be created.
    #[error("failed to prepare registry location {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A mutex guarding the connection was poisoned by a panicking thread.
    #[error("registry connection lock poisoned")]
    LockPoisoned,

    /// The backing store is unreachable (used by non-SQLite sources).
    #[error("registry unavailable: {0}")]
    Unavailable(String),
}

/// Convenience alias for registry results.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// The slice of the registry the enforcement engine depends on.
///
/// The engine only ever reads every record (to rebuild its cache) and
/// renames a record after a collision-resolved restore.
pub trait RecordSource: Send + Sync {
    /// Every registered record, in no particular order.
    fn list_all(&self) -> RegistryResult<Vec<SensitiveRecord>>;

    /// Update the stored base name for `hash_value`.
    fn update_filename(&self, hash_value: &str, new_filename: &str) -> RegistryResult<()>;
}

/// Persistent registry of sensitive files using SQLite.
pub struct Registry {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").finish_non_exhaustive()
    }
}

impl Registry {
    /// Open (or create) the registry database at `path`.
    ///
    /// Missing parent directories are created.
    pub fn open(path: &Path) -> RegistryResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| RegistryError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        log::debug!("Opened registry at {}", path.display());
        Self::with_connection(conn)
    }

    /// An in-memory registry, mostly for tests.
    pub fn in_memory() -> RegistryResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> RegistryResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> RegistryResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| RegistryError::LockPoisoned)
    }

    /// Insert a record, or update filename and directory if the hash exists.
    ///
    /// Returns the stored record.
    pub fn upsert(
        &self,
        filename: &str,
        hash_value: &str,
        hash_algorithm: &str,
        allowed_directory: &Path,
    ) -> RegistryResult<SensitiveRecord> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sensitive_hashes (filename, hash_value, hash_type, allowed_directory)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(hash_value) DO UPDATE SET
                 filename = excluded.filename,
                 allowed_directory = excluded.allowed_directory",
            params![
                filename,
                hash_value,
                hash_algorithm,
                allowed_directory.to_string_lossy().into_owned()
            ],
        )?;
        let record = conn.query_row(
            &format!("{SELECT_COLUMNS} WHERE hash_value = ?1"),
            params![hash_value],
            row_to_record,
        )?;
        log::info!(
            "Registered {} ({}) in {}",
            record.filename,
            record.hash_value,
            record.allowed_directory.display()
        );
        Ok(record)
    }

    /// Look up a record by content hash.
    pub fn find_by_hash(&self, hash_value: &str) -> RegistryResult<Option<SensitiveRecord>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE hash_value = ?1"),
                params![hash_value],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// All records, newest first.
    pub fn list(&self) -> RegistryResult<Vec<SensitiveRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY created_at DESC, id DESC"))?;
        let records = stmt
            .query_map([], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Delete a record by id. Returns `false` if no such record existed.
    pub fn delete(&self, id: i64) -> RegistryResult<bool> {
        let changed = self
            .conn()?
            .execute("DELETE FROM sensitive_hashes WHERE id = ?1", params![id])?;
        if changed > 0 {
            log::info!("Removed registry record {}", id);
        }
        Ok(changed > 0)
    }

    /// Number of registered records.
    pub fn count(&self) -> RegistryResult<usize> {
        let n: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM sensitive_hashes", [], |row| row.get(0))?;
        Ok(usize::try_from(n).unwrap_or(0))
    }
}

impl RecordSource for Registry {
    fn list_all(&self) -> RegistryResult<Vec<SensitiveRecord>> {
        self.list()
    }

    fn update_filename(&self, hash_value: &str, new_filename: &str) -> RegistryResult<()> {
        let changed = self.conn()?.execute(
            "UPDATE sensitive_hashes SET filename = ?1 WHERE hash_value = ?2",
            params![new_filename, hash_value],
        )?;
        log::debug!(
            "Renamed registry record {} to {} ({} row(s))",
            hash_value,
            new_filename,
            changed
        );
        Ok(())
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<SensitiveRecord> {
    let created: i64 = row.get(5)?;
    let allowed: String = row.get(4)?;
    Ok(SensitiveRecord {
        id: row.get(0)?,
        filename: row.get(1)?,
        hash_value: row.get(2)?,
        hash_algorithm: row.get(3)?,
        allowed_directory: PathBuf::from(allowed),
        created_at: DateTime::from_timestamp(created, 0).unwrap_or_default(),
    })
}
