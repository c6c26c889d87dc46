//! Single-file deletion.
//!
//! # Overview
//!
//! Stray copies of protected content are removed with one of two modes:
//! - Permanent deletion (default, the copy is gone immediately)
//! - Move to system trash (recoverable by an administrator)
//!
//! # Example
//!
//! ```no_run
//! use dlpwatch::actions::delete::{delete_file, DeleteMode};
//! use std::path::Path;
//!
//! match delete_file(Path::new("/tmp/report.pdf"), DeleteMode::Permanent) {
//!     Ok(size) => println!("Removed {} bytes", size),
//!     Err(e) => eprintln!("Failed: {}", e),
//! }
//! ```

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scanner::path_utils::is_within;

/// How stray copies are removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteMode {
    /// `remove_file`.
    #[default]
    Permanent,
    /// Move to the platform trash.
    Trash,
}

/// Error type for deletion operations.
#[derive(Debug, Error)]
pub enum DeleteError {
    /// File was not found (may have been deleted or moved).
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Permission denied when attempting to delete.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Trash operation failed.
    #[error("trash operation failed for {path}: {message}")]
    TrashFailed { path: PathBuf, message: String },

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DeleteError {
    fn from_io(path: &Path, e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: e,
            },
        }
    }
}

/// Delete a single file, returning its size in bytes.
///
/// The path is not followed if it is a symlink; the link itself is removed.
///
/// # Errors
///
/// - `NotFound` if the file doesn't exist
/// - `PermissionDenied` if deletion is not allowed
/// - `TrashFailed` if the trash operation fails
pub fn delete_file(path: &Path, mode: DeleteMode) -> Result<u64, DeleteError> {
    let size = fs::symlink_metadata(path)
        .map_err(|e| DeleteError::from_io(path, e))?
        .len();

    match mode {
        DeleteMode::Permanent => {
            fs::remove_file(path).map_err(|e| DeleteError::from_io(path, e))?;
            log::info!("Permanently deleted: {} ({} bytes)", path.display(), size);
        }
        DeleteMode::Trash => {
            trash::delete(path).map_err(|e| {
                log::error!("Trash operation failed for {}: {}", path.display(), e);
                DeleteError::TrashFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                }
            })?;
            log::info!("Moved to trash: {} ({} bytes)", path.display(), size);
        }
    }

    Ok(size)
}

/// Home trash directories the platform trash moves files into.
#[must_use]
pub fn trash_dirs() -> Vec<PathBuf> {
    let Some(base) = BaseDirs::new() else {
        return Vec::new();
    };
    if cfg!(target_os = "macos") {
        vec![base.home_dir().join(".Trash")]
    } else if cfg!(windows) {
        Vec::new()
    } else {
        vec![base.data_local_dir().join("Trash")]
    }
}

/// Whether `path` lies inside a trash directory: the home trash, or a
/// per-volume `.Trash`, `.Trash-<uid>` or `$Recycle.Bin` directory.
///
/// Files moved there by [`DeleteMode::Trash`] must not be evaluated again.
#[must_use]
pub fn is_in_trash(path: &Path) -> bool {
    let per_volume = path.components().any(|c| match c {
        Component::Normal(name) => name.to_str().is_some_and(|n| {
            n == ".Trash" || n.starts_with(".Trash-") || n.eq_ignore_ascii_case("$Recycle.Bin")
        }),
        _ => false,
    });
    per_volume || trash_dirs().iter().any(|dir| is_within(path, dir))
}
