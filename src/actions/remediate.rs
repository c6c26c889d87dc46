//! Corrective actions for policy violations.
//!
//! # Overview
//!
//! - **Copy**: the registered original is intact, so the observed file is
//!   deleted.
//! - **Move**: the observed file is the only copy, so it is moved back into
//!   its allowed directory under its registered name. If that name is
//!   taken, `_1`, `_2`, ... is inserted before the extension until a free
//!   name is found, and the registry is told about the new name.
//!
//! Failures are never retried here. The returned [`AlertOutcome`] carries
//! the error text so the alert explains what went wrong; the next event
//! for the same path triggers a fresh evaluation.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use super::delete::{delete_file, DeleteError, DeleteMode};
use crate::alerts::AlertOutcome;
use crate::policy::{Violation, ViolationKind};
use crate::registry::RegistryCache;
use crate::scanner::path_utils::suffixed_name;

/// Error type for remediation.
#[derive(Debug, Error)]
pub enum RemediationError {
    /// Deleting a stray copy failed.
    #[error(transparent)]
    Delete(#[from] DeleteError),

    /// Moving a displaced original back failed.
    #[error("failed to move {from} to {to}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl RemediationError {
    /// Whether a move failed only because the destination already exists.
    #[must_use]
    pub fn is_target_taken(&self) -> bool {
        matches!(self, Self::Move { source, .. } if source.kind() == io::ErrorKind::AlreadyExists)
    }
}

/// Executes the remediation for a classified violation.
#[derive(Debug, Clone)]
pub struct Remediator {
    cache: Arc<RegistryCache>,
    delete_mode: DeleteMode,
}

impl Remediator {
    #[must_use]
    pub fn new(cache: Arc<RegistryCache>, delete_mode: DeleteMode) -> Self {
        Self { cache, delete_mode }
    }

    /// Delete or restore, depending on the violation kind.
    pub fn remediate(&self, violation: &Violation) -> AlertOutcome {
        match violation.kind {
            ViolationKind::Copy => self.delete_copy(violation),
            ViolationKind::Move => self.restore_original(violation),
        }
    }

    fn delete_copy(&self, violation: &Violation) -> AlertOutcome {
        match delete_file(&violation.path, self.delete_mode) {
            Ok(_) => AlertOutcome::Deleted,
            Err(e) => {
                log::warn!("Could not delete stray copy: {}", e);
                AlertOutcome::DeleteFailed {
                    error: e.to_string(),
                }
            }
        }
    }

    fn restore_original(&self, violation: &Violation) -> AlertOutcome {
        let dir = &violation.entry.allowed_directory;
        let filename = &violation.entry.filename;

        let mut n = first_free_suffix(dir, filename, 0);
        let target = loop {
            let candidate = dir.join(suffixed_name(filename, n));
            match move_file(&violation.path, &candidate) {
                Ok(()) => break candidate,
                Err(e) if e.is_target_taken() => {
                    log::debug!("{} was taken, trying the next name", candidate.display());
                    n = first_free_suffix(dir, filename, n + 1);
                }
                Err(e) => {
                    log::warn!("Could not restore original: {}", e);
                    return AlertOutcome::RestoreFailed {
                        target: candidate,
                        error: e.to_string(),
                    };
                }
            }
        };
        let renamed = n > 0;
        log::info!(
            "Restored {} to {}",
            violation.path.display(),
            target.display()
        );

        if renamed {
            let new_name = suffixed_name(filename, n);
            if let Err(e) = self.cache.update_filename(&violation.hash, &new_name) {
                log::warn!(
                    "Restored as {} but the registry still lists {}: {}",
                    new_name,
                    filename,
                    e
                );
            }
        }

        AlertOutcome::Restored { target, renamed }
    }
}

/// Pick the restore destination for `filename` inside `dir`.
///
/// Returns the first free candidate among `filename`, `stem_1.ext`,
/// `stem_2.ext`, ... and whether a suffix was needed.
#[must_use]
pub fn resolve_restore_target(dir: &Path, filename: &str) -> (PathBuf, bool) {
    let n = first_free_suffix(dir, filename, 0);
    (dir.join(suffixed_name(filename, n)), n > 0)
}

fn first_free_suffix(dir: &Path, filename: &str, from: usize) -> usize {
    let mut n = from;
    while fs::symlink_metadata(dir.join(suffixed_name(filename, n))).is_ok() {
        n += 1;
    }
    n
}

/// Move a file without ever replacing an existing destination.
///
/// The file is hard-linked into place and the source unlinked. Where hard
/// links are unavailable (another filesystem, FAT) the content is copied
/// into a newly created file instead. If the source cannot be removed
/// afterwards the new path is removed again, so the content never ends up
/// in both places.
///
/// # Errors
///
/// `RemediationError::Move` with the underlying I/O error. An occupied
/// destination is reported with [`io::ErrorKind::AlreadyExists`].
pub fn move_file(from: &Path, to: &Path) -> Result<(), RemediationError> {
    let wrap = |source| RemediationError::Move {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    match fs::hard_link(from, to) {
        Ok(()) => {}
        Err(e) if matches!(e.kind(), io::ErrorKind::AlreadyExists | io::ErrorKind::NotFound) => {
            return Err(wrap(e));
        }
        Err(e) => {
            log::debug!(
                "Cannot link {} -> {} ({}), copying",
                from.display(),
                to.display(),
                e
            );
            copy_new(from, to).map_err(wrap)?;
        }
    }

    if let Err(e) = fs::remove_file(from) {
        let _ = fs::remove_file(to);
        return Err(wrap(e));
    }
    Ok(())
}

/// Copy `from` into a file that must not exist yet, keeping permissions.
fn copy_new(from: &Path, to: &Path) -> io::Result<()> {
    let mut reader = File::open(from)?;
    let permissions = reader.metadata()?.permissions();
    let mut writer = OpenOptions::new().write(true).create_new(true).open(to)?;

    let copied = io::copy(&mut reader, &mut writer)
        .and_then(|_| writer.sync_all())
        .and_then(|()| fs::set_permissions(to, permissions));
    if copied.is_err() {
        let _ = fs::remove_file(to);
    }
    copied
}
