//! Registration of sensitive files.
//!
//! Registering a file makes the engine protect its content:
//!
//! 1. the allowed directory must already exist
//! 2. the file is hashed
//! 3. optionally, a tree is swept for pre-existing copies of the same
//!    content, which are deleted (size prefilter, then parallel hashing).
//!    Copies already inside the allowed directory are kept.
//! 4. the file is moved to `allowed_dir/filename`
//! 5. the record is upserted, keyed by hash
//!
//! Re-registering known content updates its filename and directory.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use thiserror::Error;

use crate::actions::{delete_file, is_in_trash, move_file, DeleteMode, RemediationError};
use crate::registry::{Registry, RegistryError, SensitiveRecord};
use crate::scanner::path_utils::{is_within, paths_equal_normalized};
use crate::scanner::{HashError, Hasher, Walker};

/// Errors from [`register_file`].
#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("allowed directory does not exist: {0}")]
    NotADirectory(PathBuf),

    #[error("not a file: {0}")]
    InvalidSource(PathBuf),

    #[error("cannot hash {0}")]
    Hash(#[from] HashError),

    /// A different file already sits at the destination.
    #[error("refusing to overwrite existing file: {0}")]
    TargetExists(PathBuf),

    #[error(transparent)]
    Move(#[from] RemediationError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Sweep settings for [`register_file`].
#[derive(Debug, Clone, Default)]
pub struct RegisterOptions {
    /// Tree to search for existing copies. `None` skips the sweep.
    pub sweep_root: Option<PathBuf>,
    /// Subtrees the sweep never enters.
    pub excluded: Vec<PathBuf>,
    pub delete_mode: DeleteMode,
}

/// What registration did.
#[derive(Debug, Clone)]
pub struct RegisterReport {
    pub record: SensitiveRecord,
    /// Copies removed by the sweep.
    pub swept: Vec<PathBuf>,
    /// Files the sweep could not read or delete.
    pub sweep_errors: usize,
}

/// Register `source` as sensitive content allowed only in `allowed_dir`.
///
/// # Errors
///
/// See [`RegisterError`]. Sweep failures on individual files are counted,
/// not returned.
pub fn register_file(
    registry: &Registry,
    hasher: &Hasher,
    source: &Path,
    allowed_dir: &Path,
    options: &RegisterOptions,
) -> Result<RegisterReport, RegisterError> {
    if !allowed_dir.is_dir() {
        return Err(RegisterError::NotADirectory(allowed_dir.to_path_buf()));
    }
    let allowed_dir = allowed_dir
        .canonicalize()
        .map_err(|_| RegisterError::NotADirectory(allowed_dir.to_path_buf()))?;
    let hash = hasher.hash_file(source)?;
    let source = source
        .canonicalize()
        .map_err(|_| RegisterError::InvalidSource(source.to_path_buf()))?;
    let filename = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| RegisterError::InvalidSource(source.clone()))?;

    let target = allowed_dir.join(&filename);
    let in_place = paths_equal_normalized(&source, &target);

    let mut keep_existing_target = false;
    if !in_place && fs::symlink_metadata(&target).is_ok() {
        match hasher.hash_file(&target) {
            Ok(existing) if existing == hash => keep_existing_target = true,
            _ => return Err(RegisterError::TargetExists(target)),
        }
    }

    let (swept, sweep_errors) = match &options.sweep_root {
        Some(root) => sweep_copies(
            hasher,
            root,
            &options.excluded,
            &hash,
            &source,
            &allowed_dir,
            options.delete_mode,
        ),
        None => (Vec::new(), 0),
    };

    if keep_existing_target {
        log::info!(
            "{} already holds this content, removing {}",
            target.display(),
            source.display()
        );
        delete_file(&source, options.delete_mode).map_err(RemediationError::from)?;
    } else if !in_place {
        move_file(&source, &target)?;
    }

    let record = registry.upsert(&filename, &hash, hasher.algorithm().name(), &allowed_dir)?;
    log::debug!(
        "Registration of {} complete, {} copy(ies) swept",
        record.filename,
        swept.len()
    );

    Ok(RegisterReport {
        record,
        swept,
        sweep_errors,
    })
}

/// Delete every file under `root` whose content hashes to `hash`, except
/// `source` and anything inside `allowed_dir`.
///
/// The root and exclusions are canonicalized first so walked paths compare
/// with the canonical `source` even when the root is relative or a symlink.
fn sweep_copies(
    hasher: &Hasher,
    root: &Path,
    excluded: &[PathBuf],
    hash: &str,
    source: &Path,
    allowed_dir: &Path,
    delete_mode: DeleteMode,
) -> (Vec<PathBuf>, usize) {
    let Some(size) = fs::metadata(source).ok().map(|m| m.len()) else {
        return (Vec::new(), 0);
    };
    let root = match root.canonicalize() {
        Ok(root) => root,
        Err(e) => {
            log::warn!("Skipping sweep of {}: {}", root.display(), e);
            return (Vec::new(), 1);
        }
    };
    let excluded: Vec<PathBuf> = excluded
        .iter()
        .map(|p| p.canonicalize().unwrap_or_else(|_| p.clone()))
        .collect();

    let mut errors = 0usize;
    let candidates: Vec<PathBuf> = Walker::new(&root)
        .with_excluded(excluded)
        .walk()
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(_) => {
                errors += 1;
                None
            }
        })
        .filter(|path| !paths_equal_normalized(path, source) && !is_within(path, allowed_dir))
        .filter(|path| delete_mode != DeleteMode::Trash || !is_in_trash(path))
        .filter(|path| fs::metadata(path).is_ok_and(|m| m.len() == size))
        .collect();
    log::debug!(
        "Sweep of {}: {} candidate(s) of {} bytes",
        root.display(),
        candidates.len(),
        size
    );

    let results: Vec<Result<PathBuf, ()>> = candidates
        .into_par_iter()
        .filter_map(|path| match hasher.hash_file(&path) {
            Ok(h) if h == hash => Some(match delete_file(&path, delete_mode) {
                Ok(_) => {
                    log::info!("Removed pre-existing copy: {}", path.display());
                    Ok(path)
                }
                Err(e) => {
                    log::warn!("Could not remove copy: {}", e);
                    Err(())
                }
            }),
            Ok(_) => None,
            Err(e) => {
                log::debug!("Sweep skipped {}: {}", path.display(), e);
                None
            }
        })
        .collect();

    let mut swept = Vec::new();
    for result in results {
        match result {
            Ok(path) => swept.push(path),
            Err(()) => errors += 1,
        }
    }
    swept.sort();
    (swept, errors)
}
