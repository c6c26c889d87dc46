//! Policy evaluation.
//!
//! Given a file and the registry cache, decide whether the file is
//! untracked, sitting where it is allowed, or leaking. A leak is further
//! classified by whether the registered original is still in place:
//!
//! | Expected path exists? | Classification | Safe remediation |
//! |---|---|---|
//! | yes | [`ViolationKind::Copy`] (stray copy) | delete the observed file |
//! | no  | [`ViolationKind::Move`] (displaced original) | move it back |

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::registry::{CacheEntry, RegistryCache};
use crate::scanner::path_utils::is_within;
use crate::scanner::{HashError, Hasher};

/// How protected content ended up outside its allowed directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ViolationKind {
    /// The original is intact; the observed file is an extra copy.
    Copy,
    /// No original remains; the observed file is the displaced original.
    Move,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Copy => f.write_str("COPY"),
            Self::Move => f.write_str("MOVE"),
        }
    }
}

/// A classified policy violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Absolute path of the out-of-place file.
    pub path: PathBuf,
    /// Its content hash.
    pub hash: String,
    pub kind: ViolationKind,
    /// Registry view of the protected content.
    pub entry: CacheEntry,
}

impl Violation {
    /// `allowed_directory/filename` from the registry.
    #[must_use]
    pub fn expected_path(&self) -> PathBuf {
        self.entry.expected_path()
    }
}

/// Outcome of evaluating one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Content is not registered.
    Untracked,
    /// Registered content inside its allowed directory (or below it).
    Permitted,
    /// Registered content found elsewhere.
    Violation(Violation),
}

/// Classifies observed files against the registry cache.
#[derive(Debug, Clone)]
pub struct PolicyEvaluator {
    cache: Arc<RegistryCache>,
    hasher: Hasher,
}

impl PolicyEvaluator {
    #[must_use]
    pub fn new(cache: Arc<RegistryCache>, hasher: Hasher) -> Self {
        Self { cache, hasher }
    }

    /// Evaluate the file at `path`.
    ///
    /// # Errors
    ///
    /// Any [`HashError`] (file vanished, unreadable, symlink or special
    /// file). Callers treat these as transient and drop the event.
    pub fn evaluate(&self, path: &Path) -> Result<Verdict, HashError> {
        let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        let hash = self.hasher.hash_file(&path)?;

        let Some(entry) = self.cache.lookup(&hash) else {
            log::trace!("Untracked: {}", path.display());
            return Ok(Verdict::Untracked);
        };

        let current_dir = path.parent().unwrap_or(Path::new("/"));
        if is_within(current_dir, &entry.allowed_directory) {
            log::trace!("Permitted: {}", path.display());
            return Ok(Verdict::Permitted);
        }

        let expected = entry.expected_path();
        let kind = if fs::symlink_metadata(&expected).is_ok() {
            ViolationKind::Copy
        } else {
            ViolationKind::Move
        };
        log::debug!(
            "Violation ({}): {} (expected {})",
            kind,
            path.display(),
            expected.display()
        );

        Ok(Verdict::Violation(Violation {
            path,
            hash,
            kind,
            entry,
        }))
    }
}
