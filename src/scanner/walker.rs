//! Directory walker used by the registration sweep.
//!
//! # Overview
//!
//! [`Walker`] enumerates the regular files under a root so that copies of a
//! file being registered can be found and removed before protection starts.
//! Symlinks are never followed, and excluded subtrees (the tool's own data
//! directories, caches) are pruned without descending into them.
//!
//! # Example
//!
//! ```no_run
//! use dlpwatch::scanner::Walker;
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/home/user"))
//!     .with_excluded(vec!["/home/user/.cache".into()]);
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(path) => println!("{}", path.display()),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::path_utils::is_within;
use super::ScanError;

/// Sequential walker over regular files.
#[derive(Debug, Clone)]
pub struct Walker {
    root: PathBuf,
    excluded: Vec<PathBuf>,
}

impl Walker {
    /// Create a walker rooted at `root`.
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            excluded: Vec::new(),
        }
    }

    /// Subtrees to prune from the walk.
    #[must_use]
    pub fn with_excluded(mut self, excluded: Vec<PathBuf>) -> Self {
        self.excluded = excluded;
        self
    }

    fn is_excluded(&self, path: &Path) -> bool {
        self.excluded.iter().any(|dir| is_within(path, dir))
    }

    /// Walk the tree, yielding the path of every regular file.
    ///
    /// Unreadable entries are yielded as [`ScanError`] values instead of
    /// stopping the walk.
    pub fn walk(&self) -> impl Iterator<Item = Result<PathBuf, ScanError>> + '_ {
        WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(move |entry| !self.is_excluded(entry.path()))
            .filter_map(move |entry| match entry {
                Ok(entry) if entry.file_type().is_file() => Some(Ok(entry.into_path())),
                Ok(_) => None,
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| self.root.clone(), Path::to_path_buf);
                    let scan_error = match e.io_error().map(io::Error::kind) {
                        Some(io::ErrorKind::PermissionDenied) => ScanError::PermissionDenied(path),
                        Some(io::ErrorKind::NotFound) => ScanError::NotFound(path),
                        _ => ScanError::Io {
                            path,
                            source: e
                                .into_io_error()
                                .unwrap_or_else(|| io::Error::other("filesystem loop")),
                        },
                    };
                    log::debug!("Walker: {}", scan_error);
                    Some(Err(scan_error))
                }
            })
    }
}
