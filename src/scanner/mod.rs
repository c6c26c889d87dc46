//! Scanner module for file hashing and traversal.
//!
//! This module provides functionality for:
//! - Content hashing with BLAKE3 or SHA-256
//! - Directory walking for the registration sweep
//! - Unicode-aware path comparison
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`hasher`]: streaming file hashing
//! - [`walker`]: directory traversal and file discovery
//! - [`path_utils`]: normalization and containment checks

pub mod hasher;
pub mod path_utils;
pub mod walker;

use std::path::PathBuf;

// Re-export main types
pub use hasher::{HashAlgorithm, HashError, Hasher};
pub use walker::Walker;

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}
