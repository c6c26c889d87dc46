//! Streaming content hasher.
//!
//! # Overview
//! This module provides the [`Hasher`] struct for computing the content hash
//! that identifies a registered file. Files are read in fixed-size chunks so
//! memory use stays flat regardless of file size.
//!
//! Only regular files are hashed. Symbolic links, directories, sockets and
//! other special files are refused before they are opened, so a watcher can
//! never be tricked into following a link out of the watched tree.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Read buffer size for streaming hashing.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Hash function used to derive a file's content identity.
///
/// The algorithm is fixed per deployment; every registry record stores the
/// name of the algorithm that produced its hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// BLAKE3 (default).
    #[default]
    Blake3,
    /// SHA-256.
    Sha256,
}

impl HashAlgorithm {
    /// Stable name stored in the registry's `hash_type` column.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Blake3 => "blake3",
            Self::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors raised while hashing a file.
///
/// Every variant is transient from the engine's point of view: the event
/// that triggered the hash is dropped and the watcher moves on.
#[derive(Debug, Error)]
pub enum HashError {
    /// The file disappeared before it could be read.
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// The file could not be opened for reading.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The path is a symlink, directory or special file.
    #[error("not a regular file: {0}")]
    NotRegularFile(PathBuf),

    /// Any other I/O failure.
    #[error("I/O error hashing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl HashError {
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

/// Streaming file hasher producing lowercase hex digests.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hasher {
    algorithm: HashAlgorithm,
}

impl Hasher {
    /// Create a hasher for the given algorithm.
    #[must_use]
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    /// The algorithm this hasher uses.
    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Hash the contents of a regular file.
    ///
    /// # Errors
    ///
    /// - `NotRegularFile` for symlinks and special files (checked without following links)
    /// - `NotFound` / `PermissionDenied` / `Io` for read failures
    pub fn hash_file(&self, path: &Path) -> Result<String, HashError> {
        let metadata = fs::symlink_metadata(path).map_err(|e| HashError::from_io(path, e))?;
        if !metadata.file_type().is_file() {
            return Err(HashError::NotRegularFile(path.to_path_buf()));
        }

        let file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let digest = match self.algorithm {
            HashAlgorithm::Blake3 => {
                let mut hasher = blake3::Hasher::new();
                stream(file, |chunk| {
                    hasher.update(chunk);
                })
                .map_err(|e| HashError::from_io(path, e))?;
                hasher.finalize().to_hex().to_string()
            }
            HashAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                stream(file, |chunk| hasher.update(chunk))
                    .map_err(|e| HashError::from_io(path, e))?;
                format!("{:x}", hasher.finalize())
            }
        };

        log::trace!("Hashed {} ({}): {}", path.display(), self.algorithm, digest);
        Ok(digest)
    }

    /// Hash an in-memory buffer.
    #[must_use]
    pub fn hash_bytes(&self, data: &[u8]) -> String {
        match self.algorithm {
            HashAlgorithm::Blake3 => blake3::hash(data).to_hex().to_string(),
            HashAlgorithm::Sha256 => format!("{:x}", Sha256::digest(data)),
        }
    }
}

fn stream<R: Read>(mut reader: R, mut sink: impl FnMut(&[u8])) -> io::Result<()> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => sink(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}
