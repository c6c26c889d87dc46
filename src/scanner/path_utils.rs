//! Path comparison helpers.
//!
//! Policy decisions hinge on "is this file inside that directory?". Two
//! spellings of the same directory must compare equal, so every comparison
//! here goes through NFC normalization first.
//!
//! # Background
//!
//! macOS uses NFD (Decomposed) normalization for file paths, while Windows
//! and Linux typically use NFC (Composed) normalization. The same visual
//! directory name can therefore arrive from the OS in either form:
//!
//! - NFC: `café` - 'é' is U+00E9 (single code point)
//! - NFD: `café` - 'e' U+0065 + combining acute accent U+0301
//!
//! # Example
//!
//! ```
//! use dlpwatch::scanner::path_utils::is_within;
//! use std::path::Path;
//!
//! assert!(is_within(Path::new("/secure/cafe\u{0301}/q1"), Path::new("/secure/café")));
//! assert!(!is_within(Path::new("/secure-old"), Path::new("/secure")));
//! ```

use std::path::{Component, Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// Normalize a path string to NFC (Composed) form.
#[must_use]
pub fn normalize_path_str(s: &str) -> String {
    s.nfc().collect()
}

/// Normalize a path to NFC form and resolve `.` / `..` components lexically.
///
/// The filesystem is never consulted. Paths containing invalid UTF-8 keep
/// their original bytes and only get the lexical cleanup.
#[must_use]
pub fn normalize_pathbuf(path: &Path) -> PathBuf {
    let nfc = match path.to_str() {
        Some(s) => PathBuf::from(normalize_path_str(s)),
        None => path.to_path_buf(),
    };

    let mut out = PathBuf::new();
    for component in nfc.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Check whether `path` equals `base` or lies anywhere beneath it.
///
/// Matching is per component, so `/secure-old` is not inside `/secure`.
/// If the lexical comparison fails, both sides are canonicalized and
/// compared again, which catches symlinked prefixes such as macOS's
/// `/var` -> `/private/var`.
#[must_use]
pub fn is_within(path: &Path, base: &Path) -> bool {
    if normalize_pathbuf(path).starts_with(normalize_pathbuf(base)) {
        return true;
    }

    match (path.canonicalize(), base.canonicalize()) {
        (Ok(p), Ok(b)) => normalize_pathbuf(&p).starts_with(normalize_pathbuf(&b)),
        _ => false,
    }
}

/// Check if two [`Path`]s are equal after normalization.
#[must_use]
pub fn paths_equal_normalized(a: &Path, b: &Path) -> bool {
    normalize_pathbuf(a) == normalize_pathbuf(b)
}

/// Create a normalized comparison key for a path.
///
/// Useful as a HashMap key or hash input where Unicode normalization
/// differences should not matter. Invalid UTF-8 is converted lossily.
#[must_use]
pub fn path_key(path: &Path) -> String {
    normalize_path_str(&path.to_string_lossy())
}

/// Lowercased extension of a path without the leading dot.
#[must_use]
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| normalize_path_str(&ext.to_string_lossy()).to_lowercase())
}

/// Build the `n`-th collision-free candidate name for `filename`.
///
/// The suffix goes between the stem and the final extension:
/// `report.pdf` -> `report_1.pdf`, `archive.tar.gz` -> `archive.tar_1.gz`,
/// `Makefile` -> `Makefile_1`. `n == 0` returns the name unchanged.
#[must_use]
pub fn suffixed_name(filename: &str, n: usize) -> String {
    if n == 0 {
        return filename.to_string();
    }

    let path = Path::new(filename);
    let stem = path.file_stem().map(|s| s.to_string_lossy());
    let ext = path.extension().map(|e| e.to_string_lossy());

    match (stem, ext) {
        (Some(stem), Some(ext)) => format!("{stem}_{n}.{ext}"),
        (Some(stem), None) => format!("{stem}_{n}"),
        _ => format!("{filename}_{n}"),
    }
}
