//! Remediation actions.
//!
//! This module provides functionality for:
//! - Deleting stray copies of protected content
//! - Restoring displaced originals to their allowed directory
//! - Collision-safe renaming during restore
//!
//! # Remediation
//!
//! ```no_run
//! use dlpwatch::actions::{DeleteMode, Remediator};
//! # fn demo(cache: std::sync::Arc<dlpwatch::registry::RegistryCache>, violation: dlpwatch::policy::Violation) {
//! let remediator = Remediator::new(cache, DeleteMode::Permanent);
//! let outcome = remediator.remediate(&violation);
//! println!("{outcome:?}");
//! # }
//! ```

pub mod delete;
pub mod remediate;

// Re-export commonly used types
pub use delete::{delete_file, is_in_trash, trash_dirs, DeleteError, DeleteMode};
pub use remediate::{move_file, resolve_restore_target, RemediationError, Remediator};
