//! Alert record formatting.

use std::fmt::{self, Write};
use std::path::PathBuf;

use chrono::{DateTime, Local};

use crate::policy::{Violation, ViolationKind};

/// Result of the remediation attempted for a violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertOutcome {
    /// The stray copy was deleted.
    Deleted,
    /// The displaced original was moved back.
    Restored {
        /// Final location inside the allowed directory.
        target: PathBuf,
        /// Whether a suffix had to be added to avoid a collision.
        renamed: bool,
    },
    /// Deleting the stray copy failed; the file is untouched.
    DeleteFailed { error: String },
    /// Restoring the original failed; the file is untouched.
    RestoreFailed { target: PathBuf, error: String },
}

impl AlertOutcome {
    /// Whether the filesystem was changed as intended.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Deleted | Self::Restored { .. })
    }
}

/// One security alert: a classified violation plus what was done about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertRecord {
    pub timestamp: DateTime<Local>,
    /// Where the protected content was found.
    pub path: PathBuf,
    /// Registered base name of the protected file.
    pub filename: String,
    pub hash: String,
    pub kind: ViolationKind,
    pub outcome: AlertOutcome,
}

impl AlertRecord {
    /// Build a record for `violation`, stamped now.
    #[must_use]
    pub fn new(violation: &Violation, outcome: AlertOutcome) -> Self {
        Self {
            timestamp: Local::now(),
            path: violation.path.clone(),
            filename: violation.entry.filename.clone(),
            hash: violation.hash.clone(),
            kind: violation.kind,
            outcome,
        }
    }

    /// The single-line message written to the log and the live feed.
    ///
    /// Control characters (a newline in a file name, say) are escaped so a
    /// record always stays one line and one log block.
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    fn write_raw(&self, out: &mut String) -> fmt::Result {
        let verb = match self.kind {
            ViolationKind::Copy => "copied",
            ViolationKind::Move => "moved",
        };
        write!(
            out,
            "[{}] SECURITY ALERT ({}): {} was {} to {}. ",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.kind,
            self.filename,
            verb,
            self.path.display()
        )?;

        match &self.outcome {
            AlertOutcome::Deleted => write!(out, "Action taken: Deleted copy"),
            AlertOutcome::Restored { target, renamed } => {
                write!(out, "Action taken: Restored to {}", target.display())?;
                if *renamed {
                    write!(out, " (renamed to avoid collision)")?;
                }
                Ok(())
            }
            AlertOutcome::DeleteFailed { error } => {
                write!(out, "DELETE FAILED: {} - {}", self.path.display(), error)
            }
            AlertOutcome::RestoreFailed { target, error } => write!(
                out,
                "RESTORE FAILED: {} -> {} - {}",
                self.path.display(),
                target.display(),
                error
            ),
        }
    }
}

impl fmt::Display for AlertRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut raw = String::new();
        self.write_raw(&mut raw)?;
        for c in raw.chars() {
            if c.is_control() {
                write!(f, "{}", c.escape_default())?;
            } else {
                f.write_char(c)?;
            }
        }
        Ok(())
    }
}
