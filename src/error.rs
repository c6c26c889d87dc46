//! Exit codes and structured error output.

use serde::Serialize;

use crate::register::RegisterError;

/// Process exit codes.
///
/// - 0: success
/// - 1: general error
/// - 2: the requested record, file or directory does not exist
/// - 130: interrupted by Ctrl+C (normal end of `watch`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    NotFound = 2,
    Interrupted = 130,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "DW000",
            Self::GeneralError => "DW001",
            Self::NotFound => "DW002",
            Self::Interrupted => "DW130",
        }
    }

    /// Exit code for an error that escaped `run_app`.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<RegisterError>() {
            Some(RegisterError::NotADirectory(_) | RegisterError::InvalidSource(_)) => {
                Self::NotFound
            }
            _ => Self::GeneralError,
        }
    }
}

/// Error report printed with `--json-errors`.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// e.g. "DW001"
    pub code: String,
    pub exit_code: i32,
    pub message: String,
    /// Full `anyhow` context chain, outermost first.
    pub causes: Vec<String>,
}

impl StructuredError {
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: err.to_string(),
            causes: err.chain().skip(1).map(ToString::to_string).collect(),
        }
    }
}
