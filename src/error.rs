//! Structured error handling and exit codes.

use std::path::PathBuf;

use serde::Serialize;

use crate::actions::ActionError;
use crate::scanner::ScanError;

/// Exit codes for the packrat application.
///
/// - 0: Success (including already-packed and not-packed no-ops)
/// - 1: Invalid arguments or malformed input
/// - 2: A folder does not exist
/// - 3: A file does not exist
/// - 4: The operation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: the operation completed or had nothing to do.
    Success = 0,
    /// Invalid arguments: the command line or an input was rejected.
    InvalidArguments = 1,
    /// Folder not found: a folder argument does not exist.
    FolderNotFound = 2,
    /// File not found: a file argument does not exist.
    FileNotFound = 3,
    /// Operation failed: an I/O or manifest error occurred.
    OperationFailed = 4,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "PR000",
            Self::InvalidArguments => "PR001",
            Self::FolderNotFound => "PR002",
            Self::FileNotFound => "PR003",
            Self::OperationFailed => "PR004",
        }
    }

    /// Pick the exit code for an application error.
    ///
    /// Walks the error chain and classifies the first error it recognizes;
    /// anything unrecognized is an operation failure.
    #[must_use]
    pub fn from_error(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if let Some(e) = cause.downcast_ref::<InputError>() {
                return match e {
                    InputError::FolderNotFound(_) => Self::FolderNotFound,
                    InputError::FileNotFound(_) => Self::FileNotFound,
                    InputError::Invalid(_) => Self::InvalidArguments,
                };
            }
            if let Some(e) = cause.downcast_ref::<ActionError>() {
                return match e {
                    ActionError::FolderNotFound(_) => Self::FolderNotFound,
                    ActionError::NotADirectory(_)
                    | ActionError::OverlappingFolders { .. }
                    | ActionError::ReservedPath(_) => Self::InvalidArguments,
                    _ => Self::OperationFailed,
                };
            }
            if let Some(e) = cause.downcast_ref::<ScanError>() {
                return match e {
                    ScanError::NotFound(_) => Self::FolderNotFound,
                    ScanError::NotADirectory(_)
                    | ScanError::InvalidPattern { .. }
                    | ScanError::PatternOutsideBase(_) => Self::InvalidArguments,
                    ScanError::Io { .. } => Self::OperationFailed,
                };
            }
        }
        Self::OperationFailed
    }
}

/// Problems with the user's input detected before any work starts.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    /// A folder argument does not exist.
    #[error("Folder not found: {0}")]
    FolderNotFound(PathBuf),

    /// A file argument does not exist.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// An argument was rejected.
    #[error("{0}")]
    Invalid(String),
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "PR002")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{:#}", err),
        }
    }
}
