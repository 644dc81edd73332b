//! Error types for the nightmode-core library.
//!
//! Every fallible operation in the crate returns [`CoreResult`]. There is no
//! distinction between transient and permanent tool failures: any unexpected
//! outcome from an external tool is reported once and ends the run. Progress
//! that was already made survives through the resume ledger.

use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Errors raised by the core library.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Directory traversal failed: {0}")]
    Walkdir(#[from] walkdir::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Required dependency '{0}' not found on the search path")]
    DependencyNotFound(String),

    #[error("Failed to start {0}: {1}")]
    CommandStart(String, std::io::Error),

    #[error("Failed while waiting for {0}: {1}")]
    CommandWait(String, std::io::Error),

    #[error("{command} failed ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Could not parse ffprobe output: {0}")]
    ProbeParse(String),

    #[error("No .mkv files found")]
    NoFilesFound,

    #[error("Job database '{0}' could not be found")]
    JobDatabaseNotFound(PathBuf),

    #[error("Invalid job for '{source_file}': {reason}")]
    InvalidJob { source_file: String, reason: String },

    #[error("Invalid track id '{0}'")]
    InvalidTrackId(String),

    #[error("Invalid resume state: {0}")]
    InvalidResumeState(String),

    #[error("Input not found: {0}")]
    InputNotFound(PathBuf),

    #[error("Peak of {path} reads {actual} dB after normalization, expected {expected} dB")]
    PeakMismatch {
        path: PathBuf,
        expected: f64,
        actual: f64,
    },

    #[error("Remuxed file failed verification: {0}")]
    VerificationFailed(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Aborted by operator before replacing {0}")]
    Aborted(PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

/// Result type for nightmode-core operations.
pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Builds a [`CoreError::CommandStart`], mapping "not found" to
/// [`CoreError::DependencyNotFound`].
pub fn command_start_error(command: impl Into<String>, err: std::io::Error) -> CoreError {
    let command = command.into();
    if err.kind() == std::io::ErrorKind::NotFound {
        CoreError::DependencyNotFound(command)
    } else {
        CoreError::CommandStart(command, err)
    }
}

pub fn command_wait_error(command: impl Into<String>, err: std::io::Error) -> CoreError {
    CoreError::CommandWait(command.into(), err)
}

pub fn command_failed_error(
    command: impl Into<String>,
    status: ExitStatus,
    stderr: impl Into<String>,
) -> CoreError {
    CoreError::CommandFailed {
        command: command.into(),
        status: status.to_string(),
        stderr: stderr.into(),
    }
}
