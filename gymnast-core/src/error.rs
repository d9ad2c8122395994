// ============================================================================
// gymnast-core/src/error.rs
// ============================================================================
//
// ERROR HANDLING: Pipeline Error Types
//
// Errors raised by discovery, media probing, parameter selection and the
// ffmpeg process seam. Bus errors are wrapped rather than flattened so callers
// can still tell a configuration failure from a handler failure.
//
// KEY COMPONENTS:
// - CoreError: error enum for everything outside the bus
// - CoreResult: result alias used across the crate
// - command_* helpers: uniform errors for external process failures

use crate::bus::BusError;

use std::io;
use std::path::Path;
use std::process::ExitStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Path error: {0}")]
    PathError(String),

    #[error("No processable video files found in the input directory")]
    NoFilesFound,

    #[error("Failed to start {0}: {1}")]
    CommandStart(String, #[source] io::Error),

    #[error("Failed to wait for {0}: {1}")]
    CommandWait(String, #[source] io::Error),

    #[error("{0} exited with {1}: {2}")]
    CommandFailed(String, ExitStatus, String),

    #[error("Failed to read media info for {path}: {reason}")]
    Probe { path: String, reason: String },

    #[error("Invalid {field} value: {value:?}")]
    InvalidMediaValue { field: &'static str, value: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("{0}")]
    OperationFailed(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

pub fn command_start_error(cmd: impl Into<String>, err: io::Error) -> CoreError {
    CoreError::CommandStart(cmd.into(), err)
}

pub fn command_wait_error(cmd: impl Into<String>, err: io::Error) -> CoreError {
    CoreError::CommandWait(cmd.into(), err)
}

pub fn command_failed_error(
    cmd: impl Into<String>,
    status: ExitStatus,
    stderr: impl Into<String>,
) -> CoreError {
    CoreError::CommandFailed(cmd.into(), status, stderr.into())
}

pub fn probe_error(path: &Path, reason: impl Into<String>) -> CoreError {
    CoreError::Probe {
        path: path.display().to_string(),
        reason: reason.into(),
    }
}
