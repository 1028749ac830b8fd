//! Error types
//!
//! Only setup and persistence problems are fatal for a run. Everything that
//! goes wrong with a single file is carried as a plain reason string inside
//! the report instead (see `extract::ExtractionFailure`).

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors that abort a report run
#[derive(Debug, Error)]
pub enum ReportError {
    /// Input root is missing or not a directory
    #[error("Invalid input directory '{}': {reason}", path.display())]
    InvalidInput { path: PathBuf, reason: String },

    /// Destination cannot be written (missing parent, not writable)
    #[error("Invalid output path '{}': {reason}", path.display())]
    InvalidOutput { path: PathBuf, reason: String },

    /// Final document could not be written or moved into place
    #[error("Failed to persist report to '{}': {reason}", path.display())]
    Persist { path: PathBuf, reason: String },

    /// Other I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReportError {
    /// Whether the error happened before any file was processed
    pub fn is_setup(&self) -> bool {
        matches!(self, Self::InvalidInput { .. } | Self::InvalidOutput { .. })
    }
}

/// Error from an external collaborator (renderer, converter, parser)
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// The PDF could not be parsed
    #[error("corrupt PDF: {0}")]
    CorruptPdf(String),

    /// The PDF requires a password
    #[error("password-protected PDF")]
    PasswordProtected,

    /// The PDF has no pages to render
    #[error("zero-page document")]
    ZeroPages,

    /// A helper program is not installed or could not be started
    #[error("{program} is not available: {reason}")]
    ToolUnavailable { program: String, reason: String },

    /// A helper program ran but reported failure
    #[error("{program} failed: {reason}")]
    ToolFailed { program: String, reason: String },

    /// Anything else the collaborator reported
    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for CollaboratorError {
    fn from(err: std::io::Error) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<CollaboratorError> for String {
    fn from(err: CollaboratorError) -> Self {
        err.to_string()
    }
}
