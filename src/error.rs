//! # Error Handling
//!
//! This module defines the error type shared by every part of the fetch
//! pipeline. It uses `thiserror` to build a single `Error` enum whose variants
//! line up with the stages a fetch goes through:
//!
//! - **`Validation`**: a required input was missing or malformed. Raised
//!   before any process is spawned or any directory is touched.
//! - **`Spawn`**: the external `git` binary could not be started.
//! - **`CloneFailed`**: `git` ran but exited with a non-zero status. The
//!   message carries the diagnostic lines `git` wrote to its error stream.
//! - **`Cancelled`**: the caller's cancellation token fired while the process
//!   was running.
//! - **`SubdirectoryNotFound`** and **`Copy`**: the extraction step of a
//!   subdirectory fetch failed.
//!
//! The orchestrator wraps errors in `Phase` so that the message tells the
//! user whether the clone or the extraction went wrong. `Error::root` and
//! `Error::is_cancelled` look through that wrapper.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// The stage of a fetch an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPhase {
    Validation,
    Clone,
    Extraction,
}

impl fmt::Display for FetchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FetchPhase::Validation => "validation",
            FetchPhase::Clone => "clone",
            FetchPhase::Extraction => "extraction",
        };
        f.write_str(name)
    }
}

/// Main error type for repo-fetch operations
#[derive(Error, Debug)]
pub enum Error {
    /// A required input was missing or invalid.
    #[error("Invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// The external process could not be started.
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The external process exited with a non-zero status.
    ///
    /// `message` holds the diagnostic output captured from the error stream.
    #[error("Git clone error for {url}@{r#ref} ({}): {message}{}",
        code.map(|c| format!("exit code {}", c)).unwrap_or_else(|| "terminated by signal".to_string()),
        hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    CloneFailed {
        url: String,
        r#ref: String,
        code: Option<i32>,
        message: String,
        /// Optional hint for how to resolve the clone issue
        hint: Option<String>,
    },

    /// The operation was cancelled before the process finished.
    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },

    /// The requested subdirectory does not exist in the checked-out tree.
    #[error("Subdirectory '{}' not found in {url}", path.display())]
    SubdirectoryNotFound { path: PathBuf, url: String },

    /// Copying the extracted tree to its destination failed.
    #[error("Failed to copy {} to {}: {source}", src.display(), dst.display())]
    Copy {
        src: PathBuf,
        dst: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An error annotated with the fetch phase it happened in.
    #[error("{phase} failed: {source}")]
    Phase {
        phase: FetchPhase,
        #[source]
        source: Box<Error>,
    },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wraps this error with the phase it occurred in.
    ///
    /// Errors that are already wrapped keep their original phase.
    pub fn in_phase(self, phase: FetchPhase) -> Self {
        match self {
            Error::Phase { .. } => self,
            other => Error::Phase {
                phase,
                source: Box::new(other),
            },
        }
    }

    /// Returns the innermost error, skipping any `Phase` wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::Phase { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns the phase this error was tagged with, if any.
    pub fn phase(&self) -> Option<FetchPhase> {
        match self {
            Error::Phase { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// True when the error came from a cancelled operation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), Error::Cancelled { .. })
    }

    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Error::Validation {
            field,
            message: message.into(),
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
