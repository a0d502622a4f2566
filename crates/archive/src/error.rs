//! Error types for archive packaging

use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for archive operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// The path handed to `pack` does not exist
    #[error("no such file or directory at target path: {path}")]
    #[diagnostic(
        code(stockpile::archive::target_not_found),
        help("The target path must exist before it can be cached")
    )]
    TargetNotFound {
        /// The missing target path
        path: PathBuf,
    },

    /// The path handed to `pack` is a directory with no entries
    #[error("nothing to cache: directory at target path is empty: {path}")]
    #[diagnostic(
        code(stockpile::archive::empty_target),
        help("Refusing to upload an empty archive; populate the directory first")
    )]
    EmptyTarget {
        /// The empty directory
        path: PathBuf,
    },

    /// I/O error while packing or extracting
    #[error("I/O {operation} failed: {}", path.display())]
    #[diagnostic(code(stockpile::archive::io))]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path involved in the failure
        path: Box<Path>,
        /// Operation that failed (e.g., "pack", "unpack")
        operation: String,
    },

    /// A blocking archive task was cancelled or panicked
    #[error("archive task did not complete: {message}")]
    #[diagnostic(code(stockpile::archive::interrupted))]
    Interrupted {
        /// Description of the join failure
        message: String,
    },
}

impl Error {
    /// Create a target-not-found error
    #[must_use]
    pub fn target_not_found(path: impl Into<PathBuf>) -> Self {
        Self::TargetNotFound { path: path.into() }
    }

    /// Create an empty-target error
    #[must_use]
    pub fn empty_target(path: impl Into<PathBuf>) -> Self {
        Self::EmptyTarget { path: path.into() }
    }

    /// Create an I/O error with path context
    #[must_use]
    pub fn io(source: std::io::Error, path: impl AsRef<Path>, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: path.as_ref().into(),
            operation: operation.into(),
        }
    }

    /// Create an interrupted-task error
    #[must_use]
    pub fn interrupted(message: impl Into<String>) -> Self {
        Self::Interrupted {
            message: message.into(),
        }
    }
}

/// Result type for archive operations
pub type Result<T> = std::result::Result<T, Error>;
