//! Error types for key derivation

use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// Error type for key derivation operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// I/O error while hashing a file token
    #[error("I/O {operation} failed: {}", path.display())]
    #[diagnostic(
        code(stockpile::keys::io),
        help("Check file permissions and ensure the path exists")
    )]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path that caused the error
        path: Box<Path>,
        /// Operation that failed (e.g., "open", "read")
        operation: String,
    },
}

impl Error {
    /// Create an I/O error with path context
    #[must_use]
    pub fn io(source: std::io::Error, path: impl AsRef<Path>, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: path.as_ref().into(),
            operation: operation.into(),
        }
    }
}

/// Result type for key derivation operations
pub type Result<T> = std::result::Result<T, Error>;
