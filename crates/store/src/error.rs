//! Error types for object store backends

use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// Error type for object store operations.
///
/// A missing *key* is never an error; `get` reports it as `Ok(None)` so
/// callers can treat it as a cache miss. A missing *bucket* is an error.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// The addressed bucket does not exist
    #[error("bucket does not exist: {bucket}")]
    #[diagnostic(
        code(stockpile::store::bucket_not_found),
        help("Buckets are provisioned by the caller; create it before caching")
    )]
    BucketNotFound {
        /// The missing bucket name
        bucket: String,
    },

    /// The store is unreachable or failed mid-operation
    #[error("object store {operation} failed: {message}")]
    #[diagnostic(code(stockpile::store::transport))]
    Transport {
        /// Operation that failed (e.g., "put", "get")
        operation: String,
        /// Description of the failure
        message: String,
    },

    /// I/O error in a filesystem-backed store
    #[error("I/O {operation} failed: {}", path.display())]
    #[diagnostic(code(stockpile::store::io))]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path that caused the error
        path: Box<Path>,
        /// Operation that failed
        operation: String,
    },
}

impl Error {
    /// Create a bucket-not-found error
    #[must_use]
    pub fn bucket_not_found(bucket: impl Into<String>) -> Self {
        Self::BucketNotFound {
            bucket: bucket.into(),
        }
    }

    /// Create a transport error
    #[must_use]
    pub fn transport(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: message.into(),
        }
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
}

/// Result type for object store operations
pub type Result<T> = std::result::Result<T, Error>;
