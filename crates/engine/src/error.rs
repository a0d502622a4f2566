//! Error taxonomy for cache engine operations
//!
//! Every failure mode is a distinct, typed outcome so the pipeline can
//! decide between failing the build and treating it as a cold-cache run.
//! A cache miss is deliberately *not* here: it is a normal fetch outcome,
//! not an error.

use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// Error type for cache engine operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// The caller supplied an empty cache key
    #[error("missing required cache key")]
    #[diagnostic(
        code(stockpile::engine::missing_key),
        help("Derive a key with stockpile-keys before calling store/fetch")
    )]
    MissingKey,

    /// The engine was configured without a bucket
    #[error("missing required bucket name")]
    #[diagnostic(
        code(stockpile::engine::missing_bucket),
        help("Set `bucket` in the engine configuration")
    )]
    MissingBucket,

    /// Archive packaging or extraction failed
    #[error(transparent)]
    #[diagnostic(transparent)]
    Archive(#[from] stockpile_archive::Error),

    /// The object store failed (unknown bucket, transport)
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] stockpile_store::Error),

    /// Key derivation failed
    #[error(transparent)]
    #[diagnostic(transparent)]
    Keys(#[from] stockpile_keys::Error),

    /// A restored environment could not be relocated.
    ///
    /// Always fatal: a half-rewritten environment is worse than a failed
    /// restore.
    #[error("relocation failed at {}", path.display())]
    #[diagnostic(code(stockpile::engine::relocation))]
    Relocation {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// File or directory being rewritten
        path: Box<Path>,
    },

    /// I/O error during post-fetch diagnostics
    #[error("I/O {operation} failed: {}", path.display())]
    #[diagnostic(code(stockpile::engine::io))]
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
    /// Create a relocation error with path context
    #[must_use]
    pub fn relocation(source: std::io::Error, path: impl AsRef<Path>) -> Self {
        Self::Relocation {
            source,
            path: path.as_ref().into(),
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

/// Result type for cache engine operations
pub type Result<T> = std::result::Result<T, Error>;
