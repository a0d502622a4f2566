//! Payloads exchanged with the pipeline front-end
//!
//! The front-end owns wire formats and orchestrator variables; the engine
//! only promises serde-friendly shapes. Whether a restore happened is an
//! explicit field of the outcome, never ambient state.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Request to capture a path into the cache
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreRequest {
    /// File or directory to package and upload
    pub target_path: PathBuf,
    /// Derived cache key to store under
    pub cache_key: String,
}

/// Request to restore a cache entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FetchRequest {
    /// Derived cache key to look up
    pub cache_key: String,
    /// Directory to extract into
    pub destination: PathBuf,
}

/// Acknowledgement of a completed store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreReceipt {
    /// Bucket the entry was written to
    pub bucket: String,
    /// Key the entry was written under
    pub key: String,
}

/// Diagnostics for a successful restore
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FetchReport {
    /// Archive bytes consumed from the store
    pub bytes_transferred: u64,
    /// On-disk size of the restored tree
    pub bytes_extracted: u64,
    /// Whether environment relocation rewrote any file
    pub relocation_applied: bool,
}

/// Outcome of a fetch: a miss is a first-class result, not an error
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FetchOutcome {
    /// No entry exists for the key
    Miss,
    /// The entry was restored into the destination
    Hit(FetchReport),
}

impl FetchOutcome {
    /// Whether the fetch restored an entry
    #[must_use]
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }
}
