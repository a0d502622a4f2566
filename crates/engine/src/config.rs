//! Configuration for the cache engine

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for a [`CacheEngine`](crate::CacheEngine)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Bucket all cache entries are stored under.
    ///
    /// Provisioning and credentials are the caller's responsibility; the
    /// engine only validates that a bucket name is present.
    pub bucket: String,

    /// Directory relative path-like key tokens are resolved against
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,
}

impl EngineConfig {
    /// Create a config with the given bucket and the default working dir
    #[must_use]
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            working_dir: default_working_dir(),
        }
    }
}

// Default value functions
fn default_working_dir() -> PathBuf {
    PathBuf::from(".")
}
