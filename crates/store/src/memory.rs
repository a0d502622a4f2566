//! In-memory object store for tests and dry runs

use crate::error::{Error, Result};
use crate::{ByteStream, ObjectStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Cursor;
use tokio::io::AsyncReadExt;
use tokio::sync::Mutex;
use tracing::debug;

/// Object store backed by a process-local map.
///
/// Buckets must be created explicitly, mirroring real object stores where
/// bucket provisioning is a separate concern from cache writes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    buckets: Mutex<HashMap<String, HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    /// Create an empty store with no buckets
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with a single pre-provisioned bucket
    #[must_use]
    pub fn with_bucket(bucket: impl Into<String>) -> Self {
        Self {
            buckets: Mutex::new(HashMap::from([(bucket.into(), HashMap::new())])),
        }
    }

    /// Provision a bucket
    pub async fn create_bucket(&self, bucket: impl Into<String>) {
        self.buckets
            .lock()
            .await
            .entry(bucket.into())
            .or_default();
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, bucket: &str, key: &str, mut body: ByteStream) -> Result<()> {
        let mut bytes = Vec::new();
        body.read_to_end(&mut bytes)
            .await
            .map_err(|e| Error::transport("put", e.to_string()))?;

        let mut buckets = self.buckets.lock().await;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| Error::bucket_not_found(bucket))?;
        debug!(bucket, key, bytes = bytes.len(), "stored object in memory");
        objects.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Option<ByteStream>> {
        let buckets = self.buckets.lock().await;
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| Error::bucket_not_found(bucket))?;
        Ok(objects
            .get(key)
            .cloned()
            .map(|bytes| Box::pin(Cursor::new(bytes)) as ByteStream))
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        Ok(self.buckets.lock().await.contains_key(bucket))
    }
}
