//! Object store interface and local backends for stockpile
//!
//! The cache engine talks to durable blob storage through the narrow
//! [`ObjectStore`] trait: put a stream under `(bucket, key)`, get it back,
//! ask whether a bucket exists. A missing key is an `Ok(None)` from `get`
//! (the cache-miss signal), never an error; a missing bucket is an error.
//!
//! Two backends ship with the crate: [`MemoryStore`] for tests and dry
//! runs, and [`FsStore`] for a directory-per-bucket layout on local disk.
//! Cloud-backed stores are a consumer plug-in point via the same trait.

mod error;
mod fs;
mod memory;

pub use error::{Error, Result};
pub use fs::FsStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use std::pin::Pin;
use tokio::io::AsyncRead;

/// A single-consumer stream of archive bytes
pub type ByteStream = Pin<Box<dyn AsyncRead + Send>>;

/// Durable key/value blob storage addressed by `(bucket, key)`
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `body` under `(bucket, key)`, consuming the stream.
    ///
    /// Overwrites any existing object at the same address.
    async fn put(&self, bucket: &str, key: &str, body: ByteStream) -> Result<()>;

    /// Retrieve the object at `(bucket, key)`.
    ///
    /// Returns `Ok(None)` when the key is absent; errors are reserved for
    /// missing buckets and transport failures.
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<ByteStream>>;

    /// Whether `bucket` exists
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;
}
