//! Filesystem-backed object store
//!
//! Lays buckets out as subdirectories of a root: the object for
//! `(bucket, key)` lives at `<root>/<bucket>/<key>`, with `/` segments of
//! the key becoming nested directories. Buckets must exist up front; keys
//! appear and disappear with puts, like any object store.

use crate::error::{Error, Result};
use crate::{ByteStream, ObjectStore};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Object store rooted at a local directory
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Create a store rooted at `root`.
    ///
    /// The root itself is not created here; provisioning the root and its
    /// buckets is the caller's responsibility, mirroring remote stores.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn bucket_dir(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.bucket_dir(bucket).join(key)
    }

    async fn require_bucket(&self, bucket: &str) -> Result<()> {
        let dir = self.bucket_dir(bucket);
        match fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(Error::bucket_not_found(bucket)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::bucket_not_found(bucket))
            }
            Err(e) => Err(Error::io(e, &dir, "stat")),
        }
    }
}

#[async_trait]
impl ObjectStore for FsStore {
    async fn put(&self, bucket: &str, key: &str, mut body: ByteStream) -> Result<()> {
        self.require_bucket(bucket).await?;

        let path = self.object_path(bucket, key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io(e, parent, "create_dir_all"))?;
        }

        // Stream into a partial file, then rename so readers never observe
        // a half-written object. The suffix is appended to the whole file
        // name; `with_extension` would truncate keys like `v1.2` down to
        // `v1.partial` and collide across distinct keys.
        let partial = {
            let mut name = path.as_os_str().to_os_string();
            name.push(".partial");
            PathBuf::from(name)
        };
        let mut file = fs::File::create(&partial)
            .await
            .map_err(|e| Error::io(e, &partial, "create"))?;
        let bytes = tokio::io::copy(&mut body, &mut file)
            .await
            .map_err(|e| Error::io(e, &partial, "write"))?;
        file.flush()
            .await
            .map_err(|e| Error::io(e, &partial, "flush"))?;
        drop(file);

        fs::rename(&partial, &path)
            .await
            .map_err(|e| Error::io(e, &path, "rename"))?;
        debug!(bucket, key, bytes, "stored object on disk");
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Option<ByteStream>> {
        self.require_bucket(bucket).await?;

        let path = self.object_path(bucket, key);
        match fs::File::open(&path).await {
            Ok(file) => Ok(Some(Box::pin(file) as ByteStream)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(e, &path, "open")),
        }
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match fs::metadata(self.bucket_dir(bucket)).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::io(e, self.bucket_dir(bucket), "stat")),
        }
    }
}
