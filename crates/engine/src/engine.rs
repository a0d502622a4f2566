//! Cache engine orchestration: store and fetch
//!
//! One logical flow per call, no internal retries and no local entry
//! cache; every fetch is a live store round-trip. Retry and timeout policy
//! belong to the pipeline orchestrator. Concurrent calls on different keys
//! are independent; same-key races are the caller's to serialize.

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::relocate::EnvironmentRelocator;
use crate::request::{FetchOutcome, FetchReport, FetchRequest, StoreReceipt, StoreRequest};
use std::path::Path;
use stockpile_store::{ByteStream, ObjectStore};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Orchestrates key-addressed archive storage against an object store
pub struct CacheEngine<S> {
    object_store: S,
    config: EngineConfig,
    relocator: EnvironmentRelocator,
}

impl<S: ObjectStore> CacheEngine<S> {
    /// Create an engine over `object_store` with the default relocator
    pub fn new(object_store: S, config: EngineConfig) -> Self {
        Self {
            object_store,
            config,
            relocator: EnvironmentRelocator::default(),
        }
    }

    /// Replace the relocator (e.g., to supply a custom file-type probe)
    #[must_use]
    pub fn with_relocator(mut self, relocator: EnvironmentRelocator) -> Self {
        self.relocator = relocator;
        self
    }

    /// The engine's configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Derive a cache key from a key expression, resolving path-like
    /// tokens against the configured working directory
    pub fn derive_key(&self, expression: &str) -> Result<String> {
        Ok(stockpile_keys::derive(expression, &self.config.working_dir)?)
    }

    /// Package `target` and upload it under `key`.
    ///
    /// Key and bucket validation runs before any filesystem access; the
    /// ordering is part of the contract. Packaging errors (missing target,
    /// empty directory) and store errors propagate unchanged.
    pub async fn store(&self, target: &Path, key: &str) -> Result<StoreReceipt> {
        if key.trim().is_empty() {
            return Err(Error::MissingKey);
        }
        if self.config.bucket.trim().is_empty() {
            return Err(Error::MissingBucket);
        }

        let archive = stockpile_archive::pack(target)?;
        let body: ByteStream = Box::pin(archive);
        self.object_store
            .put(&self.config.bucket, key, body)
            .await?;

        info!(
            bucket = %self.config.bucket,
            key,
            target = %target.display(),
            "stored cache entry"
        );
        Ok(StoreReceipt {
            bucket: self.config.bucket.clone(),
            key: key.to_string(),
        })
    }

    /// Look up `key` and, on a hit, restore the archive into
    /// `destination` and relocate any captured environment inside it.
    ///
    /// An absent key is a normal [`FetchOutcome::Miss`]; any other store
    /// failure (unknown bucket, transport) is a fatal error, as is a
    /// relocation failure.
    pub async fn fetch(&self, key: &str, destination: &Path) -> Result<FetchOutcome> {
        debug!(bucket = %self.config.bucket, key, "requesting cache entry");
        let Some(stream) = self.object_store.get(&self.config.bucket, key).await? else {
            info!(key, "cache miss");
            return Ok(FetchOutcome::Miss);
        };

        // Relocation embeds the destination in shebang lines, so resolve
        // it before extracting.
        let destination = std::path::absolute(destination)
            .map_err(|e| Error::io(e, destination, "absolute"))?;
        let bytes_transferred = stockpile_archive::extract(stream, &destination).await?;
        let relocation_applied = self.relocator.maybe_fix(&destination)?;
        let bytes_extracted = tree_size(&destination)?;

        info!(
            key,
            transferred = %human_bytes(bytes_transferred),
            extracted = %human_bytes(bytes_extracted),
            relocation_applied,
            "cache hit"
        );
        Ok(FetchOutcome::Hit(FetchReport {
            bytes_transferred,
            bytes_extracted,
            relocation_applied,
        }))
    }

    /// Handle a front-end store request
    pub async fn handle_store(&self, request: &StoreRequest) -> Result<StoreReceipt> {
        self.store(&request.target_path, &request.cache_key).await
    }

    /// Handle a front-end fetch request
    pub async fn handle_fetch(&self, request: &FetchRequest) -> Result<FetchOutcome> {
        self.fetch(&request.cache_key, &request.destination).await
    }
}

/// Summed length of all regular files under `root`
fn tree_size(root: &Path) -> Result<u64> {
    let mut total = 0u64;
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| Error::io(e.into(), root, "walk"))?;
        if entry.file_type().is_file() {
            total += entry
                .metadata()
                .map_err(|e| Error::io(e.into(), entry.path(), "stat"))?
                .len();
        }
    }
    Ok(total)
}

/// Format a byte count for humans, 1024-based with one decimal
#[must_use]
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use stockpile_store::MemoryStore;
    use tempfile::TempDir;

    fn engine() -> CacheEngine<MemoryStore> {
        CacheEngine::new(
            MemoryStore::with_bucket("artifacts"),
            EngineConfig::new("artifacts"),
        )
    }

    #[tokio::test]
    async fn store_then_fetch_round_trips_the_tree() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("build-out");
        fs::create_dir_all(src.join("lib")).unwrap();
        fs::write(src.join("app.bin"), "binary-ish").unwrap();
        fs::write(src.join("lib/helper.so"), "also binary-ish").unwrap();

        let engine = engine();
        let receipt = engine.store(&src, "aa/bb/cc").await.unwrap();
        assert_eq!(receipt.bucket, "artifacts");
        assert_eq!(receipt.key, "aa/bb/cc");

        let dest = temp.path().join("restored");
        let outcome = engine.fetch("aa/bb/cc", &dest).await.unwrap();
        let FetchOutcome::Hit(report) = outcome else {
            panic!("expected a hit");
        };
        assert!(report.bytes_transferred > 0);
        assert_eq!(
            report.bytes_extracted,
            ("binary-ish".len() + "also binary-ish".len()) as u64
        );
        assert!(!report.relocation_applied);

        assert_eq!(fs::read_to_string(dest.join("app.bin")).unwrap(), "binary-ish");
        assert_eq!(
            fs::read_to_string(dest.join("lib/helper.so")).unwrap(),
            "also binary-ish"
        );
    }

    #[tokio::test]
    async fn unknown_key_is_a_miss_not_an_error() {
        let temp = TempDir::new().unwrap();
        let outcome = engine()
            .fetch("never/stored", &temp.path().join("dest"))
            .await
            .unwrap();
        assert_eq!(outcome, FetchOutcome::Miss);
        assert!(!outcome.is_hit());
    }

    #[tokio::test]
    async fn empty_key_fails_before_filesystem_checks() {
        // the target does not exist either; key validation must win
        let err = engine()
            .store(Path::new("/no/such/target"), "")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingKey));
    }

    #[tokio::test]
    async fn empty_bucket_fails_before_filesystem_checks() {
        let engine = CacheEngine::new(MemoryStore::new(), EngineConfig::new(""));
        let err = engine
            .store(Path::new("/no/such/target"), "some-key")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingBucket));
    }

    #[tokio::test]
    async fn missing_target_is_fatal_to_store() {
        let err = engine()
            .store(Path::new("/no/such/target"), "key")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Archive(stockpile_archive::Error::TargetNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn empty_directory_is_fatal_to_store() {
        let temp = TempDir::new().unwrap();
        let empty = temp.path().join("empty");
        fs::create_dir(&empty).unwrap();

        let err = engine().store(&empty, "key").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Archive(stockpile_archive::Error::EmptyTarget { .. })
        ));
    }

    #[tokio::test]
    async fn unknown_bucket_surfaces_as_store_error() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("file.txt"), "x").unwrap();

        let engine = CacheEngine::new(MemoryStore::new(), EngineConfig::new("ghost"));
        let err = engine
            .store(&temp.path().join("file.txt"), "key")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Store(stockpile_store::Error::BucketNotFound { .. })
        ));

        let err = engine
            .fetch("key", &temp.path().join("dest"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Store(stockpile_store::Error::BucketNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn fetched_venv_is_relocated_to_its_new_home() {
        let temp = TempDir::new().unwrap();
        let captured = temp.path().join("venv");
        fs::create_dir_all(captured.join("bin")).unwrap();
        fs::write(captured.join("bin/python"), [0x7f, b'E', b'L', b'F', 0]).unwrap();
        fs::write(
            captured.join("bin/wait_for_dns"),
            "#!/old/path/bin/python\nimport socket\n",
        )
        .unwrap();

        let engine = engine();
        engine.store(&captured, "venv-key").await.unwrap();

        let dest = temp.path().join("new-home");
        let outcome = engine.fetch("venv-key", &dest).await.unwrap();
        let FetchOutcome::Hit(report) = outcome else {
            panic!("expected a hit");
        };
        assert!(report.relocation_applied);

        let dest_abs = std::path::absolute(&dest).unwrap();
        let contents = fs::read_to_string(dest.join("bin/wait_for_dns")).unwrap();
        assert_eq!(
            contents.lines().next().unwrap(),
            format!("#!{}/bin/python", dest_abs.display())
        );
    }

    #[tokio::test]
    async fn front_end_requests_delegate() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("artifact"), "payload").unwrap();

        let engine = engine();
        engine
            .handle_store(&StoreRequest {
                target_path: temp.path().join("artifact"),
                cache_key: "req-key".to_string(),
            })
            .await
            .unwrap();

        let outcome = engine
            .handle_fetch(&FetchRequest {
                cache_key: "req-key".to_string(),
                destination: temp.path().join("dest"),
            })
            .await
            .unwrap();
        assert!(outcome.is_hit());
        assert_eq!(
            fs::read_to_string(temp.path().join("dest/artifact")).unwrap(),
            "payload"
        );
    }

    #[tokio::test]
    async fn derive_key_resolves_against_configured_working_dir() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("lockfile"), "deps").unwrap();

        let config = EngineConfig {
            bucket: "artifacts".to_string(),
            working_dir: temp.path().to_path_buf(),
        };
        let engine = CacheEngine::new(MemoryStore::with_bucket("artifacts"), config);

        let key = engine.derive_key("\"linux\"\nlockfile").unwrap();
        assert_eq!(key.split('/').count(), 2);

        // file-backed segment tracks content
        fs::write(temp.path().join("lockfile"), "new deps").unwrap();
        let changed = engine.derive_key("\"linux\"\nlockfile").unwrap();
        assert_ne!(key, changed);
        assert_eq!(
            key.split('/').next().unwrap(),
            changed.split('/').next().unwrap()
        );
    }

    #[test]
    fn human_bytes_formatting() {
        assert_eq!(human_bytes(0), "0 B");
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(2048), "2.0 KB");
        assert_eq!(human_bytes(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(human_bytes(1536), "1.5 KB");
    }
}
