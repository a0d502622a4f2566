//! Cache engine orchestration for stockpile
//!
//! Ties the pieces together for CI pipelines that want to skip build steps
//! when nothing changed:
//! - `store(target, key)` packages a file or directory as a streaming tar
//!   archive and uploads it to the configured object store bucket
//! - `fetch(key, destination)` downloads and extracts an entry, reporting
//!   a miss as a first-class outcome rather than an error
//! - restored Python virtual environments are relocated so they work at
//!   their new absolute path
//!
//! The engine performs no retries, holds no local state between calls and
//! never coordinates concurrent writers on the same key; those policies
//! belong to the pipeline orchestrator.

mod config;
mod engine;
mod error;
pub mod relocate;
mod request;

pub use config::EngineConfig;
pub use engine::{CacheEngine, human_bytes};
pub use error::{Error, Result};
pub use relocate::{EnvironmentRelocator, FileTypeProbe, HeadSniffProbe};
pub use request::{FetchOutcome, FetchReport, FetchRequest, StoreReceipt, StoreRequest};
