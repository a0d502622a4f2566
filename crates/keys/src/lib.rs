//! Deterministic cache key derivation for stockpile
//!
//! Turns a human-authored, newline-delimited key expression into a
//! content-sensitive cache key:
//! - tokens are classified as literal or path-like from their text alone
//! - path-like tokens that resolve to a regular file are hashed by content
//! - every other token is hashed as a string
//! - per-token digests are joined with `/`, preserving token order
//!
//! Re-running derivation with unchanged inputs and unchanged file contents
//! always yields the same key, so CI pipelines can use it to decide whether
//! a cached artifact is still valid.

mod error;

pub mod derive;
pub mod hash;

pub use derive::{derive, derive_flat, is_pathy_token};
pub use error::{Error, Result};
pub use hash::{digest_file, digest_string};
