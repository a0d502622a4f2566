//! Deriving cache keys from composite key expressions
//!
//! A key expression is a newline-delimited list of tokens authored by the
//! pipeline. Each token is either literal text or something that looks like
//! a filesystem path. Path-like tokens that resolve to a regular file are
//! digested by content, so the derived key changes whenever the file does;
//! everything else is digested as a string.

use crate::error::Result;
use crate::hash::{digest_file, digest_string};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Whether a character can appear in a path-like token.
///
/// Control characters and the characters that are invalid in file names on
/// every supported platform (`"`, `<`, `>`, `|`) disqualify a token; glob
/// wildcards and path separators are fine.
fn is_pathy_char(c: char) -> bool {
    if c.is_control() {
        return false;
    }
    !matches!(c, '"' | '<' | '>' | '|')
}

/// Classify a token as path-like or literal.
///
/// Classification is a pure function of the token text; the filesystem is
/// only consulted later to pick file-hash vs string-hash for path-like
/// tokens. A token is literal when it is wrapped in double quotes (the
/// author's "treat me literally" signal), contains a disqualifying
/// character, mixes `.`, `/` and `\` at once (ambiguous), or ends with a
/// dot.
#[must_use]
pub fn is_pathy_token(token: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    if token.starts_with('"') && token.ends_with('"') {
        return false;
    }
    if token.chars().any(|c| !is_pathy_char(c)) {
        return false;
    }
    if token.contains('.') && token.contains('/') && token.contains('\\') {
        return false;
    }
    if token.ends_with('.') {
        return false;
    }
    true
}

/// Digest one token: by file content when it names an existing regular
/// file, by string otherwise.
///
/// The token is probed as-is and resolved against `working_dir`. A token
/// that resolves to a directory is deliberately digested as a string
/// rather than hashed by walking the tree; this keeps derivation O(tokens)
/// at the cost of not tracking directory contents.
fn digest_token(token: &str, working_dir: &Path) -> Result<String> {
    if !is_pathy_token(token) {
        return Ok(digest_string(token));
    }
    let candidates = [PathBuf::from(token), working_dir.join(token)];
    match candidates.iter().find(|p| p.exists()) {
        Some(path) if path.is_file() => {
            debug!(path = %path.display(), "hashing file token by content");
            digest_file(path)
        }
        _ => Ok(digest_string(token)),
    }
}

/// Derive a cache key from a newline-delimited key expression.
///
/// Tokens are trimmed, digested independently and joined with `/` in their
/// original order, so the key always has exactly one segment per token.
/// An empty or all-literal expression is a valid key, not an error.
pub fn derive(expression: &str, working_dir: &Path) -> Result<String> {
    debug!(expression, "deriving cache key");
    let mut segments = Vec::new();
    for token in expression.split('\n').map(str::trim) {
        segments.push(digest_token(token, working_dir)?);
    }
    let key = segments.join("/");
    debug!(key, "derived cache key");
    Ok(key)
}

/// Derive a single-segment cache key.
///
/// Hashes the `/`-joined per-token digests into one SHA-256, for callers
/// that need a fixed-length key regardless of token count.
pub fn derive_flat(expression: &str, working_dir: &Path) -> Result<String> {
    let joined = derive(expression, working_dir)?;
    Ok(digest_string(&joined))
}
