//! SHA-256 digests over strings and file contents
//!
//! Both digest forms use the same algorithm so their outputs are
//! interchangeable as cache key segments.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Read buffer size for streaming file digests
const FILE_BUF_SIZE: usize = 64 * 1024;

/// Digest a string as lowercase hex SHA-256
#[must_use]
pub fn digest_string(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Digest a file's contents as lowercase hex SHA-256
///
/// Streams the file through the hasher in fixed-size chunks; the file is
/// never loaded into memory whole and is read exactly once.
pub fn digest_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| Error::io(e, path, "open"))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; FILE_BUF_SIZE];
    loop {
        let n = file.read(&mut buf).map_err(|e| Error::io(e, path, "read"))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
