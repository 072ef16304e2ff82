//! SHA-256 of artifact files.

use std::fs::File;
use std::io;
use std::path::Path;

use sha2::{Digest, Sha256};

use super::error::KernelError;

/// Lowercase hex SHA-256 of a file's content, streamed.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Fail unless `path` hashes to `expected`.
pub fn verify_file(path: &Path, expected: &str) -> Result<(), KernelError> {
    let actual = sha256_file(path).map_err(|source| KernelError::Hash {
        path: path.to_path_buf(),
        source,
    })?;

    if actual != expected {
        return Err(KernelError::HashMismatch {
            path: path.to_path_buf(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}
