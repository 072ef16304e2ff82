//! `sha256sum` manifest shipped with the upgrade source.
//!
//! Same format `sha256sum` prints: `<hex-hash>  <file name>` per line. A
//! leading `*` on the name (binary mode) is dropped. Lines that don't split
//! into exactly two fields are skipped. Hashes are kept as written; only
//! lowercase hex ever matches.

use std::path::Path;

use super::error::KernelError;
use crate::constants::kernel::MANIFEST;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Hex SHA-256 as written in the manifest.
    pub hash: String,
    pub file_name: String,
}

pub fn parse_manifest(content: &str) -> Vec<ManifestEntry> {
    content
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let (hash, name) = (fields.next()?, fields.next()?);
            if fields.next().is_some() {
                return None;
            }
            Some(ManifestEntry {
                hash: hash.to_string(),
                file_name: name.strip_prefix('*').unwrap_or(name).to_string(),
            })
        })
        .collect()
}

/// Read `<source_dir>/sha256sum`.
pub fn read_manifest(source_dir: &Path) -> Result<Vec<ManifestEntry>, KernelError> {
    let path = source_dir.join(MANIFEST);
    let content = std::fs::read_to_string(&path)
        .map_err(|source| KernelError::Manifest { path, source })?;
    Ok(parse_manifest(&content))
}
