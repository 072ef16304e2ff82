//! Shared fixtures for bootlite tests.
//!
//! [`BootFixture`] lays out an upgrade source and a target root in a
//! temporary directory:
//!
//! ```text
//! <tmp>/source/sha256sum
//! <tmp>/source/{vmlinuz,initrd}-<version>
//! <tmp>/target/etc/os-release
//! <tmp>/target/boot/...
//! ```

use std::collections::BTreeMap;
use std::os::unix::fs::{MetadataExt, symlink};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::TempDir;

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Content of a fake artifact for `prefix` at `version`.
pub fn artifact_body(prefix: &str, version: &str) -> Vec<u8> {
    format!("{} image for {}\n", prefix, version).into_bytes()
}

/// One entry in the boot directory, as seen by [`BootFixture::snapshot_boot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootEntry {
    File { ino: u64, mtime_ns: i128, data: Vec<u8> },
    Link { ino: u64, target: PathBuf },
    Other { ino: u64 },
}

pub struct BootFixture {
    temp: TempDir,
    source: PathBuf,
    target: PathBuf,
}

impl BootFixture {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("create temp dir");
        let source = temp.path().join("source");
        let target = temp.path().join("target");
        std::fs::create_dir_all(&source).expect("create source");
        std::fs::create_dir_all(target.join("etc")).expect("create target/etc");
        Self {
            temp,
            source,
            target,
        }
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn boot_dir(&self) -> PathBuf {
        self.target.join("boot")
    }

    pub fn boot_path(&self, name: &str) -> PathBuf {
        self.boot_dir().join(name)
    }

    pub fn lock_file(&self) -> PathBuf {
        self.temp.path().join("state/upgrade.lock")
    }

    /// Set the target's running version in `etc/os-release`.
    pub fn set_running_version(&self, version: &str) {
        std::fs::write(
            self.target.join("etc/os-release"),
            format!("NAME=\"bootlite\"\nVERSION_ID={}\n", version),
        )
        .expect("write os-release");
    }

    /// Write a file into the source and return its hash.
    pub fn add_source_file(&self, name: &str, data: &[u8]) -> String {
        std::fs::write(self.source.join(name), data).expect("write source file");
        sha256_hex(data)
    }

    /// Write `sha256sum` verbatim.
    pub fn write_manifest_raw(&self, content: &str) {
        std::fs::write(self.source.join("sha256sum"), content).expect("write manifest");
    }

    /// Write `sha256sum` from (hash, name) pairs.
    pub fn write_manifest(&self, entries: &[(&str, &str)]) {
        let content: String = entries
            .iter()
            .map(|(hash, name)| format!("{}  {}\n", hash, name))
            .collect();
        self.write_manifest_raw(&content);
    }

    /// Provision a matching kernel/initrd pair for `version` in the source,
    /// with a manifest listing both.
    pub fn provision(&self, version: &str) {
        let mut entries = Vec::new();
        for prefix in ["vmlinuz", "initrd"] {
            let name = format!("{}-{}", prefix, version);
            let hash = self.add_source_file(&name, &artifact_body(prefix, version));
            entries.push((hash, name));
        }
        let refs: Vec<(&str, &str)> = entries
            .iter()
            .map(|(hash, name)| (hash.as_str(), name.as_str()))
            .collect();
        self.write_manifest(&refs);
    }

    /// Make the target look like `version` is installed and booted: the
    /// versioned files exist and `-current` points at them.
    pub fn install_running(&self, version: &str) {
        self.set_running_version(version);
        std::fs::create_dir_all(self.boot_dir()).expect("create boot dir");
        for prefix in ["vmlinuz", "initrd"] {
            let name = format!("{}-{}", prefix, version);
            std::fs::write(self.boot_path(&name), artifact_body(prefix, version))
                .expect("write installed artifact");
            let link = self.boot_path(&format!("{}-current", prefix));
            let _ = std::fs::remove_file(&link);
            symlink(self.boot_path(&name), link).expect("link current");
        }
    }

    /// Canonical path a boot link resolves to, if it resolves.
    pub fn resolve(&self, link: &str) -> Option<PathBuf> {
        std::fs::canonicalize(self.boot_path(link)).ok()
    }

    /// Canonical form of a boot directory file.
    pub fn canonical_boot_path(&self, name: &str) -> PathBuf {
        std::fs::canonicalize(self.boot_path(name)).expect("canonicalize boot file")
    }

    /// Everything in the boot directory with enough metadata to tell
    /// whether anything was written.
    pub fn snapshot_boot(&self) -> BTreeMap<String, BootEntry> {
        let mut snapshot = BTreeMap::new();
        let Ok(entries) = std::fs::read_dir(self.boot_dir()) else {
            return snapshot;
        };
        for entry in entries {
            let entry = entry.expect("read boot entry");
            let path = entry.path();
            let meta = std::fs::symlink_metadata(&path).expect("stat boot entry");
            let value = if meta.file_type().is_symlink() {
                BootEntry::Link {
                    ino: meta.ino(),
                    target: std::fs::read_link(&path).expect("read link"),
                }
            } else if meta.is_file() {
                BootEntry::File {
                    ino: meta.ino(),
                    mtime_ns: meta.mtime() as i128 * 1_000_000_000 + meta.mtime_nsec() as i128,
                    data: std::fs::read(&path).expect("read boot file"),
                }
            } else {
                BootEntry::Other { ino: meta.ino() }
            };
            snapshot.insert(entry.file_name().to_string_lossy().into_owned(), value);
        }
        snapshot
    }
}

impl Default for BootFixture {
    fn default() -> Self {
        Self::new()
    }
}
