//! System-wide upgrade lock.
//!
//! Uses flock so only one upgrade runs at a time. Acquisition never waits:
//! a second invocation fails immediately.

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use super::error::UpgradeError;

/// Holds an exclusive flock on the lock file.
///
/// Released when dropped, or by the kernel when the process exits.
#[derive(Debug)]
pub struct UpgradeLock {
    file: File,
    path: PathBuf,
}

impl UpgradeLock {
    /// Try to take the lock at `path`, creating the file and its parent
    /// directory if needed.
    pub fn acquire(path: &Path) -> Result<Self, UpgradeError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| UpgradeError::lock(parent, e))?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| UpgradeError::lock(path, e))?;

        let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if result != 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::WouldBlock {
                return Err(UpgradeError::LockHeld {
                    path: path.to_path_buf(),
                });
            }
            return Err(UpgradeError::lock(path, err));
        }

        tracing::debug!(lock_path = %path.display(), "Acquired upgrade lock");

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UpgradeLock {
    fn drop(&mut self) {
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
        tracing::debug!(lock_path = %self.path.display(), "Released upgrade lock");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_creates_parent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state/upgrade.lock");

        let lock = UpgradeLock::acquire(&path).unwrap();
        assert!(lock.path().exists());
        assert_eq!(lock.path(), path);
    }

    #[test]
    fn test_held_error_names_lock_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state/upgrade.lock");

        let held = UpgradeLock::acquire(&path).unwrap();
        let err = UpgradeLock::acquire(&path).unwrap_err();
        let UpgradeError::LockHeld { path: reported } = &err else {
            panic!("unexpected error: {:?}", err);
        };
        assert_eq!(reported, held.path());
        assert!(err.to_string().contains("state/upgrade.lock is locked"));
    }

    #[test]
    fn test_stale_file_is_reused_and_truncated() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("upgrade.lock");
        // Left behind by a crashed run; nobody holds it
        std::fs::write(&path, "pid 1234\n").unwrap();

        let _lock = UpgradeLock::acquire(&path).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn test_directory_at_lock_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("upgrade.lock");
        std::fs::create_dir(&path).unwrap();

        let err = UpgradeLock::acquire(&path).unwrap_err();
        assert!(matches!(err, UpgradeError::Lock { path: p, .. } if p == path));
    }

    #[test]
    fn test_unwritable_location() {
        let temp = TempDir::new().unwrap();
        // Parent is a regular file
        let blocker = temp.path().join("file");
        std::fs::write(&blocker, "").unwrap();

        let err = UpgradeLock::acquire(&blocker.join("upgrade.lock")).unwrap_err();
        assert!(matches!(err, UpgradeError::Lock { .. }));
    }
}
