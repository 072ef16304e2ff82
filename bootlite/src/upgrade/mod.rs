//! Upgrade coordination.
//!
//! Validates the source and destination roots, takes the system-wide
//! [`UpgradeLock`], installs the kernel pair with
//! [`copy_kernel`](crate::kernel::copy_kernel) and, if asked and something
//! changed, reboots the host.

pub mod error;
pub mod lock;
pub mod reboot;

use std::path::{Path, PathBuf};

use serde::Serialize;

pub use error::UpgradeError;
pub use lock::UpgradeLock;
pub use reboot::{HostReboot, NsenterReboot};

use crate::constants::paths::{SYSTEM_ROOT, UPGRADE_LOCK};
use crate::kernel;

/// Inputs of one upgrade run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeConfig {
    /// Reboot the host when the kernel pair changed.
    pub reboot: bool,
    /// Root holding the new `sha256sum` manifest and artifacts.
    pub source: PathBuf,
    /// Root whose `boot/` directory is updated.
    pub destination: PathBuf,
    pub lock_file: PathBuf,
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self {
            reboot: false,
            source: PathBuf::from(SYSTEM_ROOT),
            destination: PathBuf::from(SYSTEM_ROOT),
            lock_file: PathBuf::from(UPGRADE_LOCK),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpgradeReport {
    /// A new kernel/initrd pair was installed.
    pub changed: bool,
    pub rebooted: bool,
    /// Boot links that could not be recreated after the content was
    /// installed. Non-empty means the reboot was skipped.
    pub rotation_errors: Vec<String>,
}

/// Run an upgrade, rebooting through `nsenter` when requested.
pub fn run(config: &UpgradeConfig) -> Result<UpgradeReport, UpgradeError> {
    run_with(config, &NsenterReboot::new(&config.destination))
}

/// Run an upgrade with a custom reboot mechanism.
pub fn run_with(
    config: &UpgradeConfig,
    host: &dyn HostReboot,
) -> Result<UpgradeReport, UpgradeError> {
    check_distinct(&config.source, &config.destination)?;
    let source = validate_system_root(&config.source)?;
    let destination = validate_system_root(&config.destination)?;
    if source == destination {
        return Err(UpgradeError::SameSourceDestination { path: destination });
    }

    // Held until the process is done, reboot included
    let _lock = UpgradeLock::acquire(&config.lock_file)?;

    tracing::info!(
        source = %config.source.display(),
        destination = %config.destination.display(),
        "Upgrading kernel"
    );
    let mut update = kernel::copy_kernel(&config.source, &config.destination)?;
    let mut report = UpgradeReport {
        changed: update.changed(),
        ..Default::default()
    };

    if let Some(errors) = update.take_rotation_errors() {
        tracing::error!(error = %errors, "Kernel installed but boot links are incomplete");
        report.rotation_errors = errors.errors().iter().map(ToString::to_string).collect();
        if config.reboot {
            tracing::warn!("Skipping reboot");
        }
        return Ok(report);
    }

    if report.changed && config.reboot {
        host.reboot()?;
        report.rebooted = true;
    } else if report.changed {
        tracing::info!("Kernel updated; reboot to use it");
    }

    Ok(report)
}

/// Refuse identical paths before touching the filesystem.
pub fn check_distinct(source: &Path, destination: &Path) -> Result<(), UpgradeError> {
    if source == destination {
        return Err(UpgradeError::SameSourceDestination {
            path: destination.to_path_buf(),
        });
    }
    Ok(())
}

/// The path must exist and be a directory. Returns its canonical form.
fn validate_system_root(path: &Path) -> Result<PathBuf, UpgradeError> {
    let metadata = std::fs::metadata(path).map_err(|e| UpgradeError::validate(path, e))?;
    if !metadata.is_dir() {
        return Err(UpgradeError::NotADirectory {
            path: path.to_path_buf(),
        });
    }
    std::fs::canonicalize(path).map_err(|e| UpgradeError::validate(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    struct CountingReboot(Cell<u32>);

    impl HostReboot for CountingReboot {
        fn reboot(&self) -> Result<(), UpgradeError> {
            self.0.set(self.0.get() + 1);
            Ok(())
        }
    }

    fn config(temp: &TempDir, source: PathBuf, destination: PathBuf) -> UpgradeConfig {
        UpgradeConfig {
            reboot: true,
            source,
            destination,
            lock_file: temp.path().join("upgrade.lock"),
        }
    }

    #[test]
    fn test_default_config() {
        let config = UpgradeConfig::default();
        assert!(!config.reboot);
        assert_eq!(config.source, PathBuf::from("/bootlite/system"));
        assert_eq!(
            config.lock_file,
            PathBuf::from("/var/lib/bootlite/upgrade.lock")
        );
    }

    #[test]
    fn test_same_path_refused() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("system");
        std::fs::create_dir(&root).unwrap();
        let host = CountingReboot(Cell::new(0));

        let err = run_with(&config(&temp, root.clone(), root), &host).unwrap_err();
        assert!(matches!(err, UpgradeError::SameSourceDestination { .. }));
        assert!(!temp.path().join("upgrade.lock").exists());
    }

    #[test]
    fn test_aliased_path_refused() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("system");
        let alias = temp.path().join("alias");
        std::fs::create_dir(&root).unwrap();
        symlink(&root, &alias).unwrap();
        let host = CountingReboot(Cell::new(0));

        let err = run_with(&config(&temp, root, alias), &host).unwrap_err();
        assert!(matches!(err, UpgradeError::SameSourceDestination { .. }));
    }

    #[test]
    fn test_missing_source() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("dest");
        std::fs::create_dir(&dest).unwrap();
        let host = CountingReboot(Cell::new(0));

        let err =
            run_with(&config(&temp, temp.path().join("missing"), dest), &host).unwrap_err();
        assert!(matches!(err, UpgradeError::Validate { .. }));
    }

    #[test]
    fn test_file_destination() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source");
        let dest = temp.path().join("dest");
        std::fs::create_dir(&source).unwrap();
        std::fs::write(&dest, "").unwrap();
        let host = CountingReboot(Cell::new(0));

        let err = run_with(&config(&temp, source, dest), &host).unwrap_err();
        assert!(matches!(err, UpgradeError::NotADirectory { .. }));
    }
}
