//! Rebooting the host after an upgrade.
//!
//! The upgrade usually runs inside a container, so a plain `reboot` would
//! only affect the container. `nsenter` joins PID 1's namespaces and reboots
//! from there. When the container image has no `nsenter`, the fallback
//! chroots into the host filesystem (the destination's grandparent, since
//! the system root is mounted at `<host>/bootlite/system`) and uses the
//! host's copy.

use std::path::{Component, Path, PathBuf};
use std::process::Command;

use super::error::UpgradeError;
use crate::constants::paths::SYSTEM_ROOT;
use crate::constants::reboot::{HELPER, HELPER_ARGS};

/// Something that can reboot the host.
pub trait HostReboot {
    fn reboot(&self) -> Result<(), UpgradeError>;
}

/// Production reboot through `nsenter -t 1 ... reboot`.
#[derive(Debug, Clone)]
pub struct NsenterReboot {
    destination: PathBuf,
}

impl NsenterReboot {
    pub fn new(destination: &Path) -> Self {
        Self {
            destination: destination.to_path_buf(),
        }
    }

    fn locate_helper(&self) -> Result<PathBuf, UpgradeError> {
        if let Ok(helper) = which::which(HELPER) {
            return Ok(helper);
        }
        tracing::warn!("{} not found on PATH", HELPER);

        if normalize(&self.destination) == Path::new(SYSTEM_ROOT) {
            return Err(UpgradeError::HelperNotFound {
                helper: HELPER.into(),
            });
        }

        let host = host_root(&self.destination);
        tracing::info!("Entering host root {} to find {}", host.display(), HELPER);
        nix::unistd::chroot(&host).map_err(|source| UpgradeError::Chroot {
            path: host.clone(),
            source,
        })?;
        nix::unistd::chdir("/").map_err(UpgradeError::Chdir)?;

        which::which(HELPER).map_err(|_| UpgradeError::HelperNotFound {
            helper: HELPER.into(),
        })
    }
}

impl HostReboot for NsenterReboot {
    fn reboot(&self) -> Result<(), UpgradeError> {
        let helper = self.locate_helper()?;
        tracing::info!("Rebooting host via {}", helper.display());

        let status = Command::new(&helper)
            .args(HELPER_ARGS)
            .status()
            .map_err(|source| UpgradeError::Spawn {
                helper: HELPER.into(),
                source,
            })?;

        if !status.success() {
            return Err(UpgradeError::RebootFailed {
                helper: HELPER.into(),
                status,
            });
        }
        Ok(())
    }
}

/// Lexically resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) => {}
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }
    out
}

/// `<destination>/../..`
fn host_root(destination: &Path) -> PathBuf {
    normalize(&destination.join("..").join(".."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_root() {
        assert_eq!(
            host_root(Path::new("/host/bootlite/system")),
            PathBuf::from("/host")
        );
        assert_eq!(host_root(Path::new("/bootlite/system")), PathBuf::from("/"));
        assert_eq!(
            host_root(Path::new("/mnt/./bootlite/system/")),
            PathBuf::from("/mnt")
        );
    }

    #[test]
    fn test_normalize_root_stays_root() {
        assert_eq!(normalize(Path::new("/../..")), PathBuf::from("/"));
        assert_eq!(
            normalize(Path::new("/bootlite/./system")),
            PathBuf::from(SYSTEM_ROOT)
        );
    }
}
