//! Read-only view of the boot link pair.

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::artifact::{ArtifactKind, BootLayout};
use super::release;

/// Where one `-current`/`-previous` link pair points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotStatus {
    pub kind: ArtifactKind,
    /// Raw link target, if the link exists.
    pub current: Option<PathBuf>,
    pub previous: Option<PathBuf>,
    /// The current link resolves to an existing file.
    pub current_resolves: bool,
    pub previous_resolves: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootStatus {
    pub root: PathBuf,
    /// `None` when no release file carries a VERSION_ID.
    pub version_id: Option<String>,
    pub slots: Vec<SlotStatus>,
}

impl BootStatus {
    /// Both current links exist and resolve.
    pub fn is_bootable(&self) -> bool {
        self.slots.iter().all(|slot| slot.current_resolves)
    }
}

pub fn inspect(root: &Path) -> BootStatus {
    let layout = BootLayout::new(root);
    let slots = ArtifactKind::ALL
        .into_iter()
        .map(|kind| {
            let current = layout.current_link(kind);
            let previous = layout.previous_link(kind);
            SlotStatus {
                kind,
                current: std::fs::read_link(&current).ok(),
                previous: std::fs::read_link(&previous).ok(),
                current_resolves: current.is_file(),
                previous_resolves: previous.is_file(),
            }
        })
        .collect();

    BootStatus {
        root: root.to_path_buf(),
        version_id: release::read_version(root).ok(),
        slots,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    #[test]
    fn test_empty_root() {
        let root = TempDir::new().unwrap();
        let status = inspect(root.path());

        assert_eq!(status.version_id, None);
        assert_eq!(status.slots.len(), 2);
        assert!(status.slots.iter().all(|s| s.current.is_none()));
        assert!(!status.is_bootable());
    }

    #[test]
    fn test_reports_link_targets() {
        let root = TempDir::new().unwrap();
        let boot = root.path().join("boot");
        std::fs::create_dir_all(root.path().join("etc")).unwrap();
        std::fs::create_dir_all(&boot).unwrap();
        std::fs::write(root.path().join("etc/os-release"), "VERSION_ID=v2\n").unwrap();

        for prefix in ["vmlinuz", "initrd"] {
            std::fs::write(boot.join(format!("{}-v2", prefix)), prefix).unwrap();
            symlink(
                boot.join(format!("{}-v2", prefix)),
                boot.join(format!("{}-current", prefix)),
            )
            .unwrap();
        }
        // Dangling previous link
        symlink(boot.join("vmlinuz-v1"), boot.join("vmlinuz-previous")).unwrap();

        let status = inspect(root.path());

        assert_eq!(status.version_id.as_deref(), Some("v2"));
        assert!(status.is_bootable());
        let kernel = &status.slots[0];
        assert_eq!(kernel.kind, ArtifactKind::Kernel);
        assert_eq!(kernel.current, Some(boot.join("vmlinuz-v2")));
        assert_eq!(kernel.previous, Some(boot.join("vmlinuz-v1")));
        assert!(!kernel.previous_resolves);
    }
}
