//! Kernel/initrd artifacts and the `<root>/boot` layout they live in.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::digest;
use crate::constants::kernel::{
    BOOT_DIR, CURRENT_SUFFIX, INITRD_PREFIX, KERNEL_PREFIX, PREVIOUS_SUFFIX,
};

/// Which half of the boot pair an artifact is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ArtifactKind {
    #[serde(rename = "vmlinuz")]
    Kernel,
    #[serde(rename = "initrd")]
    Initrd,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 2] = [ArtifactKind::Kernel, ArtifactKind::Initrd];

    pub fn prefix(self) -> &'static str {
        match self {
            ArtifactKind::Kernel => KERNEL_PREFIX,
            ArtifactKind::Initrd => INITRD_PREFIX,
        }
    }

    /// Classify a manifest file name by its `vmlinuz-` / `initrd-` prefix.
    pub fn from_file_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| {
            name.strip_prefix(kind.prefix())
                .is_some_and(|rest| rest.starts_with('-'))
        })
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Paths inside `<root>/boot`.
#[derive(Clone, Debug)]
pub struct BootLayout {
    boot_dir: PathBuf,
}

impl BootLayout {
    pub fn new(root: &Path) -> Self {
        Self {
            boot_dir: root.join(BOOT_DIR),
        }
    }

    pub fn boot_dir(&self) -> &Path {
        &self.boot_dir
    }

    /// `<prefix>-current`, read by the boot loader.
    pub fn current_link(&self, kind: ArtifactKind) -> PathBuf {
        self.boot_dir
            .join(format!("{}-{}", kind.prefix(), CURRENT_SUFFIX))
    }

    /// `<prefix>-previous`, the rollback entry.
    pub fn previous_link(&self, kind: ArtifactKind) -> PathBuf {
        self.boot_dir
            .join(format!("{}-{}", kind.prefix(), PREVIOUS_SUFFIX))
    }

    /// `<prefix>-<version>`
    pub fn versioned(&self, kind: ArtifactKind, version: &str) -> PathBuf {
        self.boot_dir.join(format!("{}-{}", kind.prefix(), version))
    }

    pub fn install_path(&self, file_name: &str) -> PathBuf {
        self.boot_dir.join(file_name)
    }
}

/// One provisioned kernel or initrd and where it goes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KernelArtifact {
    pub kind: ArtifactKind,
    /// File in the upgrade source.
    pub source_path: PathBuf,
    /// `<root>/boot/<file name>`; identity of the artifact.
    pub installed_path: PathBuf,
    pub current_link: PathBuf,
    pub previous_link: PathBuf,
    /// `<root>/boot/<prefix>-<running VERSION_ID>`, what `current` pointed
    /// at before this upgrade.
    pub previous_version_path: PathBuf,
    /// Lowercase hex SHA-256.
    pub expected_hash: String,
}

impl KernelArtifact {
    pub fn new(
        kind: ArtifactKind,
        source_dir: &Path,
        layout: &BootLayout,
        file_name: &str,
        running_version: &str,
        expected_hash: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            source_path: source_dir.join(file_name),
            installed_path: layout.install_path(file_name),
            current_link: layout.current_link(kind),
            previous_link: layout.previous_link(kind),
            previous_version_path: layout.versioned(kind, running_version),
            expected_hash: expected_hash.into(),
        }
    }

    /// Whether the installed copy exists and matches the expected hash.
    pub fn is_installed(&self) -> bool {
        digest::verify_file(&self.installed_path, &self.expected_hash).is_ok()
    }

    /// The install path is one of this kind's boot links, e.g. a manifest
    /// entry named `vmlinuz-current`.
    pub fn shadows_link(&self) -> bool {
        self.installed_path == self.current_link || self.installed_path == self.previous_link
    }

    pub fn file_name(&self) -> String {
        self.installed_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_file_name() {
        assert_eq!(
            ArtifactKind::from_file_name("vmlinuz-v0.21.0"),
            Some(ArtifactKind::Kernel)
        );
        assert_eq!(
            ArtifactKind::from_file_name("initrd-v0.21.0"),
            Some(ArtifactKind::Initrd)
        );
        assert_eq!(ArtifactKind::from_file_name("vmlinuz"), None);
        assert_eq!(ArtifactKind::from_file_name("vmlinuzv2"), None);
        assert_eq!(ArtifactKind::from_file_name("system.squashfs"), None);
    }

    #[test]
    fn test_layout_paths() {
        let layout = BootLayout::new(Path::new("/bootlite/system"));

        assert_eq!(
            layout.current_link(ArtifactKind::Kernel),
            PathBuf::from("/bootlite/system/boot/vmlinuz-current")
        );
        assert_eq!(
            layout.previous_link(ArtifactKind::Initrd),
            PathBuf::from("/bootlite/system/boot/initrd-previous")
        );
        assert_eq!(
            layout.versioned(ArtifactKind::Kernel, "v1"),
            PathBuf::from("/bootlite/system/boot/vmlinuz-v1")
        );
    }

    #[test]
    fn test_artifact_paths() {
        let layout = BootLayout::new(Path::new("/root"));
        let artifact = KernelArtifact::new(
            ArtifactKind::Kernel,
            Path::new("/src"),
            &layout,
            "vmlinuz-v2",
            "v1",
            "abc",
        );

        assert_eq!(artifact.source_path, PathBuf::from("/src/vmlinuz-v2"));
        assert_eq!(artifact.installed_path, PathBuf::from("/root/boot/vmlinuz-v2"));
        assert_eq!(
            artifact.previous_version_path,
            PathBuf::from("/root/boot/vmlinuz-v1")
        );
        assert_eq!(artifact.file_name(), "vmlinuz-v2");
        assert!(!artifact.is_installed());
        assert!(!artifact.shadows_link());
    }

    #[test]
    fn test_link_names_shadow_links() {
        let layout = BootLayout::new(Path::new("/root"));
        for (kind, name) in [
            (ArtifactKind::Kernel, "vmlinuz-current"),
            (ArtifactKind::Initrd, "initrd-previous"),
        ] {
            let artifact = KernelArtifact::new(kind, Path::new("/src"), &layout, name, "v1", "abc");
            assert!(artifact.shadows_link(), "{name}");
        }
    }
}
