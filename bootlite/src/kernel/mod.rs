//! Kernel/initrd installation and current/previous link rotation.
//!
//! The boot loader only ever reads `<root>/boot/{vmlinuz,initrd}-current`
//! (and `-previous` for rollback). [`copy_kernel`] installs a new pair from
//! an upgrade source and repoints those links so that a crash at any point
//! leaves a pair the loader can boot.

pub mod artifact;
pub mod digest;
pub mod error;
pub mod manifest;
pub mod release;
pub mod rotation;
pub mod status;

use std::path::{Path, PathBuf};

pub use artifact::{ArtifactKind, BootLayout, KernelArtifact};
pub use error::{KernelError, LinkError, RotationErrors};
pub use rotation::RotationPlan;
pub use status::{BootStatus, SlotStatus};

/// What [`copy_kernel`] did.
#[derive(Debug)]
pub enum KernelUpdate {
    /// Installed content and links were already correct. Nothing was
    /// written.
    Unchanged,
    Installed(InstalledKernel),
}

#[derive(Debug)]
pub struct InstalledKernel {
    pub installed: Vec<PathBuf>,
    /// Whether `-previous` links were written.
    pub previous_linked: bool,
    /// Content is durable, but these links could not be recreated.
    pub rotation_errors: Option<RotationErrors>,
}

impl KernelUpdate {
    pub fn changed(&self) -> bool {
        matches!(self, KernelUpdate::Installed(_))
    }

    pub fn rotation_errors(&self) -> Option<&RotationErrors> {
        match self {
            KernelUpdate::Installed(installed) => installed.rotation_errors.as_ref(),
            KernelUpdate::Unchanged => None,
        }
    }

    /// Split off any link failures, leaving the rest of the report.
    pub fn take_rotation_errors(&mut self) -> Option<RotationErrors> {
        match self {
            KernelUpdate::Installed(installed) => installed.rotation_errors.take(),
            KernelUpdate::Unchanged => None,
        }
    }
}

/// Install the kernel/initrd pair listed in `<source>/sha256sum` under
/// `<target>/boot` and rotate the links.
///
/// Every source file is hash-checked before the target is touched. When the
/// installed pair and its links are already correct this returns
/// [`KernelUpdate::Unchanged`] without writing anything.
pub fn copy_kernel(source: &Path, target: &Path) -> Result<KernelUpdate, KernelError> {
    let artifacts = read_artifacts(source, target)?;

    let plan = RotationPlan::inspect(&artifacts)?;
    tracing::debug!(?plan, "Inspected boot directory");
    if plan.is_noop() {
        tracing::info!("Kernel and initrd already installed and linked");
        return Ok(KernelUpdate::Unchanged);
    }

    let rotation_errors = rotation::apply(&artifacts, &plan)?;

    Ok(KernelUpdate::Installed(InstalledKernel {
        installed: artifacts.into_iter().map(|a| a.installed_path).collect(),
        previous_linked: plan.track_previous,
        rotation_errors,
    }))
}

/// Build and verify the artifact pair without touching the target.
pub fn read_artifacts(source: &Path, target: &Path) -> Result<Vec<KernelArtifact>, KernelError> {
    let version = release::read_version(target)?;
    let entries = manifest::read_manifest(source)?;
    let layout = BootLayout::new(target);

    let mut artifacts = Vec::with_capacity(2);
    for entry in entries {
        let Some(kind) = ArtifactKind::from_file_name(&entry.file_name) else {
            continue;
        };
        if !is_plain_file_name(&entry.file_name) {
            return Err(KernelError::InvalidName {
                name: entry.file_name,
            });
        }

        let artifact = KernelArtifact::new(
            kind,
            source,
            &layout,
            &entry.file_name,
            &version,
            entry.hash,
        );
        if artifact.shadows_link() {
            return Err(KernelError::InvalidName {
                name: entry.file_name,
            });
        }
        digest::verify_file(&artifact.source_path, &artifact.expected_hash)?;
        tracing::debug!(
            kind = %kind,
            path = %artifact.source_path.display(),
            "Verified source artifact"
        );
        artifacts.push(artifact);
    }

    let names = || artifacts.iter().map(KernelArtifact::file_name).collect();
    if artifacts.len() != 2 {
        return Err(KernelError::ArtifactCount {
            found: artifacts.len(),
            names: names(),
        });
    }
    if artifacts[0].kind == artifacts[1].kind {
        return Err(KernelError::DuplicateKind {
            kind: artifacts[0].kind,
            names: names(),
        });
    }

    Ok(artifacts)
}

fn is_plain_file_name(name: &str) -> bool {
    !name.contains('/') && name != "." && name != ".."
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_file_name() {
        assert!(is_plain_file_name("vmlinuz-v2"));
        assert!(!is_plain_file_name("vmlinuz-v2/../../etc/passwd"));
        assert!(!is_plain_file_name("../vmlinuz-v2"));
    }

    #[test]
    fn test_unchanged_has_no_rotation_errors() {
        let mut update = KernelUpdate::Unchanged;
        assert!(!update.changed());
        assert!(update.rotation_errors().is_none());
        assert!(update.take_rotation_errors().is_none());
    }
}
