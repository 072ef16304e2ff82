//! Deciding whether a rotation is needed, and performing it.
//!
//! Order matters for bootability:
//! 1. Install content (temp file + fsync + rename), then sync.
//! 2. Repoint `-previous` links (only if every previous version exists).
//! 3. Repoint `-current` links.
//! 4. Sync.
//!
//! Once step 1 finishes the new content is durable, so symlink failures in
//! steps 2-3 are collected rather than aborting half-way through.

use std::fs::Permissions;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use super::artifact::KernelArtifact;
use super::error::{KernelError, LinkError, RotationErrors};
use crate::util::{replace_symlink, resolves_to, sync_all, sync_directory};

/// Result of inspecting the target before any write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPlan {
    /// Every artifact's previous-version file exists, so `-previous` links
    /// are maintained. All or nothing across the pair.
    pub track_previous: bool,
    /// Every installed file matches its expected hash.
    pub content_valid: bool,
    /// Every `-current` (and, when tracked, `-previous`) link already
    /// resolves where it should.
    pub links_valid: bool,
}

impl RotationPlan {
    pub fn inspect(artifacts: &[KernelArtifact]) -> Result<Self, KernelError> {
        let mut track_previous = true;
        for artifact in artifacts {
            if !exists(&artifact.previous_version_path)? {
                tracing::debug!(
                    "No previous version at {}; not tracking previous links",
                    artifact.previous_version_path.display()
                );
                track_previous = false;
            }
        }

        let content_valid = artifacts.iter().all(KernelArtifact::is_installed);

        let links_valid = artifacts.iter().all(|artifact| {
            resolves_to(&artifact.current_link, &artifact.installed_path)
                && (!track_previous
                    || resolves_to(&artifact.previous_link, &artifact.previous_version_path))
        });

        Ok(Self {
            track_previous,
            content_valid,
            links_valid,
        })
    }

    /// Nothing to do: content and links are already in place.
    pub fn is_noop(&self) -> bool {
        self.content_valid && self.links_valid
    }
}

fn exists(path: &Path) -> Result<bool, KernelError> {
    match std::fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(KernelError::Stat {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Copy every artifact into place, then rotate the links.
///
/// Returns the collected symlink failures, if any.
pub fn apply(
    artifacts: &[KernelArtifact],
    plan: &RotationPlan,
) -> Result<Option<RotationErrors>, KernelError> {
    for artifact in artifacts {
        install_artifact(artifact)?;
    }
    sync_all();

    let mut errors = Vec::new();

    if plan.track_previous {
        for artifact in artifacts {
            relink(
                &artifact.previous_version_path,
                &artifact.previous_link,
                &mut errors,
            );
        }
    }

    for artifact in artifacts {
        relink(&artifact.installed_path, &artifact.current_link, &mut errors);
    }

    sync_all();
    Ok(RotationErrors::from_errors(errors))
}

fn relink(target: &Path, link: &Path, errors: &mut Vec<LinkError>) {
    tracing::info!("Symlinking {} => {}", link.display(), target.display());
    if let Err(source) = replace_symlink(target, link) {
        tracing::error!("Failed to symlink {}: {}", link.display(), source);
        errors.push(LinkError {
            link: link.to_path_buf(),
            target: target.to_path_buf(),
            source,
        });
    }
}

/// Write the source over the install path without ever exposing a partial
/// file: copy into a temp file beside it, fsync, rename.
fn install_artifact(artifact: &KernelArtifact) -> Result<(), KernelError> {
    let from = &artifact.source_path;
    let to = &artifact.installed_path;
    let err = |source: io::Error| KernelError::install(from, to, source);

    let boot_dir = to
        .parent()
        .ok_or_else(|| err(io::Error::other("install path has no parent")))?;
    std::fs::create_dir_all(boot_dir).map_err(err)?;

    tracing::info!("Copying {} => {}", from.display(), to.display());

    let mut source = std::fs::File::open(from).map_err(err)?;
    let mut staged = tempfile::Builder::new()
        .prefix(".bootlite-")
        .tempfile_in(boot_dir)
        .map_err(err)?;
    io::copy(&mut source, staged.as_file_mut()).map_err(err)?;
    staged
        .as_file()
        .set_permissions(Permissions::from_mode(0o644))
        .map_err(err)?;
    staged.as_file().sync_all().map_err(err)?;
    staged.persist(to).map_err(|e| err(e.error))?;

    sync_directory(boot_dir).map_err(err)?;
    Ok(())
}
