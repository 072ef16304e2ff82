//! Mounting the system image and shaping the new root around it.

use std::io;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use nix::mount::{MsFlags, mount};

use super::error::{EnterError, FilesystemUnsupported};
use super::loopdev::LoopDevice;
use crate::constants::boot::{IMAGE_FSTYPE, INIT_PATH, STALE_LIB, SYSTEM_LINKS, USR_DIR};
use crate::kmod::{LoadOutcome, ModuleError};

/// A loop-backed image mounted read-only.
#[derive(Debug)]
pub struct LoopbackMount {
    device: LoopDevice,
    mount_point: PathBuf,
}

impl LoopbackMount {
    /// Make sure the device is flagged for autoclear. Idempotent.
    pub fn confirm_autoclear(&self) -> Result<(), EnterError> {
        self.device.set_autoclear()?;
        tracing::debug!(
            device = %self.device.path().display(),
            image = %self.device.image().display(),
            mount_point = %self.mount_point.display(),
            autoclear = self.device.is_autoclear()?,
            read_only = self.device.is_read_only()?,
            "Loop device state"
        );
        Ok(())
    }

    /// Close the device descriptor. The mount keeps the device alive and
    /// autoclear detaches it once the mount goes away.
    pub fn release(self) {
        drop(self);
    }
}

/// Whether `/proc/filesystems` content lists `fstype`.
///
/// Lines look like `nodev\tproc` or `\tsquashfs`; the last field is the name.
pub fn filesystem_listed(proc_filesystems: &str, fstype: &str) -> bool {
    proc_filesystems
        .lines()
        .filter_map(|line| line.split_whitespace().last())
        .any(|name| name == fstype)
}

fn filesystem_supported(proc_dir: &Path, fstype: &str) -> bool {
    let path = proc_dir.join("filesystems");
    match std::fs::read_to_string(&path) {
        Ok(content) => filesystem_listed(&content, fstype),
        Err(e) => {
            tracing::error!("Failed to read {}: {}", path.display(), e);
            false
        }
    }
}

/// Check kernel support for `fstype`, loading its module once if missing.
///
/// The load result is discarded: support is judged by re-reading
/// `/proc/filesystems` afterwards.
pub fn check_filesystem<F>(proc_dir: &Path, fstype: &str, load: F) -> Option<FilesystemUnsupported>
where
    F: FnOnce(&str) -> Result<LoadOutcome, ModuleError>,
{
    if !filesystem_supported(proc_dir, fstype) {
        let _ = load(fstype);
    }

    if filesystem_supported(proc_dir, fstype) {
        None
    } else {
        Some(FilesystemUnsupported {
            fstype: fstype.to_string(),
        })
    }
}

/// Mount the device's image read-only at `target`.
///
/// On failure the device is detached and the error carries `unsupported`
/// as a secondary cause.
pub fn mount_image(
    mut device: LoopDevice,
    target: &Path,
    unsupported: Option<FilesystemUnsupported>,
) -> Result<LoopbackMount, EnterError> {
    tracing::debug!(
        "Mounting {} {} to {}",
        IMAGE_FSTYPE,
        device.path().display(),
        target.display()
    );

    mount(
        Some(device.path()),
        target,
        Some(IMAGE_FSTYPE),
        MsFlags::MS_RDONLY,
        None::<&str>,
    )
    .map_err(|source| EnterError::MountImage {
        device: device.path().to_path_buf(),
        target: target.to_path_buf(),
        source,
        unsupported,
    })?;

    device.mark_mounted();
    tracing::info!(
        "Mounted {} on {}",
        device.image().display(),
        target.display()
    );
    Ok(LoopbackMount {
        device,
        mount_point: target.to_path_buf(),
    })
}

/// Replace the initrd's `lib` and point `lib`, `lib64`, `bin`, `sbin` into
/// the mounted image. Entries that already exist (as anything) are kept.
pub fn link_system_dirs(root: &Path) -> Result<(), EnterError> {
    let stale = root.join(STALE_LIB);
    remove_entry(&stale).map_err(|source| EnterError::RemoveEntry {
        path: stale.clone(),
        source,
    })?;

    for name in SYSTEM_LINKS {
        let link = root.join(name);
        match std::fs::symlink_metadata(&link) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let target = Path::new(USR_DIR).join(name);
                tracing::debug!("Symlinking {} => {}", link.display(), target.display());
                symlink(&target, &link).map_err(|source| EnterError::Symlink {
                    link: link.clone(),
                    target,
                    source,
                })?;
            }
            _ => tracing::debug!("Keeping existing {}", link.display()),
        }
    }
    Ok(())
}

/// `rm -rf` without following a symlinked directory.
fn remove_entry(path: &Path) -> io::Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Path of the final init under `root`, which must exist.
pub fn verify_init(root: &Path) -> Result<PathBuf, EnterError> {
    let init = root.join(INIT_PATH);
    std::fs::metadata(&init).map_err(|source| EnterError::InitNotFound {
        path: init.clone(),
        source,
    })?;
    Ok(init)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tempfile::TempDir;

    const PROC_FILESYSTEMS: &str = "nodev\tsysfs\nnodev\tproc\nnodev\tdevtmpfs\n\text4\n";

    #[test]
    fn test_filesystem_listed() {
        assert!(filesystem_listed(PROC_FILESYSTEMS, "ext4"));
        assert!(filesystem_listed(PROC_FILESYSTEMS, "proc"));
        assert!(!filesystem_listed(PROC_FILESYSTEMS, "squashfs"));
        assert!(!filesystem_listed(PROC_FILESYSTEMS, "nodev"));
    }

    #[test]
    fn test_check_filesystem_already_supported() {
        let proc_dir = TempDir::new().unwrap();
        std::fs::write(
            proc_dir.path().join("filesystems"),
            format!("{}\tsquashfs\n", PROC_FILESYSTEMS),
        )
        .unwrap();
        let called = Cell::new(false);

        let result = check_filesystem(proc_dir.path(), "squashfs", |_| {
            called.set(true);
            Ok(LoadOutcome::NotFound)
        });
        assert!(result.is_none());
        assert!(!called.get(), "module load must be skipped when supported");
    }

    #[test]
    fn test_check_filesystem_loads_module() {
        let proc_dir = TempDir::new().unwrap();
        let filesystems = proc_dir.path().join("filesystems");
        std::fs::write(&filesystems, PROC_FILESYSTEMS).unwrap();

        let result = check_filesystem(proc_dir.path(), "squashfs", |name| {
            // Simulate the kernel registering the filesystem on insert
            std::fs::write(&filesystems, format!("{}\t{}\n", PROC_FILESYSTEMS, name)).unwrap();
            Ok(LoadOutcome::NotFound)
        });
        assert!(result.is_none());
    }

    #[test]
    fn test_check_filesystem_unsupported_after_failed_load() {
        let proc_dir = TempDir::new().unwrap();
        std::fs::write(proc_dir.path().join("filesystems"), PROC_FILESYSTEMS).unwrap();

        let result = check_filesystem(proc_dir.path(), "squashfs", |_| {
            Err(ModuleError::NoRelease)
        });
        assert_eq!(
            result,
            Some(FilesystemUnsupported {
                fstype: "squashfs".into()
            })
        );
    }

    #[test]
    fn test_link_system_dirs_fresh_root() {
        let root = TempDir::new().unwrap();

        link_system_dirs(root.path()).unwrap();

        for name in SYSTEM_LINKS {
            let target = std::fs::read_link(root.path().join(name)).unwrap();
            assert_eq!(target, Path::new("usr").join(name));
        }
    }

    #[test]
    fn test_link_system_dirs_replaces_lib_keeps_others() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("lib/modules/6.6.0")).unwrap();
        std::fs::create_dir(root.path().join("bin")).unwrap();
        std::fs::write(root.path().join("sbin"), b"not a dir").unwrap();

        link_system_dirs(root.path()).unwrap();

        assert_eq!(
            std::fs::read_link(root.path().join("lib")).unwrap(),
            Path::new("usr/lib")
        );
        assert!(root.path().join("bin").is_dir());
        assert_eq!(std::fs::read(root.path().join("sbin")).unwrap(), b"not a dir");
        assert_eq!(
            std::fs::read_link(root.path().join("lib64")).unwrap(),
            Path::new("usr/lib64")
        );
    }

    #[test]
    fn test_link_system_dirs_keeps_dangling_symlink() {
        let root = TempDir::new().unwrap();
        symlink("/nowhere", root.path().join("lib64")).unwrap();

        link_system_dirs(root.path()).unwrap();

        assert_eq!(
            std::fs::read_link(root.path().join("lib64")).unwrap(),
            Path::new("/nowhere")
        );
    }

    #[test]
    fn test_link_system_dirs_removes_lib_symlink_not_target() {
        let root = TempDir::new().unwrap();
        let elsewhere = root.path().join("elsewhere");
        std::fs::create_dir(&elsewhere).unwrap();
        std::fs::write(elsewhere.join("keep"), b"x").unwrap();
        symlink(&elsewhere, root.path().join("lib")).unwrap();

        link_system_dirs(root.path()).unwrap();

        assert!(elsewhere.join("keep").exists());
        assert_eq!(
            std::fs::read_link(root.path().join("lib")).unwrap(),
            Path::new("usr/lib")
        );
    }

    #[test]
    fn test_verify_init() {
        let root = TempDir::new().unwrap();
        assert!(matches!(
            verify_init(root.path()),
            Err(EnterError::InitNotFound { .. })
        ));

        std::fs::create_dir(root.path().join("usr")).unwrap();
        std::fs::write(root.path().join("usr/init"), b"#!/bin/sh\n").unwrap();
        assert_eq!(
            verify_init(root.path()).unwrap(),
            root.path().join("usr/init")
        );
    }
}
