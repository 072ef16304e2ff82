//! Pseudo-filesystems and device nodes needed before the system image mounts.
//!
//! The initrd has no udev, so /proc and /dev are mounted by hand and the loop
//! nodes are created with fixed numbers in case devtmpfs didn't populate them.

use std::path::Path;

use nix::mount::{MsFlags, mount, umount};
use nix::sys::stat::{Mode, SFlag, mknod};

use super::error::EnterError;
use crate::constants::boot::{
    LOOP_CONTROL, LOOP_CONTROL_MAJOR, LOOP_CONTROL_MINOR, LOOP_MAJOR, STATIC_LOOP_NODES,
};

/// Encode a device number the way the kernel's `new_encode_dev` does.
pub fn device_number(major: u64, minor: u64) -> libc::dev_t {
    ((major << 8) | (minor & 0xff) | ((minor & 0xfff00) << 12)) as libc::dev_t
}

/// Mount proc and devtmpfs, creating the mount points first.
pub fn mount_pseudo_filesystems(proc_dir: &Path, dev_dir: &Path) -> Result<(), EnterError> {
    mount_pseudo("proc", proc_dir, "proc")?;
    mount_pseudo("none", dev_dir, "devtmpfs")
}

fn mount_pseudo(source: &str, target: &Path, fstype: &'static str) -> Result<(), EnterError> {
    tracing::debug!("mkdir {}", target.display());
    std::fs::create_dir_all(target).map_err(|e| EnterError::create_dir(target, e))?;

    tracing::debug!("mount {} on {}", fstype, target.display());
    mount(
        Some(source),
        target,
        Some(fstype),
        MsFlags::empty(),
        None::<&str>,
    )
    .map_err(|source| EnterError::MountPseudo {
        fstype,
        target: target.to_path_buf(),
        source,
    })
}

/// Unmount /dev then /proc. Final init mounts its own.
pub fn unmount_pseudo_filesystems(proc_dir: &Path, dev_dir: &Path) -> Result<(), EnterError> {
    for target in [dev_dir, proc_dir] {
        tracing::debug!("umount {}", target.display());
        umount(target).map_err(|source| EnterError::Unmount {
            target: target.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

/// Create `/dev/loop-control` and the static `loop0..loop6` nodes.
pub fn ensure_loop_nodes(dev_dir: &Path) -> Result<(), EnterError> {
    ensure_device_node(
        &dev_dir.join(LOOP_CONTROL),
        SFlag::S_IFCHR,
        LOOP_CONTROL_MAJOR,
        LOOP_CONTROL_MINOR,
    )?;
    for minor in 0..STATIC_LOOP_NODES {
        ensure_device_node(
            &dev_dir.join(format!("loop{}", minor)),
            SFlag::S_IFBLK,
            LOOP_MAJOR,
            minor,
        )?;
    }
    Ok(())
}

/// mknod `path` unless something already exists there.
///
/// Returns whether a node was created.
pub fn ensure_device_node(
    path: &Path,
    kind: SFlag,
    major: u64,
    minor: u64,
) -> Result<bool, EnterError> {
    if path.exists() {
        return Ok(false);
    }

    tracing::debug!("mknod {} ({}:{})", path.display(), major, minor);
    mknod(path, kind, Mode::S_IRWXU, device_number(major, minor)).map_err(|source| {
        EnterError::DeviceNode {
            path: path.to_path_buf(),
            source,
        }
    })?;
    Ok(true)
}
