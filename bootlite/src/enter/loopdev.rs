//! Loop device attachment.
//!
//! Asks `/dev/loop-control` for a free device, binds the image file to it and
//! sets `LO_FLAGS_AUTOCLEAR` so the kernel tears the device down once the
//! last user (the squashfs mount) goes away, long after this process has
//! exec'd into init.
//!
//! The device descriptor must stay open until the image is mounted: with
//! autoclear set, closing the last descriptor of an unmounted device detaches
//! it.

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use nix::sys::stat::SFlag;

use super::devices::ensure_device_node;
use super::error::EnterError;
use crate::constants::boot::{LOOP_CONTROL, LOOP_MAJOR};

const LO_FLAGS_READ_ONLY: u32 = 1;
const LO_FLAGS_AUTOCLEAR: u32 = 4;

/// `struct loop_info64` from `<linux/loop.h>`.
#[repr(C)]
pub struct LoopInfo64 {
    pub lo_device: u64,
    pub lo_inode: u64,
    pub lo_rdevice: u64,
    pub lo_offset: u64,
    pub lo_sizelimit: u64,
    pub lo_number: u32,
    pub lo_encrypt_type: u32,
    pub lo_encrypt_key_size: u32,
    pub lo_flags: u32,
    pub lo_file_name: [u8; 64],
    pub lo_crypt_name: [u8; 64],
    pub lo_encrypt_key: [u8; 32],
    pub lo_init: [u64; 2],
}

mod ioctl {
    use super::LoopInfo64;

    nix::ioctl_none_bad!(loop_ctl_get_free, 0x4C82);
    nix::ioctl_write_int_bad!(loop_set_fd, 0x4C00);
    nix::ioctl_none_bad!(loop_clr_fd, 0x4C01);
    nix::ioctl_write_ptr_bad!(loop_set_status64, 0x4C04, LoopInfo64);
    nix::ioctl_read_bad!(loop_get_status64, 0x4C05, LoopInfo64);
}

/// An attached loop device.
///
/// Dropping it before the image is mounted detaches the device. Once
/// [`mark_mounted`](Self::mark_mounted) is called, dropping only closes the
/// descriptor and autoclear handles teardown.
#[derive(Debug)]
pub struct LoopDevice {
    file: File,
    path: PathBuf,
    image: PathBuf,
    detach_on_drop: bool,
}

impl LoopDevice {
    /// Bind `image` to the next free loop device under `dev_dir`.
    pub fn attach(dev_dir: &Path, image: &Path, read_only: bool) -> Result<Self, EnterError> {
        let control_path = dev_dir.join(LOOP_CONTROL);
        let control = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&control_path)
            .map_err(|e| EnterError::open(&control_path, e))?;

        // SAFETY: plain ioctl on a descriptor we own; no pointers involved.
        let index = unsafe { ioctl::loop_ctl_get_free(control.as_raw_fd()) }
            .map_err(|e| EnterError::loop_op("get free", &control_path, e))?;

        // The kernel may hand out a minor beyond the static nodes
        let path = dev_dir.join(format!("loop{}", index));
        ensure_device_node(&path, SFlag::S_IFBLK, LOOP_MAJOR, index as u64)?;

        let backing = OpenOptions::new()
            .read(true)
            .write(!read_only)
            .open(image)
            .map_err(|e| EnterError::open(image, e))?;
        let file = OpenOptions::new()
            .read(true)
            .write(!read_only)
            .open(&path)
            .map_err(|e| EnterError::open(&path, e))?;

        tracing::debug!("Attaching {} to {}", image.display(), path.display());
        // SAFETY: both descriptors are open for the duration of the call.
        unsafe { ioctl::loop_set_fd(file.as_raw_fd(), backing.as_raw_fd()) }
            .map_err(|e| EnterError::loop_op("set fd", &path, e))?;

        Ok(Self {
            file,
            path,
            image: image.to_path_buf(),
            detach_on_drop: true,
        })
    }

    /// Device node path, e.g. `/dev/loop0`.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Backing image path.
    pub fn image(&self) -> &Path {
        &self.image
    }

    fn status(&self) -> Result<LoopInfo64, EnterError> {
        // SAFETY: loop_info64 is plain old data; all-zero is a valid value.
        let mut info: LoopInfo64 = unsafe { std::mem::zeroed() };
        // SAFETY: `info` is a valid, writable loop_info64.
        unsafe { ioctl::loop_get_status64(self.file.as_raw_fd(), &mut info) }
            .map_err(|e| EnterError::loop_op("get status", &self.path, e))?;
        Ok(info)
    }

    pub fn is_autoclear(&self) -> Result<bool, EnterError> {
        Ok(self.status()?.lo_flags & LO_FLAGS_AUTOCLEAR != 0)
    }

    pub fn is_read_only(&self) -> Result<bool, EnterError> {
        Ok(self.status()?.lo_flags & LO_FLAGS_READ_ONLY != 0)
    }

    /// Set autoclear. No-op if already set.
    pub fn set_autoclear(&self) -> Result<(), EnterError> {
        let mut info = self.status()?;
        if info.lo_flags & LO_FLAGS_AUTOCLEAR != 0 {
            return Ok(());
        }

        info.lo_flags |= LO_FLAGS_AUTOCLEAR;
        // SAFETY: `info` was filled by the kernel and outlives the call.
        unsafe { ioctl::loop_set_status64(self.file.as_raw_fd(), &info) }
            .map_err(|e| EnterError::loop_op("set autoclear", &self.path, e))?;
        tracing::debug!("Set autoclear on {}", self.path.display());
        Ok(())
    }

    /// The device now backs a mount; don't detach it on drop.
    pub fn mark_mounted(&mut self) {
        self.detach_on_drop = false;
    }
}

impl Drop for LoopDevice {
    fn drop(&mut self) {
        if !self.detach_on_drop {
            tracing::debug!("Releasing {}", self.path.display());
            return;
        }

        // SAFETY: plain ioctl on a descriptor we own.
        if let Err(e) = unsafe { ioctl::loop_clr_fd(self.file.as_raw_fd()) } {
            tracing::warn!("Failed to detach {}: {}", self.path.display(), e);
        } else {
            tracing::debug!("Detached {}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_info64_layout() {
        // Must match the kernel ABI exactly
        assert_eq!(std::mem::size_of::<LoopInfo64>(), 232);
        assert_eq!(std::mem::offset_of!(LoopInfo64, lo_flags), 52);
        assert_eq!(std::mem::offset_of!(LoopInfo64, lo_file_name), 56);
        assert_eq!(std::mem::offset_of!(LoopInfo64, lo_init), 216);
    }

    #[test]
    fn test_attach_without_loop_control_fails() {
        let temp = tempfile::TempDir::new().unwrap();
        let image = temp.path().join("system.squashfs");
        std::fs::write(&image, b"hsqs").unwrap();

        let err = LoopDevice::attach(temp.path(), &image, true).unwrap_err();
        assert!(matches!(err, EnterError::Open { ref path, .. } if path.ends_with(LOOP_CONTROL)));
    }
}
