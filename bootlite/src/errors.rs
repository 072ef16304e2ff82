//! Top-level error type.
//!
//! Each component owns its error enum next to its code:
//! - [`ModuleError`]: kernel module lookup, decompression, insertion
//! - [`EnterError`]: early boot sequence (mounts, loop devices, exec)
//! - [`KernelError`]: kernel/initrd installation and symlink rotation
//! - [`UpgradeError`]: upgrade coordination (validation, lock, reboot)
//!
//! They all convert into [`BootliteError`] for callers that don't care which
//! component failed.

use thiserror::Error;

pub use crate::enter::error::EnterError;
pub use crate::kernel::error::KernelError;
pub use crate::kmod::error::ModuleError;
pub use crate::upgrade::error::UpgradeError;

#[derive(Debug, Error)]
pub enum BootliteError {
    #[error("module: {0}")]
    Module(#[from] ModuleError),

    #[error("enter: {0}")]
    Enter(#[from] EnterError),

    #[error("kernel: {0}")]
    Kernel(#[from] KernelError),

    #[error("upgrade: {0}")]
    Upgrade(#[from] UpgradeError),
}

pub type BootliteResult<T> = Result<T, BootliteError>;
