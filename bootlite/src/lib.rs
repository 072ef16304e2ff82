//! bootlite - boot transition and kernel rotation for an immutable OS image.
//!
//! Two independent flows live here:
//! - Early boot ([`enter`]): mount the squashfs system image over a loop
//!   device and exec the real init. Uses [`kmod`] to load `loop` and
//!   `squashfs` when they are not built in.
//! - Upgrade ([`upgrade`]): under an exclusive lock, install a new
//!   kernel/initrd pair with [`kernel`] and rotate the current/previous boot
//!   symlinks, optionally rebooting the host afterwards.

#[cfg(not(target_os = "linux"))]
compile_error!("bootlite is Linux-only; build with a Linux target");

pub mod constants;
pub mod enter;
pub mod errors;
pub mod kernel;
pub mod kmod;
pub mod upgrade;
pub mod util;

pub use errors::{BootliteError, BootliteResult};
pub use kernel::{KernelUpdate, copy_kernel};
pub use upgrade::{UpgradeConfig, UpgradeReport};
