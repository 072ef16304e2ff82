//! Constants for bootlite
//!
//! Centralized location for hardcoded paths, file names and environment
//! variables shared by the boot sequencer, the module loader and the
//! upgrade path.

/// Well-known locations on the installed system.
pub mod paths {
    /// Root of the installed system (source and destination of upgrades).
    pub const SYSTEM_ROOT: &str = "/bootlite/system";

    /// Directory holding persistent bootlite state.
    pub const STATE_DIR: &str = "/var/lib/bootlite";

    /// Upgrade lock, inside [`STATE_DIR`].
    pub const UPGRADE_LOCK: &str = "/var/lib/bootlite/upgrade.lock";

    /// Kernel module tree root, one subdirectory per kernel release.
    pub const MODULES_ROOT: &str = "/lib/modules";
}

/// Boot-time (pre-root) paths and device numbers.
pub mod boot {
    pub const PROC_DIR: &str = "/proc";
    pub const DEV_DIR: &str = "/dev";

    /// Mount target of the system image, relative to the new root.
    pub const USR_DIR: &str = "usr";

    /// Final init, exec'd once the system image is mounted.
    pub const INIT_PATH: &str = "usr/init";

    /// Suffix appended to argv[0] to locate the system image.
    pub const IMAGE_SUFFIX: &str = ".squashfs";

    pub const IMAGE_FSTYPE: &str = "squashfs";

    /// Top-level entries redirected into the mounted image.
    pub const SYSTEM_LINKS: &[&str] = &["lib", "lib64", "bin", "sbin"];

    /// Entry removed before linking, since the initrd ships its own.
    pub const STALE_LIB: &str = "lib";

    pub const LOOP_CONTROL: &str = "loop-control";
    pub const LOOP_CONTROL_MAJOR: u64 = 10;
    pub const LOOP_CONTROL_MINOR: u64 = 237;
    pub const LOOP_MAJOR: u64 = 7;

    /// Number of static loopN nodes created under /dev.
    pub const STATIC_LOOP_NODES: u64 = 7;

    pub const LOOP_MODULE: &str = "loop";
    pub const SQUASHFS_MODULE: &str = "squashfs";

    /// Kernel command line word that enables debug logging.
    ///
    /// Overridable at build time through `BOOTLITE_DEBUG_CMDLINE`.
    pub const DEBUG_CMDLINE: &str = match option_env!("BOOTLITE_DEBUG_CMDLINE") {
        Some(marker) => marker,
        None => "bootlite.debug",
    };
}

/// Kernel artifact naming in `<root>/boot`.
pub mod kernel {
    pub const BOOT_DIR: &str = "boot";

    /// Checksum manifest file name inside the upgrade source.
    pub const MANIFEST: &str = "sha256sum";

    pub const KERNEL_PREFIX: &str = "vmlinuz";
    pub const INITRD_PREFIX: &str = "initrd";

    pub const CURRENT_SUFFIX: &str = "current";
    pub const PREVIOUS_SUFFIX: &str = "previous";

    /// Release metadata, searched in order relative to the target root.
    pub const RELEASE_FILES: &[&str] = &["usr/lib/os-release", "etc/os-release"];

    pub const VERSION_KEY: &str = "VERSION_ID";
}

/// Environment variables
pub mod envs {
    pub const ENTER_DEBUG: &str = "BOOTLITE_ENTER_DEBUG";
    pub const UPGRADE_REBOOT: &str = "BOOTLITE_UPGRADE_REBOOT";
    pub const UPGRADE_SOURCE: &str = "BOOTLITE_UPGRADE_SOURCE";
    pub const UPGRADE_DESTINATION: &str = "BOOTLITE_UPGRADE_DESTINATION";
    pub const UPGRADE_LOCK_FILE: &str = "BOOTLITE_UPGRADE_LOCK_FILE";
}

/// Host reboot helper invocation.
pub mod reboot {
    /// Namespace-entering helper looked up on `PATH`.
    pub const HELPER: &str = "nsenter";

    /// Enter mount, uts, ipc, net and pid namespaces of PID 1, then reboot.
    pub const HELPER_ARGS: &[&str] = &["-m", "-u", "-i", "-n", "-p", "-t", "1", "reboot"];
}
