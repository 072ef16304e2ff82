//! Early boot: switch from the initrd into the squashfs system image.
//!
//! Runs as the initrd's init. The sequence is strictly linear with no
//! retries; the first failure stops it. On success the process is replaced
//! by `/usr/init` and [`run`] never returns.
//!
//! # Stages
//!
//! 1. Mount /proc and /dev
//! 2. Load the `loop` module (best effort)
//! 3. Create loop-control and loop0..loop6 nodes
//! 4. Raise log verbosity if debug is requested
//! 5. Locate `<argv[0]>.squashfs`
//! 6. Attach it to a read-only loop device with autoclear
//! 7. Mount it on `usr`, loading `squashfs` first if needed
//! 8. Confirm autoclear
//! 9. Link lib, lib64, bin, sbin into `usr`
//! 10. Verify `/usr/init`
//! 11. Unmount /dev and /proc
//! 12. exec `/usr/init` with the original argv and environment

pub mod devices;
pub mod error;
pub mod loopdev;
pub mod rootfs;

use std::convert::Infallible;
use std::ffi::{CString, OsStr, OsString};
use std::fmt;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

pub use error::{EnterError, FilesystemUnsupported};
pub use loopdev::LoopDevice;
pub use rootfs::LoopbackMount;

use crate::constants::boot::{
    DEBUG_CMDLINE, DEV_DIR, IMAGE_FSTYPE, IMAGE_SUFFIX, LOOP_MODULE, PROC_DIR, USR_DIR,
};
use crate::constants::envs::ENTER_DEBUG;
use crate::kmod;
use crate::util::LogHandle;

/// Steps of the boot sequence, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    PseudoFilesystems,
    LoopModule,
    LoopNodes,
    Debug,
    LocateImage,
    AttachImage,
    MountImage,
    ConfirmAutoclear,
    LinkSystemDirs,
    VerifyInit,
    Teardown,
    ExecInit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::PseudoFilesystems => "pseudo-filesystems",
            Stage::LoopModule => "loop-module",
            Stage::LoopNodes => "loop-nodes",
            Stage::Debug => "debug",
            Stage::LocateImage => "locate-image",
            Stage::AttachImage => "attach-image",
            Stage::MountImage => "mount-image",
            Stage::ConfirmAutoclear => "confirm-autoclear",
            Stage::LinkSystemDirs => "link-system-dirs",
            Stage::VerifyInit => "verify-init",
            Stage::Teardown => "teardown",
            Stage::ExecInit => "exec-init",
        };
        f.write_str(name)
    }
}

fn enter_stage(stage: Stage) {
    tracing::debug!(%stage, "Entering stage");
}

/// Inputs of the boot sequence.
#[derive(Debug, Clone)]
pub struct EnterConfig {
    /// New root; the image mounts at `<root>/usr`.
    pub root: PathBuf,
    pub proc_dir: PathBuf,
    pub dev_dir: PathBuf,
    /// The squashfs system image.
    pub image: PathBuf,
    /// argv handed to init unchanged.
    pub args: Vec<OsString>,
    /// Environment handed to init unchanged.
    pub env: Vec<(OsString, OsString)>,
    /// Value of the debug environment variable, if set.
    pub debug_env: Option<OsString>,
    /// Kernel command line word that enables debug logging.
    pub debug_marker: String,
}

impl EnterConfig {
    /// Build from this process's argv and environment.
    pub fn from_process() -> Result<Self, EnterError> {
        let args: Vec<OsString> = std::env::args_os().collect();
        let executable = args.first().ok_or(EnterError::NoExecutable)?;

        Ok(Self {
            root: PathBuf::from("/"),
            proc_dir: PathBuf::from(PROC_DIR),
            dev_dir: PathBuf::from(DEV_DIR),
            image: image_path(executable),
            args,
            env: std::env::vars_os().collect(),
            debug_env: std::env::var_os(ENTER_DEBUG),
            debug_marker: DEBUG_CMDLINE.to_string(),
        })
    }

    /// Debug is on if the environment says `true` or the kernel command line
    /// carries the marker word.
    fn debug_requested(&self) -> bool {
        let cmdline = std::fs::read_to_string(self.proc_dir.join("cmdline")).ok();
        debug_requested(
            self.debug_env.as_deref().and_then(OsStr::to_str),
            cmdline.as_deref(),
            &self.debug_marker,
        )
    }
}

/// `<executable>.squashfs`
pub fn image_path(executable: &OsStr) -> PathBuf {
    let mut image = executable.to_os_string();
    image.push(IMAGE_SUFFIX);
    PathBuf::from(image)
}

pub fn debug_requested(env_value: Option<&str>, cmdline: Option<&str>, marker: &str) -> bool {
    if env_value == Some("true") {
        return true;
    }
    if marker.is_empty() {
        return false;
    }
    cmdline.is_some_and(|line| line.split_whitespace().any(|word| word == marker))
}

/// Run the boot sequence and exec init.
///
/// Only returns on failure.
pub fn run(config: &EnterConfig, log: &LogHandle) -> Result<Infallible, EnterError> {
    enter_stage(Stage::PseudoFilesystems);
    devices::mount_pseudo_filesystems(&config.proc_dir, &config.dev_dir)?;

    enter_stage(Stage::LoopModule);
    // May be built into the kernel
    let _ = kmod::load(LOOP_MODULE);

    enter_stage(Stage::LoopNodes);
    devices::ensure_loop_nodes(&config.dev_dir)?;

    enter_stage(Stage::Debug);
    if config.debug_requested() {
        log.raise_to_debug();
        tracing::debug!("Debug logging enabled");
    }

    enter_stage(Stage::LocateImage);
    std::fs::metadata(&config.image).map_err(|source| EnterError::ImageNotFound {
        path: config.image.clone(),
        source,
    })?;

    enter_stage(Stage::AttachImage);
    tracing::debug!("Attaching file [{}]", config.image.display());
    let device = LoopDevice::attach(&config.dev_dir, &config.image, true)?;
    device.set_autoclear()?;

    enter_stage(Stage::MountImage);
    let target = config.root.join(USR_DIR);
    std::fs::create_dir_all(&target).map_err(|e| EnterError::create_dir(&target, e))?;
    let unsupported = rootfs::check_filesystem(&config.proc_dir, IMAGE_FSTYPE, kmod::load);
    let mount = rootfs::mount_image(device, &target, unsupported)?;

    enter_stage(Stage::ConfirmAutoclear);
    mount.confirm_autoclear()?;

    enter_stage(Stage::LinkSystemDirs);
    rootfs::link_system_dirs(&config.root)?;

    enter_stage(Stage::VerifyInit);
    let init = rootfs::verify_init(&config.root)?;

    enter_stage(Stage::Teardown);
    // The loop descriptor lives on /dev; close it before unmounting
    mount.release();
    devices::unmount_pseudo_filesystems(&config.proc_dir, &config.dev_dir)?;

    enter_stage(Stage::ExecInit);
    exec_init(&init, &config.args, &config.env)
}

fn exec_init(
    init: &Path,
    args: &[OsString],
    env: &[(OsString, OsString)],
) -> Result<Infallible, EnterError> {
    let path = to_cstring(init.as_os_str())?;
    let argv = args
        .iter()
        .map(|arg| to_cstring(arg))
        .collect::<Result<Vec<_>, _>>()?;
    let envp = env
        .iter()
        .map(|(key, value)| {
            let mut pair = key.clone();
            pair.push("=");
            pair.push(value);
            to_cstring(&pair)
        })
        .collect::<Result<Vec<_>, _>>()?;

    tracing::info!("Executing {}", init.display());
    nix::unistd::execve(&path, &argv, &envp).map_err(|source| EnterError::Exec {
        path: init.to_path_buf(),
        source,
    })
}

fn to_cstring(value: &OsStr) -> Result<CString, EnterError> {
    CString::new(value.as_bytes()).map_err(|_| EnterError::NulByte {
        value: value.to_string_lossy().into_owned(),
    })
}
