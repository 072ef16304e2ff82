//! Errors for the early boot sequence.
//!
//! Every variant names the step and path involved: there is no fallback init,
//! so the message is all anyone gets when boot stops.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// The kernel lacks a filesystem even after trying to load its module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("kernel does not support {fstype}")]
pub struct FilesystemUnsupported {
    pub fstype: String,
}

#[derive(Debug, Error)]
pub enum EnterError {
    /// Mounting /proc or /dev failed.
    #[error("mount {fstype} on {target}: {source}")]
    MountPseudo {
        fstype: &'static str,
        target: PathBuf,
        #[source]
        source: nix::Error,
    },

    #[error("unmount {target}: {source}")]
    Unmount {
        target: PathBuf,
        #[source]
        source: nix::Error,
    },

    #[error("create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("mknod {path}: {source}")]
    DeviceNode {
        path: PathBuf,
        #[source]
        source: nix::Error,
    },

    /// argv is empty, so the adjacent image can't be located.
    #[error("executable path (argv[0]) is missing")]
    NoExecutable,

    #[error("find system image {path}: {source}")]
    ImageNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A loop device ioctl failed; `op` names the request.
    #[error("loop {op} on {device}: {source}")]
    Loop {
        op: &'static str,
        device: PathBuf,
        #[source]
        source: nix::Error,
    },

    /// Mounting the system image failed. When the kernel also lacked the
    /// filesystem, that diagnostic is carried in `unsupported`.
    #[error(
        "mount {device} on {target}: {source}{}",
        .unsupported.as_ref().map(|u| format!(" ({})", u)).unwrap_or_default()
    )]
    MountImage {
        device: PathBuf,
        target: PathBuf,
        #[source]
        source: nix::Error,
        unsupported: Option<FilesystemUnsupported>,
    },

    #[error("remove {path}: {source}")]
    RemoveEntry {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("symlink {link} -> {target}: {source}")]
    Symlink {
        link: PathBuf,
        target: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("find init {path}: {source}")]
    InitNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("argument contains a NUL byte: {value}")]
    NulByte { value: String },

    /// execve returned, which only happens on failure.
    #[error("exec {path}: {source}")]
    Exec {
        path: PathBuf,
        #[source]
        source: nix::Error,
    },
}

impl EnterError {
    pub fn create_dir(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::CreateDir {
            path: path.into(),
            source,
        }
    }

    pub fn open(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Open {
            path: path.into(),
            source,
        }
    }

    pub fn loop_op(op: &'static str, device: impl Into<PathBuf>, source: nix::Error) -> Self {
        Self::Loop {
            op,
            device: device.into(),
            source,
        }
    }

    /// Secondary diagnostic attached to a failed image mount.
    pub fn unsupported(&self) -> Option<&FilesystemUnsupported> {
        match self {
            Self::MountImage { unsupported, .. } => unsupported.as_ref(),
            _ => None,
        }
    }
}
