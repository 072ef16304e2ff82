//! Errors for upgrade coordination.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

use crate::kernel::KernelError;

#[derive(Debug, Error)]
pub enum UpgradeError {
    #[error("{path} is not a directory")]
    NotADirectory { path: PathBuf },

    #[error("validate {path}: {source}")]
    Validate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("source and destination are the same: {path}")]
    SameSourceDestination { path: PathBuf },

    /// Another upgrade holds the lock.
    #[error("upgrade already in progress: {path} is locked")]
    LockHeld { path: PathBuf },

    #[error("lock {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error("reboot helper {helper} not found on PATH")]
    HelperNotFound { helper: String },

    #[error("chroot {path}: {source}")]
    Chroot {
        path: PathBuf,
        #[source]
        source: nix::Error,
    },

    #[error("chdir /: {0}")]
    Chdir(#[source] nix::Error),

    #[error("spawn {helper}: {source}")]
    Spawn {
        helper: String,
        #[source]
        source: io::Error,
    },

    #[error("{helper} exited with {status}")]
    RebootFailed { helper: String, status: ExitStatus },
}

impl UpgradeError {
    pub fn validate(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Validate {
            path: path.into(),
            source,
        }
    }

    pub fn lock(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Lock {
            path: path.into(),
            source,
        }
    }
}
