//! Errors for kernel module loading.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::codec::Codec;

/// Errors that can occur while resolving or inserting a kernel module.
///
/// A module that simply doesn't exist is not an error; see
/// [`LoadOutcome::NotFound`](super::LoadOutcome::NotFound).
#[derive(Debug, Error)]
pub enum ModuleError {
    /// `uname(2)` failed, so the release tree is unknown.
    #[error("uname: {0}")]
    Uname(#[source] nix::Error),

    /// The kernel reported an empty release string.
    #[error("kernel release is empty")]
    NoRelease,

    /// Walking the module tree failed part-way.
    #[error("walk {root}: {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("decompress {path} ({codec}): {source}")]
    Decompress {
        path: PathBuf,
        codec: Codec,
        #[source]
        source: io::Error,
    },

    /// `init_module(2)` rejected the image.
    #[error("init_module {path}: {source}")]
    Insert {
        path: PathBuf,
        #[source]
        source: nix::Error,
    },
}

impl ModuleError {
    pub fn read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    pub fn decompress(path: impl Into<PathBuf>, codec: Codec, source: io::Error) -> Self {
        Self::Decompress {
            path: path.into(),
            codec,
            source,
        }
    }

    pub fn insert(path: impl Into<PathBuf>, source: nix::Error) -> Self {
        Self::Insert {
            path: path.into(),
            source,
        }
    }
}
