//! Errors for kernel artifact installation.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::artifact::ArtifactKind;

#[derive(Debug, Error)]
pub enum KernelError {
    /// None of the release files under the target root has a VERSION_ID.
    #[error("failed to find VERSION_ID in {searched:?}")]
    ReleaseNotFound { searched: Vec<PathBuf> },

    #[error("read manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A qualifying manifest entry names something other than a plain file
    /// name, or the name of a boot link.
    #[error("invalid artifact name in manifest: {name}")]
    InvalidName { name: String },

    #[error("hash {path}: {source}")]
    Hash {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path} does not match expected hash {expected}, got {actual}")]
    HashMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// The manifest must list exactly two vmlinuz/initrd entries.
    #[error("failed to find vmlinuz/initrd: found {found} artifact(s) {names:?}")]
    ArtifactCount { found: usize, names: Vec<String> },

    /// Two entries, but not one of each kind.
    #[error("expected one vmlinuz and one initrd, found two {kind} artifacts {names:?}")]
    DuplicateKind {
        kind: ArtifactKind,
        names: Vec<String>,
    },

    #[error("stat {path}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("install {from} => {to}: {source}")]
    Install {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl KernelError {
    pub fn install(from: impl Into<PathBuf>, to: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Install {
            from: from.into(),
            to: to.into(),
            source,
        }
    }
}

/// One symlink that couldn't be recreated.
#[derive(Debug, Error)]
#[error("symlink {link} => {target}: {source}")]
pub struct LinkError {
    pub link: PathBuf,
    pub target: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Every symlink failure from one rotation, in the order they happened.
#[derive(Debug)]
pub struct RotationErrors(Vec<LinkError>);

impl RotationErrors {
    /// `None` when nothing failed.
    pub fn from_errors(errors: Vec<LinkError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self(errors))
        }
    }

    pub fn errors(&self) -> &[LinkError] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RotationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} symlink(s) failed: ", self.0.len())?;
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for RotationErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    fn link_error(name: &str) -> LinkError {
        LinkError {
            link: PathBuf::from(format!("/boot/{}-current", name)),
            target: PathBuf::from(format!("/boot/{}-v2", name)),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        }
    }

    #[test]
    fn test_rotation_errors_empty_is_none() {
        assert!(RotationErrors::from_errors(vec![]).is_none());
    }

    #[test]
    fn test_rotation_errors_display_lists_all() {
        let errors =
            RotationErrors::from_errors(vec![link_error("vmlinuz"), link_error("initrd")]).unwrap();
        let msg = errors.to_string();

        assert_eq!(errors.len(), 2);
        assert!(msg.starts_with("2 symlink(s) failed: "));
        assert!(msg.contains("/boot/vmlinuz-current => /boot/vmlinuz-v2: denied"));
        assert!(msg.contains("; symlink /boot/initrd-current"));
    }

    #[test]
    fn test_hash_mismatch_display() {
        let err = KernelError::HashMismatch {
            path: PathBuf::from("/src/vmlinuz-v2"),
            expected: "aa".into(),
            actual: "bb".into(),
        };
        assert_eq!(
            err.to_string(),
            "/src/vmlinuz-v2 does not match expected hash aa, got bb"
        );
    }
}
