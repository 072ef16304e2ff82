//! Kernel module loading.
//!
//! Looks up a module by short name under `/lib/modules/<release>/`,
//! decompresses it if needed and hands the image to `init_module(2)`.
//!
//! A missing module is reported as [`LoadOutcome::NotFound`], not an error:
//! callers decide whether that matters. Early boot loads `loop` and
//! `squashfs` speculatively and ignores the result, since either may be
//! built into the kernel.

pub mod codec;
pub mod error;

use std::ffi::CStr;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

pub use codec::Codec;
pub use error::ModuleError;

use crate::constants::paths::MODULES_ROOT;

/// A module file resolved for a requested name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleHandle {
    pub name: String,
    pub release: String,
    pub path: PathBuf,
}

/// Result of a load request that didn't fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded(ModuleHandle),
    /// The kernel already has a module by this name (`EEXIST`).
    AlreadyLoaded(ModuleHandle),
    /// No file in the release tree matches the name.
    NotFound,
}

/// Submits a module image to the kernel.
pub trait ModuleInserter {
    fn insert(&self, image: &[u8], params: &CStr) -> nix::Result<()>;
}

/// Inserts modules into the running kernel via `init_module(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct KernelInserter;

impl ModuleInserter for KernelInserter {
    fn insert(&self, image: &[u8], params: &CStr) -> nix::Result<()> {
        nix::kmod::init_module(image, params)
    }
}

/// Resolves and loads modules from one kernel release's tree.
#[derive(Debug)]
pub struct ModuleLoader<I = KernelInserter> {
    root: PathBuf,
    release: String,
    inserter: I,
}

impl ModuleLoader<KernelInserter> {
    /// Loader for the running kernel's release (`uname -r`).
    pub fn for_running_kernel() -> Result<Self, ModuleError> {
        let uts = nix::sys::utsname::uname().map_err(ModuleError::Uname)?;
        let release = uts.release().to_string_lossy().into_owned();
        if release.is_empty() {
            return Err(ModuleError::NoRelease);
        }
        Ok(Self::with_inserter(MODULES_ROOT, release, KernelInserter))
    }
}

impl<I: ModuleInserter> ModuleLoader<I> {
    /// Loader rooted at `<modules_root>/<release>` using a custom inserter.
    pub fn with_inserter(
        modules_root: impl AsRef<Path>,
        release: impl Into<String>,
        inserter: I,
    ) -> Self {
        let release = release.into();
        Self {
            root: modules_root.as_ref().join(&release),
            release,
            inserter,
        }
    }

    /// Release tree this loader searches.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Find the file for `name`: the first entry (in file-name order) whose
    /// name up to its first `.` equals `name`.
    pub fn resolve(&self, name: &str) -> Result<Option<ModuleHandle>, ModuleError> {
        if !self.root.is_dir() {
            tracing::debug!(root = %self.root.display(), "Module tree missing");
            return Ok(None);
        }

        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|source| ModuleError::Walk {
                root: self.root.clone(),
                source,
            })?;
            if entry.file_type().is_dir() {
                continue;
            }
            if module_base_name(entry.file_name().to_str()) == Some(name) {
                return Ok(Some(ModuleHandle {
                    name: name.to_string(),
                    release: self.release.clone(),
                    path: entry.into_path(),
                }));
            }
        }

        Ok(None)
    }

    /// Resolve `name`, decompress it and insert it with empty parameters.
    pub fn load(&self, name: &str) -> Result<LoadOutcome, ModuleError> {
        let Some(handle) = self.resolve(name)? else {
            tracing::debug!(module = name, release = %self.release, "Module not found");
            return Ok(LoadOutcome::NotFound);
        };

        let image = read_module(&handle.path)?;
        tracing::debug!(
            module = name,
            path = %handle.path.display(),
            size = image.len(),
            "Inserting module"
        );

        match self.inserter.insert(&image, c"") {
            Ok(()) => {
                tracing::info!(module = name, path = %handle.path.display(), "Loaded module");
                Ok(LoadOutcome::Loaded(handle))
            }
            Err(nix::Error::EEXIST) => {
                tracing::debug!(module = name, "Module already loaded");
                Ok(LoadOutcome::AlreadyLoaded(handle))
            }
            Err(e) => Err(ModuleError::insert(handle.path, e)),
        }
    }
}

/// Load `name` for the running kernel.
pub fn load(name: &str) -> Result<LoadOutcome, ModuleError> {
    ModuleLoader::for_running_kernel()?.load(name)
}

/// Read a module file, decompressing by suffix.
pub fn read_module(path: &Path) -> Result<Vec<u8>, ModuleError> {
    let data = std::fs::read(path).map_err(|e| ModuleError::read(path, e))?;
    let codec = Codec::from_path(path);
    codec
        .decode(data)
        .map_err(|e| ModuleError::decompress(path, codec, e))
}

/// `loop.ko.xz` -> `loop`. Names without a non-empty base (`.hidden`, or no
/// dot at all) never match.
fn module_base_name(file_name: Option<&str>) -> Option<&str> {
    let file_name = file_name?;
    match file_name.find('.') {
        Some(i) if i > 0 => Some(&file_name[..i]),
        _ => None,
    }
}
