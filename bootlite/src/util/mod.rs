pub mod logging;

use std::fs::File;
use std::io;
use std::os::unix::fs::symlink;
use std::path::Path;

pub use logging::{LogHandle, init_logging};

/// Flush all filesystem buffers system-wide.
pub fn sync_all() {
    tracing::debug!("Syncing filesystems");
    nix::unistd::sync();
}

/// fsync a directory so renames and new entries in it are durable.
pub fn sync_directory(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

/// Remove whatever is at `link` (if anything) and point a new symlink at
/// `target`.
pub fn replace_symlink(target: &Path, link: &Path) -> io::Result<()> {
    match std::fs::remove_file(link) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    symlink(target, link)
}

/// Whether `link` resolves (through any number of symlinks) to the same file
/// as `target`. False if either side doesn't resolve.
pub fn resolves_to(link: &Path, target: &Path) -> bool {
    match (std::fs::canonicalize(link), std::fs::canonicalize(target)) {
        (Ok(resolved), Ok(expected)) => resolved == expected,
        _ => false,
    }
}
