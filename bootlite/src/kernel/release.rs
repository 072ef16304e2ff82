//! Running OS version from os-release.

use std::path::Path;

use super::error::KernelError;
use crate::constants::kernel::{RELEASE_FILES, VERSION_KEY};

/// `VERSION_ID` from the first release file under `root` that has one.
///
/// Unreadable files are skipped. The value is taken verbatim apart from
/// surrounding quotes.
pub fn read_version(root: &Path) -> Result<String, KernelError> {
    let searched: Vec<_> = RELEASE_FILES.iter().map(|file| root.join(file)).collect();

    for path in &searched {
        let Ok(content) = std::fs::read_to_string(path) else {
            continue;
        };
        if let Some(version) = parse_version(&content) {
            tracing::debug!(release_file = %path.display(), version = %version, "Found OS version");
            return Ok(version);
        }
    }

    Err(KernelError::ReleaseNotFound { searched })
}

pub fn parse_version(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let value = line.strip_prefix(VERSION_KEY)?.strip_prefix('=')?;
        Some(unquote(value).to_string())
    })
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}
