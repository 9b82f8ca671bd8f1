//! Base directory resolution

use crate::errors::{ArborError, Result};
use std::path::{Path, PathBuf};

/// Marker directories of supported version control systems
const VCS_MARKERS: [&str; 2] = [".git", ".hg"];

/// Finds the nearest ancestor of `start` (inclusive) containing a VCS marker
#[must_use]
pub fn find_vcs_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| VCS_MARKERS.iter().any(|marker| dir.join(marker).exists()))
        .map(Path::to_path_buf)
}

/// Picks the directory to build
///
/// An explicit directory is used when it exists; otherwise the version
/// control root above `cwd` is used.
///
/// # Errors
///
/// Returns [`ArborError::InvalidConfiguration`] when neither is available.
pub fn resolve_base_directory(explicit: Option<&Path>, cwd: &Path) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        let dir = if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            cwd.join(dir)
        };
        if dir.is_dir() {
            tracing::info!(base_dir = %dir.display(), "Using explicit base directory");
            return Ok(dir);
        }
        tracing::warn!(base_dir = %dir.display(), "Explicit base directory does not exist, searching for repository root");
    }

    match find_vcs_root(cwd) {
        Some(root) => {
            tracing::info!(base_dir = %root.display(), "Using repository root as base directory");
            Ok(root)
        }
        None => {
            tracing::error!(cwd = %cwd.display(), "Could not resolve base directory");
            Err(ArborError::InvalidConfiguration(format!(
                "no base directory given and no repository root found above {}",
                cwd.display()
            )))
        }
    }
}
