//! Scoped temporary workspaces
//!
//! Downloads and package staging happen in a [`TempWorkspace`]: a uniquely
//! named directory that is removed when the workspace is dropped, on every
//! exit path including cancellation.

use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Temporary directory removed on drop
///
/// # Example
///
/// ```rust
/// use arbor::executor::TempWorkspace;
/// use tempfile::TempDir;
///
/// let root = TempDir::new().unwrap();
/// let path = {
///     let workspace = TempWorkspace::new(root.path(), "download").unwrap();
///     workspace.write_file("notes.txt", "staged").unwrap();
///     workspace.path().to_path_buf()
/// };
/// assert!(!path.exists());
/// ```
#[derive(Debug)]
pub struct TempWorkspace {
    /// Directory owned by this workspace
    path: PathBuf,

    /// Keep the directory after drop
    keep: bool,
}

impl TempWorkspace {
    /// Creates `<root>/<label>-<uuid>`
    ///
    /// # Errors
    ///
    /// Returns `std::io::Error` if the directory cannot be created
    pub fn new(root: impl AsRef<Path>, label: &str) -> std::io::Result<Self> {
        let path = root.as_ref().join(format!("{label}-{}", Uuid::new_v4()));
        fs::create_dir_all(&path)?;
        tracing::debug!(path = %path.display(), "Created temp workspace");
        Ok(Self { path, keep: false })
    }

    /// Creates a workspace under the system temp directory
    ///
    /// # Errors
    ///
    /// Returns `std::io::Error` if the directory cannot be created
    pub fn in_system_temp(label: &str) -> std::io::Result<Self> {
        Self::new(std::env::temp_dir(), label)
    }

    /// Writes a file inside the workspace and returns its path
    ///
    /// # Errors
    ///
    /// Returns `std::io::Error` if the file cannot be written
    pub fn write_file(&self, name: &str, content: &str) -> std::io::Result<PathBuf> {
        let file_path = self.path.join(name);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&file_path, content)?;
        Ok(file_path)
    }

    /// Lists the immediate subdirectories
    ///
    /// # Errors
    ///
    /// Returns `std::io::Error` if the directory cannot be read
    pub fn subdirectories(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                dirs.push(entry.path());
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    /// Keeps the directory on disk after drop
    #[must_use]
    pub fn persist(mut self) -> PathBuf {
        self.keep = true;
        self.path.clone()
    }

    /// Workspace directory
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempWorkspace {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        if let Err(e) = fs::remove_dir_all(&self.path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove temp workspace");
        }
    }
}
