//! Entry point discovery inside an extracted package

use crate::errors::{ArborError, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Finds the single file under `root` named like one of `entry_names`
///
/// Names are compared ignoring ASCII case.
///
/// # Errors
///
/// Returns [`ArborError::EntryPointCandidates`] with every match when there
/// is not exactly one.
pub fn locate_entry_point(root: &Path, entry_names: &[String]) -> Result<PathBuf> {
    let mut candidates: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unreadable package entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            let name = entry.file_name().to_string_lossy();
            entry_names.iter().any(|wanted| wanted.eq_ignore_ascii_case(&name))
        })
        .map(walkdir::DirEntry::into_path)
        .collect();
    candidates.sort();

    if candidates.len() == 1 {
        let entry = candidates.remove(0);
        tracing::debug!(entry = %entry.display(), "Located build tool entry point");
        return Ok(entry);
    }

    tracing::error!(
        root = %root.display(),
        candidates = ?candidates,
        "Expected exactly one build tool entry point"
    );
    Err(ArborError::EntryPointCandidates {
        root: root.to_path_buf(),
        candidates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn names() -> Vec<String> {
        vec!["arbor".to_string(), "arbor.exe".to_string()]
    }

    #[test]
    fn test_single_candidate() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("tools/bin")).unwrap();
        std::fs::write(dir.path().join("tools/bin/Arbor.exe"), "").unwrap();
        std::fs::write(dir.path().join("tools/readme.txt"), "").unwrap();

        let entry = locate_entry_point(dir.path(), &names()).unwrap();
        assert_eq!(entry, dir.path().join("tools/bin/Arbor.exe"));
    }

    #[test]
    fn test_no_candidate() {
        let dir = TempDir::new().unwrap();
        let err = locate_entry_point(dir.path(), &names()).unwrap_err();
        assert!(matches!(err, ArborError::EntryPointCandidates { ref candidates, .. } if candidates.is_empty()));
    }

    #[test]
    fn test_multiple_candidates_are_listed() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("a")).unwrap();
        std::fs::create_dir_all(dir.path().join("b")).unwrap();
        std::fs::write(dir.path().join("a/arbor"), "").unwrap();
        std::fs::write(dir.path().join("b/arbor"), "").unwrap();

        let err = locate_entry_point(dir.path(), &names()).unwrap_err();
        match err {
            ArborError::EntryPointCandidates { candidates, .. } => {
                assert_eq!(candidates, vec![dir.path().join("a/arbor"), dir.path().join("b/arbor")]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_directories_do_not_match() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("arbor")).unwrap();
        std::fs::write(dir.path().join("arbor/arbor"), "").unwrap();

        let entry = locate_entry_point(dir.path(), &names()).unwrap();
        assert_eq!(entry, dir.path().join("arbor/arbor"));
    }
}
