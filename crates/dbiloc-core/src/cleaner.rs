//! Removal of leftover binary payloads.
//!
//! The patch tool picks its conversion direction (text to binary or back)
//! from which files already exist, so a payload left behind by an earlier run
//! must be gone before the first stage of the next one.

use crate::error::{LocError, Result};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanReport {
    pub removed: Vec<PathBuf>,
    /// Files that matched but could not be deleted.
    pub failed: Vec<PathBuf>,
}

/// Recursively delete every file under `target_dir` whose name ends in
/// `.<payload_ext>`. A missing directory is a successful no-op. Individual
/// deletion failures are logged and reported; only a failed traversal is an
/// error, and the caller must not continue with a dirty tree.
pub fn clean_stale_artifacts(target_dir: &Path, payload_ext: &str) -> Result<CleanReport> {
    if !target_dir.exists() {
        tracing::debug!(dir = %target_dir.display(), "nothing to clean");
        return Ok(CleanReport::default());
    }
    if !target_dir.is_dir() {
        return Err(LocError::CleanupFailed {
            path: target_dir.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }
    clean_entries(target_dir, WalkDir::new(target_dir), payload_ext, |p| {
        std::fs::remove_file(p)
    })
}

/// Walk `entries` (rooted at `target_dir`) and delete matching payloads with
/// `remove`.
fn clean_entries<I, F>(
    target_dir: &Path,
    entries: I,
    payload_ext: &str,
    mut remove: F,
) -> Result<CleanReport>
where
    I: IntoIterator<Item = walkdir::Result<DirEntry>>,
    F: FnMut(&Path) -> io::Result<()>,
{
    let mut report = CleanReport::default();
    let suffix = format!(".{payload_ext}");
    for entry in entries {
        let entry = entry.map_err(|e| LocError::CleanupFailed {
            path: e
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| target_dir.to_path_buf()),
            reason: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .file_name()
            .to_str()
            .map(|n| n.ends_with(&suffix))
            .unwrap_or(false);
        if !matches {
            continue;
        }

        let path = entry.into_path();
        match remove(&path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "removed stale payload");
                report.removed.push(path);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "cannot remove stale payload: {e}");
                report.failed.push(path);
            }
        }
    }

    tracing::info!(
        dir = %target_dir.display(),
        removed = report.removed.len(),
        failed = report.failed.len(),
        "stale payload cleanup finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_directory_is_noop() {
        let dir = TempDir::new().unwrap();
        let report = clean_stale_artifacts(&dir.path().join("absent"), "bin").unwrap();
        assert!(report.removed.is_empty());
        assert!(report.failed.is_empty());
    }

    #[test]
    fn removes_payloads_recursively_and_keeps_the_rest() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("845/lang/es")).unwrap();
        std::fs::create_dir_all(root.join("845/output")).unwrap();
        std::fs::write(root.join("845/base.bin"), b"x").unwrap();
        std::fs::write(root.join("845/base.txt"), b"x").unwrap();
        std::fs::write(root.join("845/lang/es/lang.bin"), b"x").unwrap();
        std::fs::write(root.join("845/lang/es/keys.txt"), b"x").unwrap();
        std::fs::write(root.join("845/output/DBI.845.es.nro"), b"x").unwrap();
        std::fs::write(root.join("845/binder.txt"), b"x").unwrap();

        let report = clean_stale_artifacts(root, "bin").unwrap();
        assert_eq!(report.removed.len(), 2);
        assert!(!root.join("845/base.bin").exists());
        assert!(!root.join("845/lang/es/lang.bin").exists());
        assert!(root.join("845/base.txt").exists());
        assert!(root.join("845/lang/es/keys.txt").exists());
        assert!(root.join("845/output/DBI.845.es.nro").exists());
        assert!(root.join("845/binder.txt").exists());
    }

    #[test]
    fn cleaning_twice_is_idempotent() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.bin"), b"x").unwrap();
        assert_eq!(clean_stale_artifacts(dir.path(), "bin").unwrap().removed.len(), 1);
        assert!(clean_stale_artifacts(dir.path(), "bin").unwrap().removed.is_empty());
    }

    #[test]
    fn directories_with_payload_suffix_are_not_removed() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("cache.bin")).unwrap();
        let report = clean_stale_artifacts(dir.path(), "bin").unwrap();
        assert!(report.removed.is_empty());
        assert!(dir.path().join("cache.bin").is_dir());
    }

    #[test]
    fn target_that_is_a_file_fails() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("build");
        std::fs::write(&target, b"x").unwrap();
        let err = clean_stale_artifacts(&target, "bin").unwrap_err();
        match err {
            LocError::CleanupFailed { path, .. } => assert_eq!(path, target),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn undeletable_payload_is_reported_and_cleaning_continues() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::write(root.join("a.bin"), b"x").unwrap();
        std::fs::write(root.join("b.bin"), b"x").unwrap();
        let locked = root.join("a.bin");

        let report = clean_entries(root, WalkDir::new(root).sort_by_file_name(), "bin", |p| {
            if p == locked.as_path() {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked"))
            } else {
                std::fs::remove_file(p)
            }
        })
        .unwrap();

        assert_eq!(report.failed, vec![locked.clone()]);
        assert_eq!(report.removed, vec![root.join("b.bin")]);
        assert!(locked.exists());
        assert!(!root.join("b.bin").exists());
    }

    #[test]
    fn walk_error_stops_the_clean() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::write(root.join("a.bin"), b"x").unwrap();
        let missing = root.join("vanished");
        let entries = WalkDir::new(&missing).into_iter().chain(WalkDir::new(root));

        let mut removed = Vec::new();
        let err = clean_entries(root, entries, "bin", |p| {
            removed.push(p.to_path_buf());
            Ok(())
        })
        .unwrap_err();

        match err {
            LocError::CleanupFailed { path, .. } => assert_eq!(path, missing),
            other => panic!("unexpected error: {other}"),
        }
        assert!(removed.is_empty());
    }
}
