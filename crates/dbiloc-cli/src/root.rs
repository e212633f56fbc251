use dbiloc_core::paths;
use std::path::{Path, PathBuf};

/// Resolve the project root.
///
/// Priority:
/// 1. `--root` flag / `DBILOC_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `dbiloc.yaml`
/// 3. Walk upward from `cwd` looking for the base image directory
/// 4. Fall back to `cwd`
///
/// The result is always absolute so that every path handed to the patch tool
/// is too.
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    if let Some(p) = explicit {
        return if p.is_absolute() {
            p.to_path_buf()
        } else {
            cwd.join(p)
        };
    }

    find_upward(&cwd, |dir| dir.join(paths::CONFIG_FILE).is_file())
        .or_else(|| find_upward(&cwd, |dir| dir.join(paths::BASE_DIR).is_dir()))
        .unwrap_or(cwd)
}

fn find_upward(start: &Path, found: impl Fn(&Path) -> bool) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| found(dir))
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_root_wins() {
        let dir = TempDir::new().unwrap();
        let result = resolve_root(Some(dir.path()));
        assert_eq!(result, dir.path());
    }

    #[test]
    fn relative_explicit_root_is_made_absolute() {
        let result = resolve_root(Some(Path::new("proj")));
        assert!(result.is_absolute());
        assert!(result.ends_with("proj"));
    }

    #[test]
    fn find_upward_prefers_nearest_match() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("dbi")).unwrap();
        let deep = dir.path().join("translate/blueprints");
        std::fs::create_dir_all(&deep).unwrap();

        let found = find_upward(&deep, |d| d.join("dbi").is_dir());
        assert_eq!(found.as_deref(), Some(dir.path()));
        assert_eq!(find_upward(&deep, |d| d.join("nope").is_dir()), None);
    }
}
