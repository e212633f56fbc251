//! Discovery of base images, blueprints and translation files.
//!
//! Each scan covers one directory and never fails: an unreadable directory is
//! logged and yields an empty mapping, so a partial checkout still plans
//! whatever it can.

use crate::config::Config;
use crate::error::LocError;
use crate::naming::{self, LanguageCode, VersionId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize)]
pub struct AssetCatalog {
    pub base_images: BTreeMap<VersionId, PathBuf>,
    pub blueprints: BTreeMap<VersionId, PathBuf>,
    pub translations: BTreeMap<LanguageCode, PathBuf>,
}

impl AssetCatalog {
    pub fn discover(cfg: &Config) -> Self {
        let catalog = Self {
            base_images: scan_base_images(cfg),
            blueprints: scan_blueprints(cfg),
            translations: scan_translations(cfg),
        };
        tracing::info!(
            base_images = catalog.base_images.len(),
            blueprints = catalog.blueprints.len(),
            translations = catalog.translations.len(),
            "asset discovery complete"
        );
        catalog
    }
}

/// Base images ending in `.<reference>.<ext>`, keyed by version.
pub fn scan_base_images(cfg: &Config) -> BTreeMap<VersionId, PathBuf> {
    let suffix = cfg.naming.base_image_suffix();
    let mut out = BTreeMap::new();
    for (name, path) in list_files(&cfg.base_dir()) {
        if !name.ends_with(&suffix) {
            continue;
        }
        if let Some(version) = naming::extract_version(&name) {
            out.insert(version.to_string(), path);
        }
    }
    out
}

/// `blueprint.<version>.txt` files, keyed by version.
pub fn scan_blueprints(cfg: &Config) -> BTreeMap<VersionId, PathBuf> {
    let mut out = BTreeMap::new();
    for (name, path) in list_files(&cfg.blueprints_dir()) {
        if !naming::is_blueprint(&name) {
            continue;
        }
        if let Some(version) = naming::extract_version(&name) {
            out.insert(version.to_string(), path);
        }
    }
    out
}

/// `lang.<code>.txt` files keyed by code, without the reference language.
pub fn scan_translations(cfg: &Config) -> BTreeMap<LanguageCode, PathBuf> {
    let mut out = BTreeMap::new();
    for (name, path) in list_files(&cfg.translations_dir()) {
        match naming::extract_language(&name) {
            Some(code) if code != cfg.naming.reference_language => {
                out.insert(code.to_string(), path);
            }
            _ => {}
        }
    }
    out
}

/// Non-directory entries of `dir` with UTF-8 names. Logs and returns nothing
/// when the directory cannot be listed.
fn list_files(dir: &Path) -> Vec<(String, PathBuf)> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(source) => {
            let err = LocError::DirectoryUnreadable {
                path: dir.to_path_buf(),
                source,
            };
            tracing::warn!("{err}");
            return Vec::new();
        }
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), "skipping unreadable entry: {e}");
                continue;
            }
        };
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }
        if let Ok(name) = entry.file_name().into_string() {
            files.push((name, entry.path()));
        }
    }
    files
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: PathBuf) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"x").unwrap();
    }

    fn project() -> (TempDir, Config) {
        let dir = TempDir::new().unwrap();
        let cfg = Config::new(dir.path());
        (dir, cfg)
    }

    #[test]
    fn base_images_keyed_by_version() {
        let (_dir, cfg) = project();
        touch(cfg.base_dir().join("DBI.845.ru.nro"));
        touch(cfg.base_dir().join("DBI.846.ru.nro"));
        touch(cfg.base_dir().join("DBI.845.en.nro"));
        touch(cfg.base_dir().join("readme.txt"));

        let images = scan_base_images(&cfg);
        assert_eq!(images.len(), 2);
        assert_eq!(images["845"], cfg.base_dir().join("DBI.845.ru.nro"));
        assert!(images.contains_key("846"));
    }

    #[test]
    fn blueprints_keyed_by_version() {
        let (_dir, cfg) = project();
        touch(cfg.blueprints_dir().join("blueprint.845.txt"));
        touch(cfg.blueprints_dir().join("blueprint.txt"));
        touch(cfg.blueprints_dir().join("notes.845.txt"));

        let blueprints = scan_blueprints(&cfg);
        assert_eq!(blueprints.len(), 1);
        assert_eq!(
            blueprints["845"],
            cfg.blueprints_dir().join("blueprint.845.txt")
        );
    }

    #[test]
    fn translations_exclude_reference_language() {
        let (_dir, cfg) = project();
        for code in ["ru", "es", "zh-cn"] {
            touch(cfg.translations_dir().join(naming::language_file_name(code)));
        }
        touch(cfg.translations_dir().join("lang.EN.txt"));

        let langs = scan_translations(&cfg);
        assert!(!langs.contains_key("ru"));
        assert_eq!(langs["es"], cfg.translations_dir().join("lang.es.txt"));
        assert!(langs.contains_key("zh-cn"));
        assert_eq!(langs.len(), 2);
    }

    #[test]
    fn blueprint_subdirectory_is_not_a_translation() {
        let (_dir, cfg) = project();
        touch(cfg.blueprints_dir().join("blueprint.845.txt"));
        touch(cfg.translations_dir().join("lang.es.txt"));
        let langs = scan_translations(&cfg);
        assert_eq!(langs.len(), 1);
    }

    #[test]
    fn missing_directories_yield_empty_catalog() {
        let (_dir, cfg) = project();
        let catalog = AssetCatalog::discover(&cfg);
        assert!(catalog.base_images.is_empty());
        assert!(catalog.blueprints.is_empty());
        assert!(catalog.translations.is_empty());
    }
}
