use crate::catalog::AssetCatalog;
use crate::config::Config;
use crate::error::{LocError, Result};
use crate::naming::{LanguageCode, VersionId};
use crate::paths;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Optional narrowing of the matrix requested by the user.
#[derive(Debug, Clone, Default)]
pub struct MatrixFilter {
    pub version: Option<String>,
    pub language: Option<String>,
}

/// One (version, language) unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildTask {
    pub version: VersionId,
    pub language: LanguageCode,
    pub base_path: PathBuf,
    pub blueprint_path: PathBuf,
    pub lang_path: PathBuf,
    pub output_path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildMatrix {
    pub versions: Vec<VersionId>,
    pub languages: Vec<LanguageCode>,
    /// Version-major: every language of the first version, then the next.
    pub tasks: Vec<BuildTask>,
}

impl BuildMatrix {
    pub fn tasks_for<'a>(&'a self, version: &'a str) -> impl Iterator<Item = &'a BuildTask> + 'a {
        self.tasks.iter().filter(move |t| t.version == version)
    }
}

/// Intersect base image and blueprint versions, apply the filters and expand
/// the remaining versions × languages into tasks. Pure: reads nothing from
/// disk.
pub fn plan_matrix(cfg: &Config, catalog: &AssetCatalog, filter: &MatrixFilter) -> Result<BuildMatrix> {
    let mut versions: BTreeSet<&VersionId> = catalog
        .base_images
        .keys()
        .filter(|v| catalog.blueprints.contains_key(*v))
        .collect();
    if versions.is_empty() {
        return Err(LocError::NoMatchingVersions);
    }

    if let Some(wanted) = filter.version.as_deref() {
        versions.retain(|v| v.as_str() == wanted);
        if versions.is_empty() {
            return Err(LocError::VersionNotFound(wanted.to_string()));
        }
    }

    let languages: Vec<(&LanguageCode, &PathBuf)> = match filter.language.as_deref() {
        Some(wanted) => {
            let (code, path) = catalog
                .translations
                .get_key_value(wanted)
                .ok_or_else(|| LocError::LanguageNotFound(wanted.to_string()))?;
            vec![(code, path)]
        }
        None => catalog.translations.iter().collect(),
    };

    let mut tasks = Vec::with_capacity(versions.len() * languages.len());
    for version in &versions {
        for (language, lang_path) in &languages {
            tasks.push(BuildTask {
                version: (*version).clone(),
                language: (*language).clone(),
                base_path: catalog.base_images[*version].clone(),
                blueprint_path: catalog.blueprints[*version].clone(),
                lang_path: (*lang_path).clone(),
                output_path: paths::artifact_path(cfg, version, language),
            });
        }
    }

    Ok(BuildMatrix {
        versions: versions.into_iter().cloned().collect(),
        languages: languages.into_iter().map(|(code, _)| code.clone()).collect(),
        tasks,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
