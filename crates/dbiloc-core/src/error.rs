use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LocError {
    #[error("cannot read directory {path}: {source}")]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no matching base image and blueprint versions found")]
    NoMatchingVersions,

    #[error("version {0} not found in matching versions")]
    VersionNotFound(String),

    #[error("language {0} not found in available languages")]
    LanguageNotFound(String),

    #[error("cannot clean stale artifacts under {path}: {reason}")]
    CleanupFailed { path: PathBuf, reason: String },

    #[error("patch tool not found: {0}")]
    ToolNotFound(String),

    #[error("failed to spawn {program}: {reason}")]
    ToolSpawnFailed { program: String, reason: String },

    #[error("building the patch tool failed: {0}")]
    ToolBuildFailed(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, LocError>;
