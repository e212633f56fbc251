use crate::error::{LocError, Result};
use crate::naming;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// LayoutConfig
// ---------------------------------------------------------------------------

/// Directory layout relative to the project root. Absolute entries are used
/// as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayoutConfig {
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
    #[serde(default = "default_translations_dir")]
    pub translations_dir: PathBuf,
    #[serde(default = "default_blueprints_dir")]
    pub blueprints_dir: PathBuf,
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    #[serde(default = "default_tool_dir")]
    pub tool_dir: PathBuf,
}

fn default_base_dir() -> PathBuf {
    PathBuf::from(paths::BASE_DIR)
}

fn default_translations_dir() -> PathBuf {
    PathBuf::from(paths::TRANSLATIONS_DIR)
}

fn default_blueprints_dir() -> PathBuf {
    PathBuf::from(paths::BLUEPRINTS_DIR)
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(paths::WORK_DIR)
}

fn default_tool_dir() -> PathBuf {
    PathBuf::from(paths::TOOL_DIR)
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            translations_dir: default_translations_dir(),
            blueprints_dir: default_blueprints_dir(),
            work_dir: default_work_dir(),
            tool_dir: default_tool_dir(),
        }
    }
}

// ---------------------------------------------------------------------------
// NamingConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NamingConfig {
    #[serde(default = "default_image_prefix")]
    pub image_prefix: String,
    #[serde(default = "default_image_ext")]
    pub image_ext: String,
    /// Language of the base images. Never a build target.
    #[serde(default = "default_reference_language")]
    pub reference_language: String,
    /// Suffix of intermediate binary payloads removed by the cleaner.
    #[serde(default = "default_payload_ext")]
    pub payload_ext: String,
}

fn default_image_prefix() -> String {
    "DBI".to_string()
}

fn default_image_ext() -> String {
    "nro".to_string()
}

fn default_reference_language() -> String {
    "ru".to_string()
}

fn default_payload_ext() -> String {
    "bin".to_string()
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            image_prefix: default_image_prefix(),
            image_ext: default_image_ext(),
            reference_language: default_reference_language(),
            payload_ext: default_payload_ext(),
        }
    }
}

impl NamingConfig {
    /// Suffix identifying base images, e.g. `.ru.nro`.
    pub fn base_image_suffix(&self) -> String {
        format!(".{}.{}", self.reference_language, self.image_ext)
    }
}

// ---------------------------------------------------------------------------
// ToolConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolSource {
    /// Built in the project with the build command, found under `tool_dir`.
    #[default]
    Local,
    /// Already installed: `tool.path` or a `PATH` lookup.
    Installed,
}

impl ToolSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolSource::Local => "local",
            ToolSource::Installed => "installed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolConfig {
    #[serde(default = "default_tool_name")]
    pub name: String,
    #[serde(default)]
    pub source: ToolSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default = "default_build_command")]
    pub build_command: Vec<String>,
    #[serde(default = "default_clean_command")]
    pub clean_command: Vec<String>,
    /// Run `clean_command` before building the local tool.
    #[serde(default)]
    pub clean_before_build: bool,
}

fn default_tool_name() -> String {
    "dbipatcher".to_string()
}

fn default_build_command() -> Vec<String> {
    vec!["make".to_string(), "--no-print-directory".to_string()]
}

fn default_clean_command() -> Vec<String> {
    vec![
        "make".to_string(),
        "--no-print-directory".to_string(),
        "clean".to_string(),
    ]
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            name: default_tool_name(),
            source: ToolSource::default(),
            path: None,
            build_command: default_build_command(),
            clean_command: default_clean_command(),
            clean_before_build: false,
        }
    }
}

// ---------------------------------------------------------------------------
// CachePolicy
// ---------------------------------------------------------------------------

/// When the converted base text of a version may be reused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// Reuse whenever the file exists. Stale if the base image changed.
    #[default]
    Presence,
    /// Reuse only if the text is at least as new as the base image.
    Mtime,
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

/// Run configuration. Built once at the entry point and shared by reference;
/// no component looks up paths on its own. Unknown keys are rejected so a
/// misplaced setting fails the load instead of falling back to its default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(skip)]
    pub root: PathBuf,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub naming: NamingConfig,
    #[serde(default)]
    pub tool: ToolConfig,
    /// Artifacts at or below this many bytes are rejected.
    #[serde(default = "default_min_artifact_size")]
    pub min_artifact_size: u64,
    #[serde(default)]
    pub base_cache: CachePolicy,
}

fn default_min_artifact_size() -> u64 {
    1024
}

impl Config {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            layout: LayoutConfig::default(),
            naming: NamingConfig::default(),
            tool: ToolConfig::default(),
            min_artifact_size: default_min_artifact_size(),
            base_cache: CachePolicy::default(),
        }
    }

    /// Load `dbiloc.yaml` from `root`, falling back to defaults when absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::new(root));
        }
        let data = std::fs::read_to_string(&path)?;
        // An empty file deserializes to unit, not to a mapping.
        let mut cfg: Config = if data.trim().is_empty() {
            Self::new(root)
        } else {
            serde_yaml::from_str(&data)?
        };
        cfg.root = root.to_path_buf();
        Ok(cfg)
    }

    /// Like [`Config::validate`], but fails on the first error-level entry and
    /// hands back the remaining warnings.
    pub fn check(&self) -> Result<Vec<ConfigWarning>> {
        let warnings = self.validate();
        if let Some(err) = warnings.iter().find(|w| w.level == WarnLevel::Error) {
            return Err(LocError::InvalidConfig(err.message.clone()));
        }
        Ok(warnings)
    }

    fn resolve(&self, p: &Path) -> PathBuf {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }

    pub fn base_dir(&self) -> PathBuf {
        self.resolve(&self.layout.base_dir)
    }

    pub fn translations_dir(&self) -> PathBuf {
        self.resolve(&self.layout.translations_dir)
    }

    pub fn blueprints_dir(&self) -> PathBuf {
        self.resolve(&self.layout.blueprints_dir)
    }

    pub fn work_dir(&self) -> PathBuf {
        self.resolve(&self.layout.work_dir)
    }

    pub fn tool_dir(&self) -> PathBuf {
        self.resolve(&self.layout.tool_dir)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut error = |message: String| {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message,
            })
        };

        for (field, value) in [
            ("naming.image_prefix", &self.naming.image_prefix),
            ("naming.image_ext", &self.naming.image_ext),
            ("naming.payload_ext", &self.naming.payload_ext),
            ("tool.name", &self.tool.name),
        ] {
            if value.trim().is_empty() {
                error(format!("{field} must not be empty"));
            }
        }

        if !naming::is_language_code(&self.naming.reference_language) {
            error(format!(
                "naming.reference_language '{}' is not a language code",
                self.naming.reference_language
            ));
        }

        if self.tool.source == ToolSource::Local && self.tool.build_command.is_empty() {
            error("tool.build_command must not be empty for a local tool".to_string());
        }

        if self.tool.clean_before_build && self.tool.clean_command.is_empty() {
            error("tool.clean_before_build is set but tool.clean_command is empty".to_string());
        }

        if self.naming.payload_ext == self.naming.image_ext {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "naming.payload_ext and naming.image_ext are both '{}'; \
                     stale artifact cleanup will also remove previous outputs",
                    self.naming.image_ext
                ),
            });
        }

        if self.min_artifact_size == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "min_artifact_size is 0; any non-empty artifact is accepted".to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
