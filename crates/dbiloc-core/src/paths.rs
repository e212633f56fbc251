use crate::config::Config;
use crate::naming;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const BASE_DIR: &str = "dbi";
pub const TRANSLATIONS_DIR: &str = "translate";
pub const BLUEPRINTS_DIR: &str = "translate/blueprints";
pub const WORK_DIR: &str = "build";
pub const TOOL_DIR: &str = "bin";

pub const CONFIG_FILE: &str = "dbiloc.yaml";

pub const OUTPUT_SUBDIR: &str = "output";
pub const LANGUAGES_SUBDIR: &str = "lang";
pub const BASE_STEM: &str = "base";
pub const KEYS_FILE: &str = "keys.txt";
pub const LANG_STEM: &str = "lang";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Per-version scratch directory holding payloads, texts and `output/`.
pub fn version_dir(cfg: &Config, version: &str) -> PathBuf {
    cfg.work_dir().join(version)
}

/// Binary payload extracted from the base image.
pub fn base_payload(cfg: &Config, version: &str) -> PathBuf {
    version_dir(cfg, version).join(format!("{BASE_STEM}.{}", cfg.naming.payload_ext))
}

/// Converted base text; its presence short-circuits base staging.
pub fn base_text(cfg: &Config, version: &str) -> PathBuf {
    version_dir(cfg, version).join(format!("{BASE_STEM}.txt"))
}

/// Scratch directory of one language. Kept under its own subdirectory so no
/// language code can land on `output/` or the base files.
pub fn language_dir(cfg: &Config, version: &str, lang: &str) -> PathBuf {
    version_dir(cfg, version).join(LANGUAGES_SUBDIR).join(lang)
}

pub fn keys_file(cfg: &Config, version: &str, lang: &str) -> PathBuf {
    language_dir(cfg, version, lang).join(KEYS_FILE)
}

pub fn language_payload(cfg: &Config, version: &str, lang: &str) -> PathBuf {
    language_dir(cfg, version, lang).join(format!("{LANG_STEM}.{}", cfg.naming.payload_ext))
}

pub fn output_dir(cfg: &Config, version: &str) -> PathBuf {
    version_dir(cfg, version).join(OUTPUT_SUBDIR)
}

pub fn artifact_path(cfg: &Config, version: &str, lang: &str) -> PathBuf {
    output_dir(cfg, version).join(naming::image_name(
        &cfg.naming.image_prefix,
        version,
        lang,
        &cfg.naming.image_ext,
    ))
}

/// Executable file name for `name` on the current platform.
pub fn executable_name(name: &str) -> String {
    if cfg!(windows) && !name.ends_with(".exe") {
        format!("{name}.exe")
    } else {
        name.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
