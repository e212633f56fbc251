//! Filename conventions shared by the catalog, the planner and the report.
//!
//! - base image:  `<prefix>.<version>.<base lang>.<ext>`  (`DBI.845.ru.nro`)
//! - blueprint:   `blueprint.<version>.txt`
//! - translation: `lang.<code>.txt`  (`lang.es.txt`, `lang.zh-cn.txt`)
//! - artifact:    `<prefix>.<version>.<code>.<ext>`

use regex::Regex;
use std::sync::OnceLock;

/// Version token taken from a filename. Compared for equality only.
pub type VersionId = String;

/// Lowercase language token, optionally hyphenated.
pub type LanguageCode = String;

static VERSION_RE: OnceLock<Regex> = OnceLock::new();
static LANGUAGE_FILE_RE: OnceLock<Regex> = OnceLock::new();
static LANGUAGE_CODE_RE: OnceLock<Regex> = OnceLock::new();

fn version_re() -> &'static Regex {
    VERSION_RE.get_or_init(|| Regex::new(r"\.([0-9]+)\.").unwrap())
}

fn language_file_re() -> &'static Regex {
    LANGUAGE_FILE_RE.get_or_init(|| Regex::new(r"^lang\.([a-z]+(?:-[a-z]+)?)\.txt$").unwrap())
}

fn language_code_re() -> &'static Regex {
    LANGUAGE_CODE_RE.get_or_init(|| Regex::new(r"^[a-z]+(?:-[a-z]+)?$").unwrap())
}

/// First `.<digits>.` run in `filename`, without the dots.
pub fn extract_version(filename: &str) -> Option<&str> {
    version_re()
        .captures(filename)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Language code of a `lang.<code>.txt` file.
pub fn extract_language(filename: &str) -> Option<&str> {
    language_file_re()
        .captures(filename)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

pub fn is_blueprint(filename: &str) -> bool {
    filename.starts_with("blueprint.") && filename.ends_with(".txt")
}

pub fn is_language_code(code: &str) -> bool {
    language_code_re().is_match(code)
}

pub fn blueprint_name(version: &str) -> String {
    format!("blueprint.{version}.txt")
}

pub fn language_file_name(code: &str) -> String {
    format!("lang.{code}.txt")
}

/// `<prefix>.<version>.<lang>.<ext>`; also names the base image when `lang`
/// is the reference language.
pub fn image_name(prefix: &str, version: &str, lang: &str, ext: &str) -> String {
    format!("{prefix}.{version}.{lang}.{ext}")
}

/// Inverse of [`image_name`] for a known prefix, version and extension.
/// Returns the language part when `filename` follows the convention.
pub fn artifact_language<'a>(
    filename: &'a str,
    prefix: &str,
    version: &str,
    ext: &str,
) -> Option<&'a str> {
    let lang = filename
        .strip_prefix(prefix)?
        .strip_prefix('.')?
        .strip_prefix(version)?
        .strip_prefix('.')?
        .strip_suffix(ext)?
        .strip_suffix('.')?;
    is_language_code(lang).then_some(lang)
}
