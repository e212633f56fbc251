//! One build run: discover → plan → clean → stage base → per-language
//! (extract-keys → convert → patch) → report.
//!
//! Everything is sequential; each tool call is waited on before the next is
//! issued. Only discovery/planning and cleanup can abort a run. A failing
//! stage fails its own task and nothing else.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::catalog::AssetCatalog;
use crate::cleaner::{self, CleanReport};
use crate::config::{CachePolicy, Config};
use crate::error::Result;
use crate::naming::{self, LanguageCode, VersionId};
use crate::planner::{self, BuildMatrix, BuildTask, MatrixFilter};
use crate::tool_runner::{self, BuildResult, Invocation, Outcome, Stage, ToolRunner};
use crate::{io, paths};

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    pub version: VersionId,
    pub language: LanguageCode,
    /// Result of the patch stage, or of the stage that stopped the task.
    pub result: BuildResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactEntry {
    pub version: VersionId,
    pub language: LanguageCode,
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub cleaned: CleanReport,
    pub results: Vec<TaskResult>,
    /// Files found in each version's output directory after the run.
    pub artifacts: Vec<ArtifactEntry>,
}

impl RunReport {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn successful(&self) -> usize {
        self.results.iter().filter(|r| r.result.is_success()).count()
    }

    pub fn with_warnings(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.result.outcome == Outcome::SuccessWithWarning)
            .count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &TaskResult> {
        self.results.iter().filter(|r| !r.result.is_success())
    }

    /// A run succeeds unless it produced nothing at all.
    pub fn is_success(&self) -> bool {
        self.successful() > 0
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Drop the cached base text so every version is restaged.
    pub fresh: bool,
}

pub struct Orchestrator<'a> {
    cfg: &'a Config,
    runner: &'a dyn ToolRunner,
    tool: PathBuf,
    options: RunOptions,
}

impl<'a> Orchestrator<'a> {
    pub fn new(cfg: &'a Config, runner: &'a dyn ToolRunner, tool: PathBuf, options: RunOptions) -> Self {
        Self {
            cfg,
            runner,
            tool,
            options,
        }
    }

    /// Discover assets, plan and execute. Planning errors are returned before
    /// anything on disk is touched.
    pub fn run(&self, filter: &MatrixFilter) -> Result<RunReport> {
        let catalog = AssetCatalog::discover(self.cfg);
        let matrix = planner::plan_matrix(self.cfg, &catalog, filter)?;
        tracing::info!(
            versions = %matrix.versions.join(", "),
            languages = %matrix.languages.join(", "),
            tasks = matrix.tasks.len(),
            "build matrix planned"
        );
        self.execute(&matrix)
    }

    /// Execute a planned matrix. Fails only if stale payloads cannot be
    /// cleaned; per-task failures are recorded in the report.
    pub fn execute(&self, matrix: &BuildMatrix) -> Result<RunReport> {
        let started_at = Utc::now();
        let cleaned = cleaner::clean_stale_artifacts(&self.cfg.work_dir(), &self.cfg.naming.payload_ext)?;

        let mut results = Vec::with_capacity(matrix.tasks.len());
        let mut artifacts = Vec::new();

        for version in &matrix.versions {
            let tasks: Vec<&BuildTask> = matrix.tasks_for(version).collect();
            let Some(first) = tasks.first() else {
                continue;
            };

            match self.stage_base(version, &first.base_path) {
                Ok(()) => {
                    for task in &tasks {
                        let result = self.run_task(task);
                        results.push(TaskResult {
                            version: task.version.clone(),
                            language: task.language.clone(),
                            result,
                        });
                    }
                }
                Err(failed) => {
                    tracing::error!(
                        version = %version,
                        stage = %failed.stage,
                        "base staging failed, skipping {} language(s): {}",
                        tasks.len(),
                        failed.diagnostic
                    );
                    for task in &tasks {
                        let message = format!(
                            "base staging failed at {}: {}",
                            failed.stage, failed.diagnostic
                        );
                        results.push(TaskResult {
                            version: task.version.clone(),
                            language: task.language.clone(),
                            result: BuildResult::skipped(Stage::Patch, &task.output_path, message),
                        });
                    }
                }
            }

            artifacts.extend(list_artifacts(self.cfg, version));
        }

        let report = RunReport {
            started_at,
            finished_at: Utc::now(),
            cleaned,
            results,
            artifacts,
        };
        tracing::info!(
            successful = report.successful(),
            total = report.total(),
            warnings = report.with_warnings(),
            "build finished"
        );
        Ok(report)
    }

    /// Extract and convert the base image of `version` unless a usable base
    /// text is already on disk. Returns the failing stage's result on error.
    fn stage_base(&self, version: &str, image: &Path) -> std::result::Result<(), BuildResult> {
        let text = paths::base_text(self.cfg, version);
        if self.options.fresh {
            if let Err(e) = io::remove_if_exists(&text) {
                return Err(BuildResult::skipped(
                    Stage::Convert,
                    &text,
                    format!("cannot remove cached base text: {e}"),
                ));
            }
        }

        if base_text_is_current(self.cfg.base_cache, &text, image) {
            tracing::info!(version = %version, path = %text.display(), "base text cached, skipping extraction");
            return Ok(());
        }

        let payload = paths::base_payload(self.cfg, version);
        let extract = self.stage(version, None, &Invocation::extract(image, &payload));
        if !extract.is_success() {
            return Err(extract);
        }
        let convert = self.stage(version, None, &Invocation::convert(&payload, None, &text));
        if !convert.is_success() {
            return Err(convert);
        }
        Ok(())
    }

    fn run_task(&self, task: &BuildTask) -> BuildResult {
        let version = task.version.as_str();
        let lang = Some(task.language.as_str());
        let base_text = paths::base_text(self.cfg, version);
        let keys = paths::keys_file(self.cfg, version, &task.language);
        let payload = paths::language_payload(self.cfg, version, &task.language);

        let steps = [
            Invocation::extract_keys(&base_text, &task.lang_path, &keys),
            Invocation::convert(&task.lang_path, Some(&keys), &payload),
            Invocation::patch(
                &task.base_path,
                &payload,
                &task.blueprint_path,
                &task.output_path,
                self.cfg.min_artifact_size,
            ),
        ];

        let mut last = None;
        for step in &steps {
            let result = self.stage(version, lang, step);
            if !result.is_success() {
                tracing::warn!(
                    version = %version,
                    language = %task.language,
                    "skipping language after failed {} stage",
                    result.stage
                );
                return result;
            }
            last = Some(result);
        }
        last.unwrap_or_else(|| BuildResult::skipped(Stage::Patch, &task.output_path, "no stages ran"))
    }

    /// Invoke one stage with a status line before and after.
    fn stage(&self, version: &str, language: Option<&str>, invocation: &Invocation) -> BuildResult {
        let language = language.unwrap_or("base");
        tracing::info!(
            stage = %invocation.stage,
            version = %version,
            language = %language,
            output = %invocation.output.display(),
            "running"
        );

        let result = tool_runner::invoke(self.runner, &self.tool, invocation);
        match &result.outcome {
            Outcome::Success => tracing::info!(
                stage = %result.stage,
                version = %version,
                language = %language,
                size = result.size,
                "ok"
            ),
            Outcome::SuccessWithWarning => tracing::warn!(
                stage = %result.stage,
                version = %version,
                language = %language,
                size = result.size,
                "partial success: {}",
                result.diagnostic
            ),
            Outcome::Failure(_) => tracing::error!(
                stage = %result.stage,
                version = %version,
                language = %language,
                "failed: {}",
                result.diagnostic
            ),
        }
        result
    }
}

fn base_text_is_current(policy: CachePolicy, text: &Path, image: &Path) -> bool {
    if !text.is_file() {
        return false;
    }
    match policy {
        CachePolicy::Presence => true,
        CachePolicy::Mtime => match (io::modified(text), io::modified(image)) {
            (Some(t), Some(i)) => t >= i,
            _ => false,
        },
    }
}

/// Files in the output directory of `version` that follow the artifact
/// naming convention, sorted by language.
pub fn list_artifacts(cfg: &Config, version: &str) -> Vec<ArtifactEntry> {
    let dir = paths::output_dir(cfg, version);
    let Ok(entries) = std::fs::read_dir(&dir) else {
        return Vec::new();
    };

    let mut out: Vec<ArtifactEntry> = entries
        .filter_map(|e| e.ok())
        .filter_map(|entry| {
            let name = entry.file_name().into_string().ok()?;
            let language = naming::artifact_language(
                &name,
                &cfg.naming.image_prefix,
                version,
                &cfg.naming.image_ext,
            )?
            .to_string();
            let path = entry.path();
            let size = io::file_size(&path)?;
            Some(ArtifactEntry {
                version: version.to_string(),
                language,
                path,
                size,
            })
        })
        .collect();
    out.sort_by(|a, b| a.language.cmp(&b.language));
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
