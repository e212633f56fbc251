//! Resolution and invocation of the external patch tool.
//!
//! Every stage is one process call with a fixed flag/value argument list.
//! The tool's exit code is advisory: it exits nonzero for recoverable
//! problems (unmapped glyphs and the like) while still writing a usable file.
//! The file it was asked to produce is therefore the primary evidence.
//!
//! # Outcome
//! - output missing                 → `Failure(ArtifactNotProduced)`
//! - output size `<=` floor          → `Failure(ArtifactTooSmall)`
//! - output ok, exit 0               → `Success`
//! - output ok, nonzero / no exit    → `SuccessWithWarning`

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Serialize;
use thiserror::Error;

use crate::config::{Config, ToolSource};
use crate::error::{LocError, Result};
use crate::{io, paths};

// ---------------------------------------------------------------------------
// Stage / Invocation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Extract,
    ExtractKeys,
    Convert,
    Patch,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Extract => "extract",
            Stage::ExtractKeys => "extract-keys",
            Stage::Convert => "convert",
            Stage::Patch => "patch",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single stage call: the argument list plus the file it must produce.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub stage: Stage,
    pub args: Vec<OsString>,
    pub output: PathBuf,
    /// Size floor in bytes; the output must be strictly larger.
    pub min_size: u64,
}

impl Invocation {
    fn new(stage: Stage, flags: &[(&str, &Path)], output: &Path, min_size: u64) -> Self {
        let mut args: Vec<OsString> = vec![stage.as_str().into()];
        for (flag, value) in flags {
            args.push((*flag).into());
            args.push(value.as_os_str().to_owned());
        }
        args.push("--output".into());
        args.push(output.as_os_str().to_owned());
        Self {
            stage,
            args,
            output: output.to_path_buf(),
            min_size,
        }
    }

    /// `extract --input <image> --output <payload>`
    pub fn extract(image: &Path, output: &Path) -> Self {
        Self::new(Stage::Extract, &[("--input", image)], output, 0)
    }

    /// `convert --input <file> [--keys <keys>] --output <file>`; the tool
    /// converts binary to text or text to binary depending on the input.
    pub fn convert(input: &Path, keys: Option<&Path>, output: &Path) -> Self {
        let mut flags = vec![("--input", input)];
        if let Some(keys) = keys {
            flags.push(("--keys", keys));
        }
        Self::new(Stage::Convert, &flags, output, 0)
    }

    /// `extract-keys --input <base text> --lang <translation> --output <keys>`
    pub fn extract_keys(base_text: &Path, lang: &Path, output: &Path) -> Self {
        Self::new(
            Stage::ExtractKeys,
            &[("--input", base_text), ("--lang", lang)],
            output,
            0,
        )
    }

    /// `patch --input <image> --binary <payload> --slot <blueprint> --output <artifact>`
    pub fn patch(image: &Path, binary: &Path, blueprint: &Path, output: &Path, min_size: u64) -> Self {
        Self::new(
            Stage::Patch,
            &[("--input", image), ("--binary", binary), ("--slot", blueprint)],
            output,
            min_size,
        )
    }

    pub fn command_line(&self, program: &Path) -> String {
        std::iter::once(program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// ---------------------------------------------------------------------------
// Outcome / BuildResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("output file was not created")]
    ArtifactNotProduced,

    #[error("output file is too small ({size} bytes, need more than {min_size})")]
    ArtifactTooSmall { size: u64, min_size: u64 },

    #[error("could not start the tool: {message}")]
    SpawnFailed { message: String },

    #[error("{message}")]
    Skipped { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success,
    SuccessWithWarning,
    Failure(FailureReason),
}

impl Outcome {
    /// True for both full and partial success.
    pub fn is_success(&self) -> bool {
        !matches!(self, Outcome::Failure(_))
    }
}

/// What one invocation left behind.
#[derive(Debug, Clone, Serialize)]
pub struct BuildResult {
    pub stage: Stage,
    pub outcome: Outcome,
    pub output: PathBuf,
    pub size: u64,
    pub exit_code: Option<i32>,
    pub diagnostic: String,
}

impl BuildResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    /// A failure that happened before the tool could be asked, e.g. because
    /// an earlier stage of the same task failed.
    pub fn skipped(stage: Stage, output: &Path, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            stage,
            outcome: Outcome::Failure(FailureReason::Skipped {
                message: message.clone(),
            }),
            output: output.to_path_buf(),
            size: 0,
            exit_code: None,
            diagnostic: message,
        }
    }
}

/// Judge an invocation by the file it produced first and its exit code
/// second. `exit_code` is None when the process was killed by a signal.
pub fn evaluate(output: &Path, min_size: u64, exit_code: Option<i32>) -> (Outcome, u64) {
    let Some(size) = io::file_size(output) else {
        return (Outcome::Failure(FailureReason::ArtifactNotProduced), 0);
    };
    if size <= min_size {
        return (
            Outcome::Failure(FailureReason::ArtifactTooSmall { size, min_size }),
            size,
        );
    }
    match exit_code {
        Some(0) => (Outcome::Success, size),
        _ => (Outcome::SuccessWithWarning, size),
    }
}

// ---------------------------------------------------------------------------
// ToolRunner
// ---------------------------------------------------------------------------

/// Runs a program to completion and reports its exit code. The real
/// implementation spawns a process; tests substitute a fake that writes the
/// expected files.
pub trait ToolRunner {
    fn execute(&self, program: &Path, args: &[OsString], cwd: Option<&Path>) -> Result<Option<i32>>;
}

/// Spawns the program with inherited stdout/stderr so its output reaches the
/// console untouched, and blocks until it exits.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ToolRunner for ProcessRunner {
    fn execute(&self, program: &Path, args: &[OsString], cwd: Option<&Path>) -> Result<Option<i32>> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());

        let status = cmd.status().map_err(|e| LocError::ToolSpawnFailed {
            program: program.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(status.code())
    }
}

/// Run one stage exactly once and judge it by its output file.
///
/// A file already sitting at the output path is removed first, so whatever
/// is found afterwards was written by this call.
pub fn invoke(runner: &dyn ToolRunner, tool: &Path, invocation: &Invocation) -> BuildResult {
    let output = &invocation.output;
    let prepared = output
        .parent()
        .map(io::ensure_dir)
        .unwrap_or(Ok(()))
        .and_then(|()| io::remove_if_exists(output).map(|_| ()));
    if let Err(e) = prepared {
        return BuildResult::skipped(
            invocation.stage,
            output,
            format!("cannot prepare {}: {e}", output.display()),
        );
    }

    tracing::debug!(command = %invocation.command_line(tool), "invoking patch tool");
    let exit_code = match runner.execute(tool, &invocation.args, None) {
        Ok(code) => code,
        Err(e) => {
            return BuildResult {
                stage: invocation.stage,
                outcome: Outcome::Failure(FailureReason::SpawnFailed {
                    message: e.to_string(),
                }),
                output: output.clone(),
                size: 0,
                exit_code: None,
                diagnostic: e.to_string(),
            };
        }
    };

    let (outcome, size) = evaluate(output, invocation.min_size, exit_code);
    let code = exit_code.map_or_else(|| "none".to_string(), |c| c.to_string());
    let diagnostic = match &outcome {
        Outcome::Success => format!("exit code {code}"),
        Outcome::SuccessWithWarning => {
            format!("exit code {code}, accepted because the output file was created")
        }
        Outcome::Failure(reason) => format!("{reason} (exit code {code})"),
    };

    BuildResult {
        stage: invocation.stage,
        outcome,
        output: output.clone(),
        size,
        exit_code,
        diagnostic,
    }
}

// ---------------------------------------------------------------------------
// Tool resolution and local build
// ---------------------------------------------------------------------------

/// Locate the patch tool for the configured source.
///
/// `local` checks `<tool_dir>/<name>`, then `./bin/<name>` and `./<name>`
/// relative to the working directory. `installed` uses `tool.path` when set,
/// otherwise a `PATH` lookup.
pub fn resolve_tool(cfg: &Config) -> Result<PathBuf> {
    if let Some(explicit) = &cfg.tool.path {
        return if explicit.exists() {
            Ok(explicit.clone())
        } else {
            Err(LocError::ToolNotFound(explicit.display().to_string()))
        };
    }

    let exe = paths::executable_name(&cfg.tool.name);
    match cfg.tool.source {
        ToolSource::Local => {
            let mut candidates = vec![cfg.tool_dir().join(&exe)];
            if let Ok(cwd) = std::env::current_dir() {
                candidates.push(cwd.join(paths::TOOL_DIR).join(&exe));
                candidates.push(cwd.join(&exe));
            }
            candidates
                .iter()
                .find(|p| p.is_file())
                .cloned()
                .ok_or_else(|| LocError::ToolNotFound(candidates[0].display().to_string()))
        }
        ToolSource::Installed => {
            which::which(&cfg.tool.name).map_err(|_| LocError::ToolNotFound(cfg.tool.name.clone()))
        }
    }
}

/// Build the local tool with the build-graph command, optionally cleaning
/// first. Runs in the project root.
pub fn build_local_tool(runner: &dyn ToolRunner, cfg: &Config) -> Result<()> {
    if cfg.tool.clean_before_build {
        run_build_command(runner, cfg, &cfg.tool.clean_command)?;
    }
    run_build_command(runner, cfg, &cfg.tool.build_command)
}

fn run_build_command(runner: &dyn ToolRunner, cfg: &Config, argv: &[String]) -> Result<()> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| LocError::InvalidConfig("empty build command".to_string()))?;
    let args: Vec<OsString> = args.iter().map(OsString::from).collect();
    tracing::info!(command = %argv.join(" "), "building patch tool");

    let code = runner.execute(Path::new(program), &args, Some(&cfg.root))?;
    if code != Some(0) {
        let code = code.map_or_else(|| "none".to_string(), |c| c.to_string());
        return Err(LocError::ToolBuildFailed(format!(
            "'{}' exited with code {code}",
            argv.join(" ")
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Writes `size` bytes to the `--output` argument and returns `code`.
    struct FakeRunner {
        size: Option<usize>,
        code: Option<i32>,
        calls: RefCell<Vec<Vec<OsString>>>,
    }

    impl FakeRunner {
        fn new(size: Option<usize>, code: Option<i32>) -> Self {
            Self {
                size,
                code,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl ToolRunner for FakeRunner {
        fn execute(&self, _program: &Path, args: &[OsString], _cwd: Option<&Path>) -> Result<Option<i32>> {
            self.calls.borrow_mut().push(args.to_vec());
            if let Some(size) = self.size {
                let pos = args.iter().position(|a| a == "--output").unwrap();
                std::fs::write(&args[pos + 1], vec![b'x'; size]).unwrap();
            }
            Ok(self.code)
        }
    }

    struct FailingSpawn;

    impl ToolRunner for FailingSpawn {
        fn execute(&self, program: &Path, _args: &[OsString], _cwd: Option<&Path>) -> Result<Option<i32>> {
            Err(LocError::ToolSpawnFailed {
                program: program.display().to_string(),
                reason: "no such file".to_string(),
            })
        }
    }

    fn patch_in(dir: &TempDir) -> Invocation {
        Invocation::patch(
            Path::new("/in/DBI.845.ru.nro"),
            Path::new("/w/lang.bin"),
            Path::new("/bp/blueprint.845.txt"),
            &dir.path().join("output/DBI.845.es.nro"),
            1024,
        )
    }

    #[test]
    fn evaluate_matrix() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.nro");

        assert_eq!(
            evaluate(&path, 1024, Some(0)).0,
            Outcome::Failure(FailureReason::ArtifactNotProduced)
        );
        assert_eq!(
            evaluate(&path, 1024, Some(3)).0,
            Outcome::Failure(FailureReason::ArtifactNotProduced)
        );

        std::fs::write(&path, vec![0u8; 1024]).unwrap();
        assert_eq!(
            evaluate(&path, 1024, Some(0)),
            (
                Outcome::Failure(FailureReason::ArtifactTooSmall {
                    size: 1024,
                    min_size: 1024
                }),
                1024
            )
        );

        std::fs::write(&path, vec![0u8; 1025]).unwrap();
        assert_eq!(evaluate(&path, 1024, Some(0)), (Outcome::Success, 1025));
        assert_eq!(
            evaluate(&path, 1024, Some(2)),
            (Outcome::SuccessWithWarning, 1025)
        );
        assert_eq!(
            evaluate(&path, 1024, None),
            (Outcome::SuccessWithWarning, 1025)
        );
    }

    #[test]
    fn empty_file_fails_with_zero_floor() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("keys.txt");
        std::fs::write(&path, b"").unwrap();
        assert!(!evaluate(&path, 0, Some(0)).0.is_success());
    }

    #[test]
    fn patch_arguments_follow_contract() {
        let dir = TempDir::new().unwrap();
        let inv = patch_in(&dir);
        let args: Vec<String> = inv
            .args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            &args[..7],
            &[
                "patch",
                "--input",
                "/in/DBI.845.ru.nro",
                "--binary",
                "/w/lang.bin",
                "--slot",
                "/bp/blueprint.845.txt"
            ]
        );
        assert_eq!(args[7], "--output");
        assert_eq!(inv.min_size, 1024);
    }

    #[test]
    fn convert_keys_flag_is_optional() {
        let with = Invocation::convert(Path::new("a"), Some(Path::new("k")), Path::new("b"));
        let without = Invocation::convert(Path::new("a"), None, Path::new("b"));
        assert!(with.args.iter().any(|a| a == "--keys"));
        assert!(!without.args.iter().any(|a| a == "--keys"));
        assert_eq!(with.command_line(Path::new("tool")), "tool convert --input a --keys k --output b");
    }

    #[test]
    fn invoke_success_and_partial() {
        let dir = TempDir::new().unwrap();
        let inv = patch_in(&dir);

        let ok = invoke(&FakeRunner::new(Some(4096), Some(0)), Path::new("tool"), &inv);
        assert_eq!(ok.outcome, Outcome::Success);
        assert_eq!(ok.size, 4096);
        assert_eq!(ok.exit_code, Some(0));

        let partial = invoke(&FakeRunner::new(Some(4096), Some(1)), Path::new("tool"), &inv);
        assert_eq!(partial.outcome, Outcome::SuccessWithWarning);
        assert!(partial.is_success());
        assert!(partial.diagnostic.contains("exit code 1"));
    }

    #[test]
    fn invoke_ignores_output_left_by_earlier_runs() {
        let dir = TempDir::new().unwrap();
        let inv = patch_in(&dir);
        std::fs::create_dir_all(inv.output.parent().unwrap()).unwrap();
        std::fs::write(&inv.output, vec![0u8; 4096]).unwrap();

        let runner = FakeRunner::new(None, Some(0));
        let res = invoke(&runner, Path::new("tool"), &inv);
        assert_eq!(res.outcome, Outcome::Failure(FailureReason::ArtifactNotProduced));
        assert_eq!(runner.calls.borrow().len(), 1);
    }

    #[test]
    fn invoke_small_output_fails() {
        let dir = TempDir::new().unwrap();
        let res = invoke(&FakeRunner::new(Some(10), Some(0)), Path::new("tool"), &patch_in(&dir));
        assert!(matches!(
            res.outcome,
            Outcome::Failure(FailureReason::ArtifactTooSmall { size: 10, .. })
        ));
    }

    #[test]
    fn invoke_spawn_failure_is_a_task_failure() {
        let dir = TempDir::new().unwrap();
        let res = invoke(&FailingSpawn, Path::new("tool"), &patch_in(&dir));
        assert!(matches!(res.outcome, Outcome::Failure(FailureReason::SpawnFailed { .. })));
        assert!(res.diagnostic.contains("no such file"));
    }

    #[test]
    fn resolve_explicit_tool_path() {
        let dir = TempDir::new().unwrap();
        let tool = dir.path().join("mytool");
        std::fs::write(&tool, b"").unwrap();
        let mut cfg = Config::new(dir.path());
        cfg.tool.path = Some(tool.clone());
        assert_eq!(resolve_tool(&cfg).unwrap(), tool);

        cfg.tool.path = Some(dir.path().join("missing"));
        assert!(matches!(resolve_tool(&cfg), Err(LocError::ToolNotFound(_))));
    }

    #[test]
    fn resolve_local_tool_under_tool_dir() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::new(dir.path());
        let tool = cfg.tool_dir().join(paths::executable_name("dbipatcher"));
        std::fs::create_dir_all(tool.parent().unwrap()).unwrap();
        std::fs::write(&tool, b"").unwrap();
        assert_eq!(resolve_tool(&cfg).unwrap(), tool);
    }

    #[test]
    fn build_local_tool_runs_clean_then_build() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::new(dir.path());
        cfg.tool.clean_before_build = true;
        let runner = FakeRunner::new(None, Some(0));
        build_local_tool(&runner, &cfg).unwrap();
        let calls = runner.calls.borrow();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].last().unwrap(), "clean");
        assert_eq!(calls[1], vec![OsString::from("--no-print-directory")]);
    }

    #[test]
    fn build_local_tool_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::new(dir.path());
        let err = build_local_tool(&FakeRunner::new(None, Some(2)), &cfg).unwrap_err();
        assert!(matches!(err, LocError::ToolBuildFailed(_)));
    }
}
