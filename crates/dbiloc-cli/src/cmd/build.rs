use super::plan::FilterArgs;
use crate::output::{format_bytes, print_json, print_table};
use anyhow::Context;
use clap::{Args, ValueEnum};
use dbiloc_core::config::ToolSource;
use dbiloc_core::orchestrator::{Orchestrator, RunOptions, RunReport};
use dbiloc_core::tool_runner::{self, ProcessRunner};
use std::path::Path;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ToolArg {
    /// Build the tool in the project and use `bin/<tool>`
    Local,
    /// Use a tool that is already installed (PATH or tool.path)
    Installed,
}

impl From<ToolArg> for ToolSource {
    fn from(arg: ToolArg) -> Self {
        match arg {
            ToolArg::Local => ToolSource::Local,
            ToolArg::Installed => ToolSource::Installed,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Where the patch tool comes from (default: config, else local)
    #[arg(long, value_enum)]
    pub tool: Option<ToolArg>,

    /// Do not run the build command for a local tool
    #[arg(long)]
    pub no_build: bool,

    /// Run the clean command before building a local tool
    #[arg(long)]
    pub clean_build: bool,

    /// Discard cached base texts and extract every base image again
    #[arg(long)]
    pub fresh: bool,
}

pub fn run(root: &Path, args: BuildArgs, json: bool) -> anyhow::Result<()> {
    let mut cfg = super::load_config(root)?;
    if let Some(tool) = args.tool {
        cfg.tool.source = tool.into();
    }
    if args.clean_build {
        cfg.tool.clean_before_build = true;
    }
    cfg.check().context("invalid build options")?;

    let runner = ProcessRunner;
    if cfg.tool.source == ToolSource::Local {
        if args.no_build {
            tracing::info!("skipping local tool build");
        } else {
            tool_runner::build_local_tool(&runner, &cfg)?;
        }
    } else if cfg.tool.clean_before_build {
        tracing::warn!("clean build requested but the tool is preinstalled; ignoring");
    }

    let tool = tool_runner::resolve_tool(&cfg).with_context(|| {
        format!(
            "cannot find the {} patch tool '{}'",
            cfg.tool.source.as_str(),
            cfg.tool.name
        )
    })?;
    tracing::info!(tool = %tool.display(), root = %cfg.root.display(), "using patch tool");

    let options = RunOptions { fresh: args.fresh };
    let report = Orchestrator::new(&cfg, &runner, tool, options)
        .run(&args.filter.into())
        .context("build aborted")?;

    if json {
        print_json(&report)?;
    } else {
        print_summary(&report);
    }

    if !report.is_success() {
        anyhow::bail!(
            "no artifacts were produced ({}/{} successful)",
            report.successful(),
            report.total()
        );
    }
    Ok(())
}

fn print_summary(report: &RunReport) {
    println!();
    if report.artifacts.is_empty() {
        println!("No artifacts in the output directory.");
    } else {
        let rows: Vec<Vec<String>> = report
            .artifacts
            .iter()
            .map(|a| {
                vec![
                    a.version.clone(),
                    a.language.clone(),
                    format_bytes(a.size),
                    a.path.display().to_string(),
                ]
            })
            .collect();
        print_table(&["VERSION", "LANGUAGE", "SIZE", "OUTPUT"], &rows);
    }

    let failed: Vec<_> = report.failed().collect();
    if !failed.is_empty() {
        println!("\nFailed:");
        for task in &failed {
            println!(
                "  {} {} ({}): {}",
                task.version, task.language, task.result.stage, task.result.diagnostic
            );
        }
    }

    println!(
        "\nBuild completed: {}/{} successful",
        report.successful(),
        report.total()
    );
    if report.with_warnings() > 0 {
        println!("{} build(s) finished with tool warnings", report.with_warnings());
    }
    if failed.is_empty() && report.total() > 0 {
        println!("All builds completed successfully!");
    } else if !failed.is_empty() {
        println!("Some builds failed, check the messages above.");
    }
}
