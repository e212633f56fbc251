use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Args;
use dbiloc_core::catalog::AssetCatalog;
use dbiloc_core::planner::{plan_matrix, MatrixFilter};
use std::path::Path;

#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Only build this version (e.g. "845")
    #[arg(long = "version", short = 'v', value_name = "VERSION")]
    pub version: Option<String>,

    /// Only build this language code (e.g. "en", "zh-cn")
    #[arg(long, short = 'l')]
    pub language: Option<String>,
}

impl From<FilterArgs> for MatrixFilter {
    fn from(args: FilterArgs) -> Self {
        MatrixFilter {
            version: args.version,
            language: args.language,
        }
    }
}

pub fn run(root: &Path, args: FilterArgs, json: bool) -> anyhow::Result<()> {
    let cfg = super::load_config(root)?;
    let catalog = AssetCatalog::discover(&cfg);
    let matrix = plan_matrix(&cfg, &catalog, &args.into()).context("cannot plan the build")?;

    if json {
        return print_json(&matrix);
    }

    println!("Versions:  {}", matrix.versions.join(", "));
    println!("Languages: {}", matrix.languages.join(", "));
    println!();
    if matrix.tasks.is_empty() {
        println!("No tasks planned.");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = matrix
        .tasks
        .iter()
        .map(|t| {
            vec![
                t.version.clone(),
                t.language.clone(),
                t.output_path.display().to_string(),
            ]
        })
        .collect();
    print_table(&["VERSION", "LANGUAGE", "OUTPUT"], &rows);
    println!("\n{} task(s)", matrix.tasks.len());
    Ok(())
}
