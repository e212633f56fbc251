mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::build::BuildArgs;
use cmd::plan::FilterArgs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "dbiloc",
    about = "Build localized binaries for every matching base image, blueprint and translation",
    version
)]
struct Cli {
    /// Project root (default: auto-detect from dbiloc.yaml or dbi/)
    #[arg(long, global = true, env = "DBILOC_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build every planned version/language pair with the patch tool
    Build(BuildArgs),

    /// Show the build matrix without running anything
    Plan(FilterArgs),

    /// List the languages available for translation
    Languages,
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Build(_) => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Build(args) => cmd::build::run(&root, args, cli.json),
        Commands::Plan(args) => cmd::plan::run(&root, args, cli.json),
        Commands::Languages => cmd::languages::run(&root, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
