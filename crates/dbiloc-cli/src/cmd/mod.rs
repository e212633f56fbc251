pub mod build;
pub mod languages;
pub mod plan;

use anyhow::Context;
use dbiloc_core::config::Config;
use std::path::Path;

/// Load `dbiloc.yaml` (or defaults) and surface its warnings.
pub fn load_config(root: &Path) -> anyhow::Result<Config> {
    let cfg = Config::load(root).context("failed to load config")?;
    for warning in cfg.check()? {
        tracing::warn!("{}", warning.message);
    }
    Ok(cfg)
}
