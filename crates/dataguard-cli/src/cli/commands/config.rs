//! `dataguard config` – print the effective configuration.

use anyhow::Result;
use dataguard_core::config::{self, DataguardConfig};

pub fn run_config(cfg: &DataguardConfig) -> Result<()> {
    let path = config::config_path()?;
    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(&cfg.redacted())?);
    Ok(())
}
