use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use resonator_core::pipeline::config::ResonatorConfig;

use crate::summary::print_config_summary;

#[derive(Args)]
pub struct ConfigArgs {
    /// Write the default config to a file instead of stdout
    #[arg(short, long, conflicts_with = "check")]
    pub output: Option<PathBuf>,

    /// Load and validate an existing config file, then summarize it
    #[arg(long)]
    pub check: Option<PathBuf>,
}

pub fn run(args: &ConfigArgs) -> Result<()> {
    if let Some(ref path) = args.check {
        let config = ResonatorConfig::load(path)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        print_config_summary("Resonator Config", path, &config);
        println!();
        return Ok(());
    }

    let text = ResonatorConfig::default_toml()?;
    match args.output {
        Some(ref path) => {
            std::fs::write(path, &text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Default config saved to {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}
