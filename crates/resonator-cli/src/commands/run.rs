use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use resonator_core::pipeline::config::ResonatorConfig;
use resonator_core::pipeline::run_inlet;

use crate::progress::BarReporter;
use crate::summary::{print_config_summary, print_phase_result};

#[derive(Args)]
pub struct RunArgs {
    /// Folder holding the videos and the reference CSV
    pub inlet: PathBuf,

    /// Config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub fn run(args: &RunArgs) -> Result<()> {
    let config = ResonatorConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;
    print_config_summary("Resonator Run", &args.inlet, &config);

    let reporter = Arc::new(BarReporter::new());
    let results = run_inlet(&args.inlet, &config, reporter.clone())
        .with_context(|| format!("Failed to process {}", args.inlet.display()))?;
    reporter.finish();

    for result in &results {
        print_phase_result(result);
    }
    println!();
    Ok(())
}
