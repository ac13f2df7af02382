use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use resonator_core::io::output::OutputLocation;
use resonator_core::pipeline::config::ResonatorConfig;
use resonator_core::pipeline::run_resonator_reported;

use crate::progress::BarReporter;
use crate::summary::{print_config_summary, print_resonator_output};

#[derive(Args)]
pub struct ExtractArgs {
    /// Input video (SER, or mp4/avi/mov with the `opencv` feature)
    pub video: PathBuf,

    /// Config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory for the sliced signal, preview and match image
    /// [default: <video dir>/<results_dir>]
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}

pub fn run(args: &ExtractArgs) -> Result<()> {
    let config = ResonatorConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;
    let dir = match &args.output_dir {
        Some(dir) => dir.clone(),
        None => args
            .video
            .parent()
            .map(|p| p.join(&config.output.results_dir))
            .unwrap_or_else(|| PathBuf::from(&config.output.results_dir)),
    };
    print_config_summary("Resonator Extract", &args.video, &config);

    let reporter = Arc::new(BarReporter::new());
    let output = run_resonator_reported(&args.video, &config, &OutputLocation::new(dir), reporter.clone())
        .with_context(|| format!("Failed to extract {}", args.video.display()))?;
    reporter.finish();

    print_resonator_output(&output);
    println!();
    Ok(())
}
