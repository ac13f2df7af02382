use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use resonator_core::pipeline::config::{persist_calibration, Calibration};

#[derive(Args)]
pub struct CalibrateArgs {
    /// Slope from brightness to estimated cell loss
    #[arg(long)]
    pub alpha: f64,

    /// Offset from brightness to estimated cell loss
    #[arg(long)]
    pub beta: f64,

    /// Config file to update
    #[arg(long, default_value = "resonator.toml")]
    pub config: PathBuf,
}

pub fn run(args: &CalibrateArgs) -> Result<()> {
    let calibration = Calibration {
        alpha: args.alpha,
        beta: args.beta,
    };
    persist_calibration(&args.config, &calibration)
        .with_context(|| format!("Failed to update {}", args.config.display()))?;
    println!(
        "Calibration {} * x + {} saved to {}",
        calibration.alpha,
        calibration.beta,
        args.config.display()
    );
    Ok(())
}
