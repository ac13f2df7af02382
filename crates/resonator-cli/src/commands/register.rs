use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use console::Style;
use resonator_core::pipeline::config::ResonatorConfig;
use resonator_core::pipeline::resonator::{
    map_to_subject, prepare, register_prepared, save_match_diagnostic,
};
use resonator_core::pipeline::{NoOpReporter, ProgressReporter};

#[derive(Args)]
pub struct RegisterArgs {
    /// Input video (SER, or mp4/avi/mov with the `opencv` feature)
    pub video: PathBuf,

    /// Config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Save the match visualization here
    #[arg(long)]
    pub matches: Option<PathBuf>,
}

pub fn run(args: &RegisterArgs) -> Result<()> {
    let config = ResonatorConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;
    let reporter: Arc<dyn ProgressReporter> = Arc::new(NoOpReporter);

    let prepared = prepare(&args.video, &config, &reporter)
        .with_context(|| format!("Failed to open {}", args.video.display()))?;
    let registered = register_prepared(prepared, &config, &reporter)?;
    if let Some(ref path) = args.matches {
        save_match_diagnostic(&registered, path)?;
    }
    let reg = registered.registration.clone();
    let mapped = map_to_subject(registered, &config, &reporter)?;

    let label = Style::new().dim();
    let value = Style::new().bold().white();
    println!();
    println!("  {:<16}{}", label.apply_to("Matches"), value.apply_to(reg.match_count));
    println!("  {:<16}{}", label.apply_to("Inliers"), value.apply_to(reg.inlier_count));
    println!("  {:<16}{}", label.apply_to("Basis -> subject"), value.apply_to(&reg.basis_to_subject));
    let (tx, ty) = reg.basis_to_subject.translation_component();
    println!("  {:<16}{}", label.apply_to("Translation"), value.apply_to(format!("{tx:.2}, {ty:.2}")));
    println!("  {:<16}{}", label.apply_to("Basis ROI"), value.apply_to(config.roi));
    println!("  {:<16}{}", label.apply_to("Subject ROI"), value.apply_to(mapped.roi));
    println!();
    Ok(())
}
