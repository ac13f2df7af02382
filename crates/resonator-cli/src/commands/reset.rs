use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use resonator_core::consts::DEFAULT_REGISTRATION_FRAME;
use resonator_core::io::image_io::save_color_png;
use resonator_core::io::source::read_frame_at;
use resonator_core::pipeline::config::persist_roi;
use resonator_core::roi::RoiRect;

#[derive(Args)]
pub struct ResetArgs {
    /// Video whose frame becomes the new basis image
    pub video: PathBuf,

    /// ROI on the new basis image as x,y,width,height
    #[arg(long)]
    pub roi: RoiRect,

    /// Frame to use
    #[arg(long, default_value_t = DEFAULT_REGISTRATION_FRAME)]
    pub frame: usize,

    /// Where to save the basis image
    #[arg(long, default_value = "basis.png")]
    pub basis: PathBuf,

    /// Config file to update
    #[arg(long, default_value = "resonator.toml")]
    pub config: PathBuf,
}

pub fn run(args: &ResetArgs) -> Result<()> {
    let frame = read_frame_at(&args.video, args.frame)
        .with_context(|| format!("Failed to read frame {} of {}", args.frame, args.video.display()))?;
    if !args.roi.fits(frame.width() as u32, frame.height() as u32) {
        anyhow::bail!(
            "ROI {} does not fit the {}x{} frame",
            args.roi,
            frame.width(),
            frame.height()
        );
    }
    save_color_png(&frame, &args.basis)
        .with_context(|| format!("Failed to write {}", args.basis.display()))?;
    persist_roi(&args.config, &args.roi, &args.basis)
        .with_context(|| format!("Failed to update {}", args.config.display()))?;
    println!(
        "Basis {} and ROI {} saved to {}",
        args.basis.display(),
        args.roi,
        args.config.display()
    );
    Ok(())
}
