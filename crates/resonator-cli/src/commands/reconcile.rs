use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use resonator_core::io::output::OutputLocation;
use resonator_core::io::reference::{read_reference, PhaseReferences};
use resonator_core::io::sliced::read_sliced;
use resonator_core::pipeline::config::ResonatorConfig;
use resonator_core::pipeline::plot::save_plot;
use resonator_core::pipeline::reconcile::background_level;
use resonator_core::pipeline::run::{phase_references, phase_video_start};
use resonator_core::pipeline::{reconcile, Phase, ReconcileParams};

use crate::summary::print_reconciled;

#[derive(Args)]
pub struct ReconcileArgs {
    /// Sliced signal file written by `extract`
    pub sliced: PathBuf,

    /// Reference data CSV; without it the full signal is kept
    #[arg(long)]
    pub references: Option<PathBuf>,

    /// Phase the signal belongs to (concentration, washing, total)
    #[arg(long, default_value = "concentration")]
    pub phase: Phase,

    /// Config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Frame interval of the source video [default: from config]
    #[arg(long)]
    pub seconds_per_frame: Option<f64>,

    /// Background level to subtract [default: from this signal]
    #[arg(long)]
    pub background: Option<f64>,

    /// Directory for the export and plot [default: next to the sliced file]
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}

pub fn run(args: &ReconcileArgs) -> Result<()> {
    let config = ResonatorConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;
    let signal = read_sliced(&args.sliced)
        .with_context(|| format!("Failed to read {}", args.sliced.display()))?;

    let (references, video_start) = match &args.references {
        Some(path) => {
            let workbook = read_reference(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            (
                phase_references(&workbook, args.phase),
                phase_video_start(&workbook, args.phase),
            )
        }
        None => (PhaseReferences::default(), 0.0),
    };

    let rc = &config.reconcile;
    let background = match args.background {
        Some(b) => b,
        None => background_level(&signal, rc.window_top, rc.window_bottom, rc.background_rows)?,
    };
    let params = ReconcileParams {
        seconds_per_frame: args.seconds_per_frame.unwrap_or(config.video.seconds_per_frame),
        slice_freq: config.reduction.slice_freq,
        video_start,
        background: Some(background),
        config: rc.clone(),
        calibration: config.calibration,
    };
    let result = reconcile(&signal, &references, &params)?;

    let dir = match &args.output_dir {
        Some(dir) => dir.clone(),
        None => args
            .sliced
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    let output = OutputLocation::new(dir).with_prefix(args.phase.name());
    output.ensure_dir()?;
    let export = output.file(&config.output.export_filename);
    let plot = output.file(&config.output.plot_filename);
    result.write_export(&export)?;
    save_plot(&result, &plot)?;

    println!();
    print_reconciled(&result, &export, &plot);
    println!();
    Ok(())
}
