//! Processing of a whole input folder: every phase video through the driver
//! and the reconciler.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::Result;
use crate::io::inlet::discover_inlet;
use crate::io::output::{rotate_results_dir, OutputLocation};
use crate::io::reference::{read_reference, PhaseReferences, ReferenceWorkbook};
use crate::io::sliced::read_sliced;

use super::config::ResonatorConfig;
use super::plot::save_plot;
use super::reconcile::{background_level, reconcile_file, ReconcileParams, Reconciled};
use super::resonator::{run_resonator_reported, ResonatorOutput};
use super::types::{Phase, PipelineStage, ProgressReporter};

/// Artifacts of one processed phase.
#[derive(Clone, Debug)]
pub struct PhaseResult {
    pub phase: Phase,
    pub video: PathBuf,
    pub resonator: ResonatorOutput,
    pub reconciled: Reconciled,
    pub export_path: PathBuf,
    pub plot_path: PathBuf,
}

/// References a phase is compared against. An unsplit video covers both
/// phases.
pub fn phase_references(workbook: &ReferenceWorkbook, phase: Phase) -> PhaseReferences {
    match phase {
        Phase::Concentration => workbook.concentration.clone(),
        Phase::Washing => workbook.washing.clone(),
        Phase::Total => workbook.concentration.union(&workbook.washing),
    }
}

/// Start of a phase on the run clock, seconds.
pub fn phase_video_start(workbook: &ReferenceWorkbook, phase: Phase) -> f64 {
    match phase {
        Phase::Washing => workbook.washing_start(),
        Phase::Concentration | Phase::Total => 0.0,
    }
}

/// Process every video in `inlet` into `<inlet>/<results_dir>`.
///
/// Concentration runs first so the washing phase can reuse its background.
pub fn run_inlet(
    inlet: &Path,
    config: &ResonatorConfig,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<Vec<PhaseResult>> {
    let discovered = discover_inlet(inlet)?;
    let workbook = read_reference(&discovered.reference)?;
    let results_dir = rotate_results_dir(inlet, &config.output.results_dir)?;
    let root = OutputLocation::new(results_dir);

    let rc = &config.reconcile;
    let mut concentration_background: Option<f64> = None;
    let mut results = Vec::with_capacity(discovered.videos.len());

    for (phase, video) in &discovered.videos {
        let phase = *phase;
        info!(phase = %phase, video = %video.display(), "Processing phase");
        let output = root.with_prefix(phase.name());
        let resonator = run_resonator_reported(video, config, &output, reporter.clone())?;

        // Everything downstream of the driver works from the sliced file.
        let own_background = background_level(
            &read_sliced(&resonator.sliced_path)?,
            rc.window_top,
            rc.window_bottom,
            rc.background_rows,
        )?;
        let background = match phase {
            Phase::Washing => match concentration_background {
                Some(b) => b,
                None => {
                    warn!("No concentration signal; washing background taken from the washing video");
                    own_background
                }
            },
            Phase::Concentration => {
                concentration_background = Some(own_background);
                own_background
            }
            Phase::Total => own_background,
        };

        reporter.begin_stage(PipelineStage::Reconciling, None);
        let params = ReconcileParams {
            seconds_per_frame: resonator.seconds_per_frame,
            slice_freq: config.reduction.slice_freq,
            video_start: phase_video_start(&workbook, phase),
            background: Some(background),
            config: rc.clone(),
            calibration: config.calibration,
        };
        let references = phase_references(&workbook, phase);
        let reconciled = reconcile_file(&resonator.sliced_path, &references, &params)?;

        let export_path = output.file(&config.output.export_filename);
        reconciled.write_export(&export_path)?;
        let plot_path = output.file(&config.output.plot_filename);
        save_plot(&reconciled, &plot_path)?;
        reporter.finish_stage();

        info!(
            phase = %phase,
            export = %export_path.display(),
            plot = %plot_path.display(),
            "Phase complete"
        );
        results.push(PhaseResult {
            phase,
            video: video.clone(),
            resonator,
            reconciled,
            export_path,
            plot_path,
        });
    }
    Ok(results)
}
