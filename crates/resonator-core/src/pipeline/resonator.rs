//! Video-processing driver: registration, ROI mapping, frame streaming and
//! temporal reduction of one video into a sliced signal file.
//!
//! Each stage consumes the value produced by the previous one, so a run can
//! only move forward through
//! `downscale -> register -> map ROI -> stream -> reduce -> persist`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::Array2;
use tracing::{debug, info, warn};

use crate::error::{ResonatorError, Result};
use crate::extract::{crop, BaselineAccumulator, BrightnessExtractor};
use crate::frame::{Frame, SourceInfo};
use crate::io::downscale::downscale_video;
use crate::io::image_io::load_image;
use crate::io::output::OutputLocation;
use crate::io::ser::{encode_frame, SerHeader};
use crate::io::ser_writer::SerWriter;
use crate::io::sliced::write_sliced;
use crate::io::source::{open_source, read_frame_at};
use crate::reduce::grouped_mean;
use crate::register::visualize::draw_matches;
use crate::register::{estimate_homography, match_features, FeatureMatches, Registration};
use crate::roi::{map_roi, RoiRect};

use super::config::ResonatorConfig;
use super::types::{NoOpReporter, PipelineStage, ProgressReporter};

/// Video ready for processing, downscaled if configured.
#[derive(Clone, Debug)]
pub struct Prepared {
    pub video: PathBuf,
    pub info: SourceInfo,
    pub seconds_per_frame: f64,
}

/// Video with its homography against the basis image.
#[derive(Clone, Debug)]
pub struct Registered {
    pub prepared: Prepared,
    pub registration: Registration,
    pub matches: FeatureMatches,
    /// Registration frame (luminance) and basis image used for the fit.
    pub subject: Frame,
    pub basis: Frame,
}

/// Registered video with the ROI validated in subject coordinates.
#[derive(Clone, Debug)]
pub struct Mapped {
    pub registered: Registered,
    pub roi: RoiRect,
}

/// Per-frame profiles, one row per frame read.
#[derive(Clone, Debug)]
pub struct Streamed {
    pub mapped: Mapped,
    pub profiles: Array2<f64>,
    pub preview_path: PathBuf,
}

/// Everything a finished driver run produced.
#[derive(Clone, Debug)]
pub struct ResonatorOutput {
    /// The sliced signal file handed to the reconciler.
    pub sliced_path: PathBuf,
    pub preview_path: PathBuf,
    pub matches_path: PathBuf,
    pub registration: Registration,
    /// ROI in subject-video pixels.
    pub roi: RoiRect,
    pub frames_read: usize,
    pub seconds_per_frame: f64,
    /// Reduced signal: rows are time buckets, columns spatial bins.
    pub signal: Array2<f64>,
}

/// Run the driver without progress reporting.
pub fn run_resonator(
    video: &Path,
    config: &ResonatorConfig,
    output: &OutputLocation,
) -> Result<ResonatorOutput> {
    run_resonator_reported(video, config, output, Arc::new(NoOpReporter))
}

/// Run the driver, reporting each stage to `reporter`.
pub fn run_resonator_reported(
    video: &Path,
    config: &ResonatorConfig,
    output: &OutputLocation,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<ResonatorOutput> {
    output.ensure_dir()?;
    let prepared = prepare(video, config, &reporter)?;
    let registered = register_prepared(prepared, config, &reporter)?;

    let matches_path = output.file(&config.output.matches_filename);
    save_match_diagnostic(&registered, &matches_path)?;

    let mapped = map_to_subject(registered, config, &reporter)?;
    let streamed = stream(mapped, config, output, &reporter)?;
    let frames_read = streamed.profiles.nrows();

    reporter.begin_stage(PipelineStage::Reducing, None);
    let signal = grouped_mean(&streamed.profiles, config.reduction.slice_freq)?;
    reporter.finish_stage();
    if signal.nrows() == 0 {
        warn!(
            frames = frames_read,
            slice_freq = config.reduction.slice_freq,
            "Fewer frames than one reduction block"
        );
        return Err(ResonatorError::EmptySequence);
    }
    info!(
        frames = frames_read,
        rows = signal.nrows(),
        bins = signal.ncols(),
        "Reduced brightness signal"
    );

    reporter.begin_stage(PipelineStage::Persisting, None);
    let sliced_path = output.file(&config.output.sliced_filename);
    write_sliced(&sliced_path, signal.view())?;
    reporter.finish_stage();
    info!(path = %sliced_path.display(), "Wrote sliced signal");

    let Streamed {
        mapped,
        preview_path,
        ..
    } = streamed;
    Ok(ResonatorOutput {
        sliced_path,
        preview_path,
        matches_path,
        seconds_per_frame: mapped.registered.prepared.seconds_per_frame,
        registration: mapped.registered.registration,
        roi: mapped.roi,
        frames_read,
        signal,
    })
}

/// Downscale if configured and read the source metadata.
pub fn prepare(
    video: &Path,
    config: &ResonatorConfig,
    reporter: &Arc<dyn ProgressReporter>,
) -> Result<Prepared> {
    let video = match config.video.downscale_height {
        Some(height) => {
            reporter.begin_stage(PipelineStage::Downscaling, None);
            let path = downscale_video(video, height)?;
            reporter.finish_stage();
            path
        }
        None => video.to_path_buf(),
    };

    let source = open_source(&video)?;
    let info = source.info().clone();
    let seconds_per_frame = match source.seconds_per_frame() {
        Some(spf) => spf,
        None => {
            debug!(
                fallback = config.video.seconds_per_frame,
                "No frame timestamps; using configured frame interval"
            );
            config.video.seconds_per_frame
        }
    };
    info!(
        video = %video.display(),
        frames = info.total_frames,
        width = info.width,
        height = info.height,
        seconds_per_frame,
        "Prepared video"
    );
    Ok(Prepared {
        video,
        info,
        seconds_per_frame,
    })
}

/// Fit the homography between the registration frame and the basis image.
pub fn register_prepared(
    prepared: Prepared,
    config: &ResonatorConfig,
    reporter: &Arc<dyn ProgressReporter>,
) -> Result<Registered> {
    reporter.begin_stage(PipelineStage::Registering, None);
    let total = prepared.info.total_frames;
    if total == 0 {
        return Err(ResonatorError::EmptySequence);
    }
    let mut index = config.video.registration_frame;
    if index >= total {
        warn!(
            requested = index,
            total,
            "Registration frame past end of video; using last frame"
        );
        index = total - 1;
    }

    let subject = read_frame_at(&prepared.video, index)?.luminance();
    let basis = load_image(&config.video.basis_image)?;
    let matches = match_features(&subject, &basis, &config.registration);
    let registration = estimate_homography(&matches, &config.registration)?;
    reporter.finish_stage();

    Ok(Registered {
        prepared,
        registration,
        matches,
        subject,
        basis,
    })
}

/// Write the side-by-side match visualization.
pub fn save_match_diagnostic(registered: &Registered, path: &Path) -> Result<()> {
    draw_matches(&registered.subject, &registered.basis, &registered.matches).save(path)?;
    debug!(path = %path.display(), "Saved match diagnostic");
    Ok(())
}

/// Map the configured ROI into subject coordinates and validate it.
pub fn map_to_subject(
    registered: Registered,
    config: &ResonatorConfig,
    reporter: &Arc<dyn ProgressReporter>,
) -> Result<Mapped> {
    reporter.begin_stage(PipelineStage::MappingRoi, None);
    let info = &registered.prepared.info;
    let roi = map_roi(
        &config.roi,
        &registered.registration.basis_to_subject,
        info.width,
        info.height,
    )?;

    let extractor = BrightnessExtractor::new(
        roi,
        config.extraction.axis,
        config.extraction.spatial_bin,
    );
    let bins = extractor.profile_len();
    if bins == 0 {
        return Err(ResonatorError::Config(format!(
            "mapped ROI {roi} is smaller than one spatial bin of {} pixels",
            config.extraction.spatial_bin
        )));
    }
    if config.reconcile.window_bottom > bins {
        warn!(
            bins,
            window_bottom = config.reconcile.window_bottom,
            "Reconcile window extends past the profile; it will be clipped"
        );
    }
    reporter.finish_stage();
    info!(basis_roi = %config.roi, subject_roi = %roi, bins, "Mapped ROI");
    Ok(Mapped { registered, roi })
}

/// Read every frame, extract its profile and write the cropped preview.
///
/// A frame that fails to decode ends the stream; the frames read so far are
/// kept.
pub fn stream(
    mapped: Mapped,
    config: &ResonatorConfig,
    output: &OutputLocation,
    reporter: &Arc<dyn ProgressReporter>,
) -> Result<Streamed> {
    let video = &mapped.registered.prepared.video;
    let roi = mapped.roi;
    let mut extractor =
        BrightnessExtractor::new(roi, config.extraction.axis, config.extraction.spatial_bin);

    if let Some(n) = config.extraction.background_frames {
        reporter.begin_stage(PipelineStage::Background, Some(n));
        let mut acc = BaselineAccumulator::new(roi);
        let mut source = open_source(video)?;
        for i in 0..n {
            match source.next_frame() {
                Ok(Some(frame)) => acc.add(&frame)?,
                Ok(None) => break,
                Err(e) => {
                    warn!(frame = i, error = %e, "Background pass stopped at unreadable frame");
                    break;
                }
            }
            reporter.advance(i + 1);
        }
        extractor = extractor.with_background(acc.finish()?);
        reporter.finish_stage();
    }

    let mut source = open_source(video)?;
    let total = source.info().total_frames;
    let preview_path = output.file(&config.output.cropped_filename);
    let mut preview = SerWriter::create(&preview_path, &SerHeader::rgb8(roi.width, roi.height))?;

    reporter.begin_stage(PipelineStage::Streaming, Some(total));
    let bins = extractor.profile_len();
    let mut values = Vec::with_capacity(total * bins);
    let mut frames = 0usize;
    loop {
        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                warn!(frame = frames, error = %e, "Stopping at unreadable frame");
                break;
            }
        };
        values.extend(extractor.profile(&frame)?);
        let cropped = crop(&frame, &roi)?;
        preview.write_raw_frame(&encode_frame(&cropped, preview.header()))?;
        frames += 1;
        reporter.advance(frames);
    }
    let written = preview.finalize()?;
    reporter.finish_stage();

    if frames == 0 {
        return Err(ResonatorError::EmptySequence);
    }
    debug!(frames, preview_frames = written, "Streamed video");

    let profiles = Array2::from_shape_vec((frames, bins), values)
        .map_err(|e| ResonatorError::Stream(e.to_string()))?;
    Ok(Streamed {
        mapped,
        profiles,
        preview_path,
    })
}
