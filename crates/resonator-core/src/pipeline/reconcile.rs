//! Aligns the brightness signal with ground-truth reference series.

use std::path::Path;

use ndarray::{s, Array2, Axis};
use tracing::{debug, info, warn};

use crate::error::{ResonatorError, Result};
use crate::filters::gaussian::gaussian_filter1d;
use crate::io::export::{write_columns, Column};
use crate::io::reference::{PhaseReferences, Reference, TimeSeries};
use crate::io::sliced::read_sliced;

use super::config::{Calibration, ReconcileConfig};

const SECONDS_PER_MINUTE: f64 = 60.0;

/// Per-run inputs to the reconciler beyond the configuration.
#[derive(Clone, Debug)]
pub struct ReconcileParams {
    pub seconds_per_frame: f64,
    pub slice_freq: usize,
    /// Offset of this video on the run clock, seconds.
    pub video_start: f64,
    /// Scalar subtracted before smoothing.
    pub background: Option<f64>,
    pub config: ReconcileConfig,
    pub calibration: Calibration,
}

/// Brightness and references on a shared minutes axis.
#[derive(Clone, Debug, PartialEq)]
pub struct Reconciled {
    /// Minutes, one per kept time bucket.
    pub times: Vec<f64>,
    /// Window-mean brightness as read.
    pub raw: Vec<f64>,
    /// Background-subtracted and smoothed.
    pub smoothed: Vec<f64>,
    /// `smoothed` through the calibration.
    pub calibrated: Vec<f64>,
    /// Reference series with times in minutes.
    pub cells: Reference,
    pub sensor: Reference,
    /// Whether the brightness was cut to the reference span.
    pub truncated: bool,
}

/// Mean of the spatial bins `[top, bottom)` for every row. `bottom` is
/// clipped to the number of columns.
pub fn window_means(signal: &Array2<f64>, top: usize, bottom: usize) -> Result<Vec<f64>> {
    let bottom = bottom.min(signal.ncols());
    if top >= bottom {
        return Err(ResonatorError::Config(format!(
            "window [{top}, {bottom}) selects no columns of a {}-column signal",
            signal.ncols()
        )));
    }
    let window = signal.slice(s![.., top..bottom]);
    Ok(window
        .mean_axis(Axis(1))
        .map(|m| m.to_vec())
        .unwrap_or_default())
}

/// Timestamps in seconds for `n` reduced samples.
pub fn time_axis(n: usize, seconds_per_frame: f64, slice_freq: usize) -> Vec<f64> {
    let step = seconds_per_frame * slice_freq as f64;
    (0..n).map(|i| i as f64 * step).collect()
}

/// Index range of `times` (ascending) inside `[t_min, t_max]`.
///
/// The start is the left insertion point of `t_min` and the end the right
/// insertion point of `t_max`, so samples equal to either bound are kept.
pub fn truncation_bounds(times: &[f64], t_min: f64, t_max: f64) -> (usize, usize) {
    let lo = times.partition_point(|&t| t < t_min);
    let hi = times.partition_point(|&t| t <= t_max);
    (lo, hi.max(lo))
}

/// Mean of the first `rows` window means; the baseline brightness of a run.
pub fn background_level(signal: &Array2<f64>, top: usize, bottom: usize, rows: usize) -> Result<f64> {
    let means = window_means(signal, top, bottom)?;
    let head = &means[..rows.min(means.len())];
    if head.is_empty() {
        return Err(ResonatorError::EmptySequence);
    }
    Ok(head.iter().sum::<f64>() / head.len() as f64)
}

fn to_minutes(reference: &Reference) -> Reference {
    match reference {
        Reference::Present(s) => Reference::Present(TimeSeries::new(
            s.times.iter().map(|t| t / SECONDS_PER_MINUTE).collect(),
            s.values.clone(),
        )),
        Reference::Absent => Reference::Absent,
    }
}

/// Time-shift, truncate, smooth and calibrate a sliced signal.
///
/// With no reference series present the full brightness span is kept and a
/// warning is logged.
pub fn reconcile(
    signal: &Array2<f64>,
    references: &PhaseReferences,
    params: &ReconcileParams,
) -> Result<Reconciled> {
    let cfg = &params.config;
    let means = window_means(signal, cfg.window_top, cfg.window_bottom)?;
    let shift = params.video_start + cfg.t_correct;
    let times: Vec<f64> = time_axis(means.len(), params.seconds_per_frame, params.slice_freq)
        .into_iter()
        .map(|t| (t + shift) / SECONDS_PER_MINUTE)
        .collect();

    let cells = to_minutes(&references.cells);
    let sensor = to_minutes(&references.sensor);

    let span = [&cells, &sensor]
        .into_iter()
        .filter_map(|r| r.as_present().and_then(TimeSeries::span))
        .reduce(|(lo_a, hi_a), (lo_b, hi_b)| (lo_a.min(lo_b), hi_a.max(hi_b)));

    let (lo, hi) = match span {
        Some((t_min, t_max)) => truncation_bounds(&times, t_min, t_max),
        None => {
            warn!("Neither cell count nor sensor data present; keeping the full brightness series");
            (0, times.len())
        }
    };
    debug!(lo, hi, samples = times.len(), "Truncation bounds");

    let times = times[lo..hi].to_vec();
    let raw = means[lo..hi].to_vec();

    let background = if cfg.subtract_background {
        params.background.unwrap_or(0.0)
    } else {
        0.0
    };
    let shifted: Vec<f64> = raw.iter().map(|v| v - background).collect();
    let smoothed = gaussian_filter1d(&shifted, cfg.gauss_std);
    let calibrated = smoothed.iter().map(|&v| params.calibration.apply(v)).collect();

    info!(
        samples = times.len(),
        background,
        cells = cells.is_present(),
        sensor = sensor.is_present(),
        "Reconciled brightness"
    );
    Ok(Reconciled {
        times,
        raw,
        smoothed,
        calibrated,
        cells,
        sensor,
        truncated: span.is_some(),
    })
}

/// Read a sliced signal file and reconcile it.
pub fn reconcile_file(
    sliced: &Path,
    references: &PhaseReferences,
    params: &ReconcileParams,
) -> Result<Reconciled> {
    let signal = read_sliced(sliced)?;
    reconcile(&signal, references, params)
}

impl Reconciled {
    /// Export columns: brightness block first, then each present reference.
    pub fn columns(&self) -> Vec<Column> {
        let mut columns = vec![
            Column::new("Time (min) - imaging", self.times.clone()),
            Column::new("Image analysis (Estimated Cell Loss)", self.calibrated.clone()),
            Column::new("Image analysis (Scaled Brightness)", self.smoothed.clone()),
            Column::new("Image analysis (Unscaled Brightness)", self.raw.clone()),
        ];
        if let Some(cells) = self.cells.as_present() {
            columns.push(Column::new("Time (min) - cells", cells.times.clone()));
            columns.push(Column::new("Cell count (M cells/mL)", cells.values.clone()));
        }
        if let Some(sensor) = self.sensor.as_present() {
            columns.push(Column::new("Time (min) - sensor", sensor.times.clone()));
            columns.push(Column::new("Sensor", sensor.values.clone()));
        }
        columns
    }

    pub fn write_export(&self, path: &Path) -> Result<()> {
        write_columns(path, &self.columns())?;
        debug!(path = %path.display(), "Wrote reconciled export");
        Ok(())
    }
}
