use std::io::Write;
use std::sync::{Arc, Mutex};

use approx::assert_abs_diff_eq;
use ndarray::Array2;
use resonator_core::io::reference::{PhaseReferences, Reference, TimeSeries};
use resonator_core::pipeline::config::{Calibration, ReconcileConfig};
use resonator_core::pipeline::reconcile::{
    background_level, time_axis, truncation_bounds, window_means,
};
use resonator_core::pipeline::{reconcile, ReconcileParams};

/// Log sink shared between the subscriber and the test.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl CapturedLogs {
    /// Run `f` with a subscriber writing into this sink.
    fn capture<T>(&self, f: impl FnOnce() -> T) -> T {
        let sink = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || sink.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::with_default(subscriber, f)
    }

    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

/// One row per sample; every column holds `values[row]`.
fn flat_signal(values: &[f64], cols: usize) -> Array2<f64> {
    Array2::from_shape_fn((values.len(), cols), |(r, _)| values[r])
}

/// Parameters under which sample `i` sits at exactly `i` minutes.
fn minute_params() -> ReconcileParams {
    ReconcileParams {
        seconds_per_frame: 12.0,
        slice_freq: 5,
        video_start: 0.0,
        background: None,
        config: ReconcileConfig {
            window_top: 0,
            window_bottom: 4,
            gauss_std: 0.0,
            t_correct: 0.0,
            subtract_background: false,
            background_rows: 1,
        },
        calibration: Calibration::default(),
    }
}

fn series_minutes(times_min: &[f64], value: f64) -> Reference {
    Reference::Present(TimeSeries::new(
        times_min.iter().map(|t| t * 60.0).collect(),
        vec![value; times_min.len()],
    ))
}

// ---------------------------------------------------------------------------
// Truncation
// ---------------------------------------------------------------------------

#[test]
fn test_truncation_bounds_bisect_convention() {
    let times: Vec<f64> = (0..100).map(|i| i as f64).collect();
    assert_eq!(truncation_bounds(&times, 10.0, 80.0), (10, 81));
}

#[test]
fn test_truncation_bounds_between_samples() {
    let times: Vec<f64> = (0..100).map(|i| i as f64).collect();
    assert_eq!(truncation_bounds(&times, 9.5, 80.5), (10, 81));
    assert_eq!(truncation_bounds(&times, -5.0, 500.0), (0, 100));
    assert_eq!(truncation_bounds(&times, 200.0, 300.0), (100, 100));
}

#[test]
fn test_reconcile_truncates_to_reference_span() {
    let values: Vec<f64> = (0..100).map(|i| i as f64).collect();
    let signal = flat_signal(&values, 4);
    let refs = PhaseReferences {
        cells: series_minutes(&[10.0, 40.0, 80.0], 1.0),
        sensor: Reference::Absent,
    };
    let out = reconcile(&signal, &refs, &minute_params()).unwrap();
    assert!(out.truncated);
    assert_eq!(out.times.len(), 71);
    assert_abs_diff_eq!(out.times[0], 10.0, epsilon = 1e-9);
    assert_abs_diff_eq!(*out.times.last().unwrap(), 80.0, epsilon = 1e-9);
    assert_eq!(out.raw, values[10..81].to_vec());
}

#[test]
fn test_union_of_both_series_sets_span() {
    let values: Vec<f64> = (0..100).map(|i| i as f64).collect();
    let refs = PhaseReferences {
        cells: series_minutes(&[30.0, 50.0], 1.0),
        sensor: series_minutes(&[20.0, 60.0], 2.0),
    };
    let logs = CapturedLogs::default();
    let out = logs
        .capture(|| reconcile(&flat_signal(&values, 4), &refs, &minute_params()))
        .unwrap();
    assert!(!logs.text().contains("Neither cell count"));
    assert_eq!(out.raw.first(), Some(&20.0));
    assert_eq!(out.raw.last(), Some(&60.0));
}

#[test]
fn test_no_references_keeps_full_series() {
    let values: Vec<f64> = (0..100).map(|i| (i % 7) as f64).collect();
    let logs = CapturedLogs::default();
    let out = logs
        .capture(|| {
            reconcile(&flat_signal(&values, 4), &PhaseReferences::default(), &minute_params())
        })
        .unwrap();
    let text = logs.text();
    assert!(text.contains("WARN"), "{text}");
    assert!(text.contains("Neither cell count nor sensor data present"), "{text}");
    assert!(!out.truncated);
    assert_eq!(out.raw, values);
    assert_eq!(out.times.len(), 100);
    assert!(out.cells.as_present().is_none());
    assert!(out.sensor.as_present().is_none());
}

#[test]
fn test_present_but_empty_series_does_not_truncate() {
    let values: Vec<f64> = (0..10).map(|i| i as f64).collect();
    let refs = PhaseReferences {
        cells: Reference::Present(TimeSeries::default()),
        sensor: Reference::Absent,
    };
    let out = reconcile(&flat_signal(&values, 4), &refs, &minute_params()).unwrap();
    assert_eq!(out.raw.len(), 10);
    assert!(out.cells.is_present());
}

// ---------------------------------------------------------------------------
// Time axis and correction
// ---------------------------------------------------------------------------

#[test]
fn test_time_axis_steps_by_slice() {
    let t = time_axis(4, 0.5, 4);
    assert_eq!(t, vec![0.0, 2.0, 4.0, 6.0]);
}

#[test]
fn test_time_correction_and_video_start_shift_minutes() {
    let mut params = minute_params();
    params.video_start = 120.0;
    params.config.t_correct = 30.0;
    let out = reconcile(&flat_signal(&[1.0, 2.0], 4), &PhaseReferences::default(), &params).unwrap();
    assert_abs_diff_eq!(out.times[0], 2.5, epsilon = 1e-12);
    assert_abs_diff_eq!(out.times[1], 3.5, epsilon = 1e-12);
}

#[test]
fn test_reference_times_converted_to_minutes() {
    let refs = PhaseReferences {
        cells: Reference::Present(TimeSeries::new(vec![90.0, 180.0], vec![5.0, 6.0])),
        sensor: Reference::Absent,
    };
    let out = reconcile(&flat_signal(&[0.0; 5], 4), &refs, &minute_params()).unwrap();
    let cells = out.cells.as_present().unwrap();
    assert_eq!(cells.times, vec![1.5, 3.0]);
    assert_eq!(cells.values, vec![5.0, 6.0]);
}

// ---------------------------------------------------------------------------
// Background, smoothing and calibration
// ---------------------------------------------------------------------------

#[test]
fn test_background_and_calibration_applied() {
    let mut params = minute_params();
    params.background = Some(1.0);
    params.config.subtract_background = true;
    params.calibration = Calibration { alpha: 2.0, beta: 0.5 };
    let out = reconcile(&flat_signal(&[3.0, 3.0, 3.0], 4), &PhaseReferences::default(), &params)
        .unwrap();
    assert_eq!(out.raw, vec![3.0; 3]);
    assert_eq!(out.smoothed, vec![2.0; 3]);
    assert_eq!(out.calibrated, vec![4.5; 3]);
}

#[test]
fn test_background_ignored_when_disabled() {
    let mut params = minute_params();
    params.background = Some(1.0);
    let out = reconcile(&flat_signal(&[3.0, 3.0], 4), &PhaseReferences::default(), &params).unwrap();
    assert_eq!(out.smoothed, vec![3.0, 3.0]);
}

#[test]
fn test_smoothing_preserves_constant_and_spreads_step() {
    let mut params = minute_params();
    params.config.gauss_std = 2.0;
    let mut values = vec![0.0; 40];
    values[20] = 1.0;
    let out = reconcile(&flat_signal(&values, 4), &PhaseReferences::default(), &params).unwrap();
    let total: f64 = out.smoothed.iter().sum();
    assert_abs_diff_eq!(total, 1.0, epsilon = 1e-9);
    assert!(out.smoothed[20] < 1.0);
    assert!(out.smoothed[18] > 0.0 && out.smoothed[22] > 0.0);

    let flat = reconcile(&flat_signal(&[0.7; 30], 4), &PhaseReferences::default(), &params).unwrap();
    for v in flat.smoothed {
        assert_abs_diff_eq!(v, 0.7, epsilon = 1e-12);
    }
}

#[test]
fn test_window_means_average_selected_bins() {
    let signal = Array2::from_shape_fn((2, 6), |(r, c)| (r * 10 + c) as f64);
    assert_eq!(window_means(&signal, 1, 3).unwrap(), vec![1.5, 11.5]);
    // Bottom is clipped to the available bins.
    assert_eq!(window_means(&signal, 4, 50).unwrap(), vec![4.5, 14.5]);
    assert!(window_means(&signal, 6, 50).is_err());
}

#[test]
fn test_background_level_uses_leading_rows() {
    let signal = flat_signal(&[2.0, 4.0, 100.0, 100.0], 3);
    assert_abs_diff_eq!(background_level(&signal, 0, 3, 2).unwrap(), 3.0);
    assert_abs_diff_eq!(background_level(&signal, 0, 3, 10).unwrap(), 51.5);
}

// ---------------------------------------------------------------------------
// Export columns
// ---------------------------------------------------------------------------

#[test]
fn test_export_columns_follow_present_series() {
    let refs = PhaseReferences {
        cells: Reference::Absent,
        sensor: series_minutes(&[1.0, 2.0], 9.0),
    };
    let out = reconcile(&flat_signal(&[0.0; 5], 4), &refs, &minute_params()).unwrap();
    let names: Vec<String> = out.columns().into_iter().map(|c| c.name).collect();
    assert_eq!(
        names,
        vec![
            "Time (min) - imaging",
            "Image analysis (Estimated Cell Loss)",
            "Image analysis (Scaled Brightness)",
            "Image analysis (Unscaled Brightness)",
            "Time (min) - sensor",
            "Sensor",
        ]
    );
}
