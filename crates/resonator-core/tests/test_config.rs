use std::path::Path;

use resonator_core::extract::ProfileAxis;
use resonator_core::pipeline::config::{
    persist_calibration, persist_roi, Calibration, ResonatorConfig,
};
use resonator_core::pipeline::{Phase, PipelineStage};
use resonator_core::roi::RoiRect;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

#[test]
fn test_defaults_validate() {
    let config = ResonatorConfig::default();
    config.validate().unwrap();
    assert_eq!(config.video.registration_frame, 99);
    assert_eq!(config.registration.max_features, 2000);
    assert_eq!(config.registration.good_match_percent, 0.5);
    assert_eq!(config.reduction.slice_freq, 5);
    assert_eq!(config.reconcile.gauss_std, 40.0);
    assert_eq!(config.reconcile.background_rows, 20);
    assert_eq!(config.extraction.axis, ProfileAxis::Rows);
    assert_eq!(config.calibration, Calibration { alpha: 1.0, beta: 0.0 });
}

#[test]
fn test_default_toml_round_trips() {
    let text = ResonatorConfig::default_toml().unwrap();
    let parsed: ResonatorConfig = toml::from_str(&text).unwrap();
    assert_eq!(parsed, ResonatorConfig::default());
}

#[test]
fn test_partial_file_fills_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("resonator.toml");
    std::fs::write(
        &path,
        "[roi]\nx = 5\ny = 6\nwidth = 70\nheight = 80\n\n[extraction]\naxis = \"columns\"\n",
    )
    .unwrap();
    let config = ResonatorConfig::load(&path).unwrap();
    assert_eq!(config.roi, RoiRect::new(5, 6, 70, 80));
    assert_eq!(config.extraction.axis, ProfileAxis::Columns);
    assert_eq!(config.extraction.spatial_bin, 5);
    assert_eq!(config.video.basis_image, dir.path().join("basis.png"));
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn assert_invalid(edit: impl FnOnce(&mut ResonatorConfig)) {
    let mut config = ResonatorConfig::default();
    edit(&mut config);
    assert!(config.validate().is_err());
}

#[test]
fn test_invalid_values_rejected() {
    assert_invalid(|c| c.roi.width = 0);
    assert_invalid(|c| c.registration.good_match_percent = 0.0);
    assert_invalid(|c| c.registration.good_match_percent = 1.5);
    assert_invalid(|c| c.reduction.slice_freq = 0);
    assert_invalid(|c| c.extraction.spatial_bin = 0);
    assert_invalid(|c| c.extraction.background_frames = Some(0));
    assert_invalid(|c| c.reconcile.window_top = 50);
    assert_invalid(|c| c.reconcile.gauss_std = -1.0);
    assert_invalid(|c| c.video.seconds_per_frame = 0.0);
    assert_invalid(|c| c.roi.x = u32::MAX - 5);
    assert_invalid(|c| c.roi.y = u32::MAX);
}

#[test]
fn test_invalid_file_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[reduction]\nslice_freq = 0\n").unwrap();
    assert!(ResonatorConfig::load(&path).is_err());
    std::fs::write(&path, "[reduction\n").unwrap();
    assert!(ResonatorConfig::load(&path).is_err());
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[test]
fn test_persist_calibration_keeps_other_tables() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("resonator.toml");
    std::fs::write(&path, "[reduction]\nslice_freq = 3\n").unwrap();

    persist_calibration(&path, &Calibration { alpha: -2.5, beta: 0.75 }).unwrap();

    let config = ResonatorConfig::load(&path).unwrap();
    assert_eq!(config.reduction.slice_freq, 3);
    assert_eq!(config.calibration, Calibration { alpha: -2.5, beta: 0.75 });
    assert!(!dir.path().join("resonator.toml.tmp").exists());
}

#[test]
fn test_persist_roi_creates_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("new.toml");
    let basis = dir.path().join("frame.png");

    persist_roi(&path, &RoiRect::new(1, 2, 30, 40), &basis).unwrap();

    let config = ResonatorConfig::load(&path).unwrap();
    assert_eq!(config.roi, RoiRect::new(1, 2, 30, 40));
    assert_eq!(config.video.basis_image, basis);
}

#[test]
fn test_persist_roi_keeps_video_settings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("resonator.toml");
    std::fs::write(&path, "[video]\nregistration_frame = 12\n").unwrap();

    persist_roi(&path, &RoiRect::new(3, 3, 9, 9), Path::new("/data/basis.png")).unwrap();

    let config = ResonatorConfig::load(&path).unwrap();
    assert_eq!(config.video.registration_frame, 12);
    assert_eq!(config.video.basis_image, Path::new("/data/basis.png"));
}

// ---------------------------------------------------------------------------
// Display and parsing
// ---------------------------------------------------------------------------

#[test]
fn test_stage_display() {
    assert_eq!(PipelineStage::Streaming.to_string(), "Extracting brightness");
    assert_eq!(PipelineStage::Registering.to_string(), "Registering against basis");
}

#[test]
fn test_phase_parse_and_display() {
    assert_eq!("Washing".parse::<Phase>().unwrap(), Phase::Washing);
    assert_eq!(Phase::Concentration.to_string(), "concentration");
    assert!("rinse".parse::<Phase>().is_err());
}
