use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::consts::{DEFAULT_REGISTRATION_FRAME, DEFAULT_SECONDS_PER_FRAME};
use crate::error::{ResonatorError, Result};
use crate::extract::ProfileAxis;
use crate::roi::RoiRect;

/// Complete run configuration, loaded once and passed by reference.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResonatorConfig {
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default = "default_roi")]
    pub roi: RoiRect,
    #[serde(default)]
    pub registration: RegistrationConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub reduction: ReductionConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub calibration: Calibration,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Placeholder until the operator sets a real ROI with `reset`.
fn default_roi() -> RoiRect {
    RoiRect::new(0, 0, 64, 250)
}

impl Default for ResonatorConfig {
    fn default() -> Self {
        Self {
            video: VideoConfig::default(),
            roi: default_roi(),
            registration: RegistrationConfig::default(),
            extraction: ExtractionConfig::default(),
            reduction: ReductionConfig::default(),
            reconcile: ReconcileConfig::default(),
            calibration: Calibration::default(),
            output: OutputConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Still image defining the ROI coordinate space.
    pub basis_image: PathBuf,
    /// Frame used for registration; leading frames are often corrupt.
    pub registration_frame: usize,
    /// Work on a reduced-height copy of the video when set.
    pub downscale_height: Option<u32>,
    /// Used when the video carries no timestamp trailer.
    pub seconds_per_frame: f64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            basis_image: PathBuf::from("basis.png"),
            registration_frame: DEFAULT_REGISTRATION_FRAME,
            downscale_height: None,
            seconds_per_frame: DEFAULT_SECONDS_PER_FRAME,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    pub max_features: usize,
    /// Fraction of the best matches kept, in (0, 1].
    pub good_match_percent: f64,
    /// Gaussian pre-blur applied to both images; 0 disables.
    pub blur_sigma: f32,
    pub fast_threshold: u8,
    pub pyramid_levels: usize,
    /// Inlier reprojection threshold in pixels.
    pub ransac_threshold: f64,
    pub ransac_iterations: usize,
    pub seed: u64,
    pub cross_check: bool,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            max_features: 2000,
            good_match_percent: 0.5,
            blur_sigma: 1.0,
            fast_threshold: 20,
            pyramid_levels: 3,
            ransac_threshold: 3.0,
            ransac_iterations: 2000,
            seed: 0,
            cross_check: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub axis: ProfileAxis,
    /// Block size for the spatial average along the kept axis.
    pub spatial_bin: usize,
    /// Subtract a per-pixel baseline averaged over the first N frames.
    pub background_frames: Option<usize>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            axis: ProfileAxis::Rows,
            spatial_bin: 5,
            background_frames: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReductionConfig {
    /// Frames averaged into one output row.
    pub slice_freq: usize,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self { slice_freq: 5 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// First spatial bin averaged into the 1-D series.
    pub window_top: usize,
    /// One past the last spatial bin averaged.
    pub window_bottom: usize,
    /// Smoothing bandwidth in samples.
    pub gauss_std: f64,
    /// Transit delay between imaging and measurement, seconds.
    pub t_correct: f64,
    pub subtract_background: bool,
    /// Leading rows of the concentration signal averaged into the background.
    pub background_rows: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            window_top: 0,
            window_bottom: 50,
            gauss_std: 40.0,
            t_correct: 50.0,
            subtract_background: true,
            background_rows: 20,
        }
    }
}

/// Affine map from brightness to estimated cell loss.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    pub alpha: f64,
    pub beta: f64,
}

impl Calibration {
    pub fn apply(&self, value: f64) -> f64 {
        self.alpha * value + self.beta
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            beta: 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub results_dir: String,
    pub sliced_filename: String,
    pub cropped_filename: String,
    pub matches_filename: String,
    pub plot_filename: String,
    pub export_filename: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_dir: "results".into(),
            sliced_filename: "sliced.csv".into(),
            cropped_filename: "cropped.ser".into(),
            matches_filename: "matches.png".into(),
            plot_filename: "plot.png".into(),
            export_filename: "export.csv".into(),
        }
    }
}

impl ResonatorConfig {
    /// Read, parse and validate a TOML configuration file.
    ///
    /// A relative `basis_image` is resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&text)?;
        if config.video.basis_image.is_relative() {
            if let Some(dir) = path.parent() {
                config.video.basis_image = dir.join(&config.video.basis_image);
            }
        }
        config.validate()?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load `path` if given, otherwise fall back to validated defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(ResonatorError::Config(msg));

        if self.roi.is_empty() {
            return fail(format!("roi must have positive size, got {}", self.roi));
        }
        if !self.roi.in_pixel_range() {
            return fail(format!("roi {} extends past the largest pixel coordinate", self.roi));
        }
        if !(self.video.seconds_per_frame > 0.0 && self.video.seconds_per_frame.is_finite()) {
            return fail("video.seconds_per_frame must be positive".into());
        }
        if self.video.downscale_height == Some(0) {
            return fail("video.downscale_height must be positive".into());
        }

        let reg = &self.registration;
        if reg.max_features == 0 {
            return fail("registration.max_features must be positive".into());
        }
        if !(reg.good_match_percent > 0.0 && reg.good_match_percent <= 1.0) {
            return fail(format!(
                "registration.good_match_percent must be in (0, 1], got {}",
                reg.good_match_percent
            ));
        }
        if reg.blur_sigma < 0.0 {
            return fail("registration.blur_sigma must not be negative".into());
        }
        if reg.pyramid_levels == 0 {
            return fail("registration.pyramid_levels must be at least 1".into());
        }
        if reg.ransac_threshold <= 0.0 || reg.ransac_iterations == 0 {
            return fail("registration RANSAC threshold and iterations must be positive".into());
        }

        if self.extraction.spatial_bin == 0 {
            return fail("extraction.spatial_bin must be at least 1".into());
        }
        if self.extraction.background_frames == Some(0) {
            return fail("extraction.background_frames must be at least 1 when set".into());
        }
        if self.reduction.slice_freq == 0 {
            return fail("reduction.slice_freq must be at least 1".into());
        }

        let rec = &self.reconcile;
        if rec.window_top >= rec.window_bottom {
            return fail(format!(
                "reconcile window [{}, {}) is empty",
                rec.window_top, rec.window_bottom
            ));
        }
        if rec.gauss_std < 0.0 || !rec.gauss_std.is_finite() {
            return fail("reconcile.gauss_std must be a non-negative number".into());
        }
        if rec.subtract_background && rec.background_rows == 0 {
            return fail("reconcile.background_rows must be at least 1".into());
        }
        Ok(())
    }

    /// Default configuration rendered as TOML.
    pub fn default_toml() -> Result<String> {
        Ok(toml::to_string_pretty(&Self::default())?)
    }
}

/// Replace the `[calibration]` table of the file at `path`, keeping the rest.
pub fn persist_calibration(path: &Path, calibration: &Calibration) -> Result<()> {
    let mut table = read_table(path)?;
    table.insert(
        "calibration".into(),
        toml::Value::try_from(calibration)?,
    );
    write_table_atomic(path, &table)?;
    debug!(alpha = calibration.alpha, beta = calibration.beta, "Persisted calibration");
    Ok(())
}

/// Replace the `[roi]` table and `video.basis_image` of the file at `path`.
pub fn persist_roi(path: &Path, roi: &RoiRect, basis_image: &Path) -> Result<()> {
    let mut table = read_table(path)?;
    table.insert("roi".into(), toml::Value::try_from(roi)?);

    let basis = toml::Value::String(basis_image.to_string_lossy().into_owned());
    match table.get_mut("video").and_then(toml::Value::as_table_mut) {
        Some(video) => {
            video.insert("basis_image".into(), basis);
        }
        None => {
            let mut video = toml::Table::new();
            video.insert("basis_image".into(), basis);
            table.insert("video".into(), toml::Value::Table(video));
        }
    }
    write_table_atomic(path, &table)?;
    debug!(roi = %roi, basis = %basis_image.display(), "Persisted ROI");
    Ok(())
}

fn read_table(path: &Path) -> Result<toml::Table> {
    if !path.exists() {
        return Ok(toml::Table::new());
    }
    let text = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&text)?)
}

fn write_table_atomic(path: &Path, table: &toml::Table) -> Result<()> {
    let text = toml::to_string_pretty(table)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, text)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
