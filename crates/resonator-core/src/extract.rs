//! Per-frame brightness profiles inside the ROI.

use ndarray::{s, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{ResonatorError, Result};
use crate::frame::ColorFrame;
use crate::reduce::grouped_mean;
use crate::roi::RoiRect;

/// Which spatial axis survives the reduction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileAxis {
    /// One value per ROI row (columns are averaged).
    #[default]
    Rows,
    /// One value per ROI column (rows are averaged).
    Columns,
}

impl std::fmt::Display for ProfileAxis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rows => write!(f, "rows"),
            Self::Columns => write!(f, "columns"),
        }
    }
}

/// Per-pixel background intensity over the ROI, subtracted from every frame.
#[derive(Clone, Debug)]
pub struct BackgroundBaseline {
    data: Array2<f64>,
}

impl BackgroundBaseline {
    pub fn uniform(height: usize, width: usize, value: f64) -> Self {
        Self {
            data: Array2::from_elem((height, width), value),
        }
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }
}

/// Running mean of channel-averaged ROI crops.
pub struct BaselineAccumulator {
    roi: RoiRect,
    sum: Array2<f64>,
    count: usize,
}

impl BaselineAccumulator {
    pub fn new(roi: RoiRect) -> Self {
        Self {
            roi,
            sum: Array2::zeros((roi.height as usize, roi.width as usize)),
            count: 0,
        }
    }

    pub fn add(&mut self, frame: &ColorFrame) -> Result<()> {
        let gray = crop_gray(frame, &self.roi)?;
        self.sum += &gray;
        self.count += 1;
        Ok(())
    }

    pub fn finish(self) -> Result<BackgroundBaseline> {
        if self.count == 0 {
            return Err(ResonatorError::EmptySequence);
        }
        Ok(BackgroundBaseline {
            data: self.sum / self.count as f64,
        })
    }
}

/// Cut the ROI out of a frame, keeping all channels.
pub fn crop(frame: &ColorFrame, roi: &RoiRect) -> Result<ColorFrame> {
    check_fits(frame, roi)?;
    let view = frame.data.slice(s![
        roi.y as usize..roi.bottom() as usize,
        roi.x as usize..roi.right() as usize,
        ..
    ]);
    Ok(ColorFrame::new(view.to_owned(), frame.original_bit_depth, frame.index))
}

/// Channel-averaged intensity of the ROI.
pub fn crop_gray(frame: &ColorFrame, roi: &RoiRect) -> Result<Array2<f64>> {
    check_fits(frame, roi)?;
    let view = frame.data.slice(s![
        roi.y as usize..roi.bottom() as usize,
        roi.x as usize..roi.right() as usize,
        ..
    ]);
    let channels = view.len_of(Axis(2)) as f64;
    Ok(view.map_axis(Axis(2), |px| {
        px.iter().map(|&v| v as f64).sum::<f64>() / channels
    }))
}

fn check_fits(frame: &ColorFrame, roi: &RoiRect) -> Result<()> {
    if roi.fits(frame.width() as u32, frame.height() as u32) {
        Ok(())
    } else {
        Err(ResonatorError::RoiOutOfFrame {
            x: roi.x as i64,
            y: roi.y as i64,
            width: roi.width as i64,
            height: roi.height as i64,
            frame_width: frame.width() as u32,
            frame_height: frame.height() as u32,
        })
    }
}

/// Turns frames into 1-D brightness profiles for a fixed, validated ROI.
#[derive(Clone, Debug)]
pub struct BrightnessExtractor {
    roi: RoiRect,
    axis: ProfileAxis,
    spatial_bin: usize,
    background: Option<BackgroundBaseline>,
}

impl BrightnessExtractor {
    pub fn new(roi: RoiRect, axis: ProfileAxis, spatial_bin: usize) -> Self {
        Self {
            roi,
            axis,
            spatial_bin,
            background: None,
        }
    }

    pub fn with_background(mut self, background: BackgroundBaseline) -> Self {
        self.background = Some(background);
        self
    }

    pub fn roi(&self) -> &RoiRect {
        &self.roi
    }

    /// Number of values each profile holds.
    pub fn profile_len(&self) -> usize {
        let len = match self.axis {
            ProfileAxis::Rows => self.roi.height,
            ProfileAxis::Columns => self.roi.width,
        } as usize;
        len / self.spatial_bin.max(1)
    }

    /// Crop, average channels, subtract the baseline, average across the
    /// other axis, then block-average along the kept axis.
    pub fn profile(&self, frame: &ColorFrame) -> Result<Array1<f64>> {
        let mut gray = crop_gray(frame, &self.roi)?;
        if let Some(bg) = &self.background {
            if bg.data.dim() != gray.dim() {
                return Err(ResonatorError::Config(format!(
                    "background baseline is {:?}, ROI crop is {:?}",
                    bg.data.dim(),
                    gray.dim()
                )));
            }
            gray -= &bg.data;
        }

        let reduce_axis = match self.axis {
            ProfileAxis::Rows => Axis(1),
            ProfileAxis::Columns => Axis(0),
        };
        let profile = gray
            .mean_axis(reduce_axis)
            .ok_or(ResonatorError::EmptySequence)?;
        grouped_mean(&profile, self.spatial_bin)
    }
}
