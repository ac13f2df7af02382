use ndarray::{Array2, Array3, Axis};
use std::path::PathBuf;

use crate::consts::{COLOR_CHANNEL_COUNT, LUMINANCE_B, LUMINANCE_G, LUMINANCE_R};

/// A single grayscale image frame.
/// Pixel values are f32 in [0.0, 1.0].
#[derive(Clone, Debug)]
pub struct Frame {
    /// Pixel data, row-major, shape = (height, width)
    pub data: Array2<f32>,
    /// Original bit depth before conversion (8 or 16)
    pub original_bit_depth: u8,
}

impl Frame {
    pub fn new(data: Array2<f32>, bit_depth: u8) -> Self {
        Self {
            data,
            original_bit_depth: bit_depth,
        }
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    /// Quantize to 8-bit, as used by the corner detector.
    pub fn to_u8(&self) -> Array2<u8> {
        self.data.mapv(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
    }
}

/// A three-channel video frame, values f32 in [0.0, 1.0].
///
/// Channels are always stored R, G, B regardless of the source byte order.
#[derive(Clone, Debug)]
pub struct ColorFrame {
    /// Shape = (height, width, 3)
    pub data: Array3<f32>,
    pub original_bit_depth: u8,
    pub index: usize,
}

impl ColorFrame {
    pub fn new(data: Array3<f32>, bit_depth: u8, index: usize) -> Self {
        debug_assert_eq!(data.dim().2, COLOR_CHANNEL_COUNT);
        Self {
            data,
            original_bit_depth: bit_depth,
            index,
        }
    }

    pub fn width(&self) -> usize {
        self.data.dim().1
    }

    pub fn height(&self) -> usize {
        self.data.dim().0
    }

    /// Plain average of the three channels.
    pub fn channel_mean(&self) -> Array2<f32> {
        self.data
            .mean_axis(Axis(2))
            .unwrap_or_else(|| Array2::zeros((self.height(), self.width())))
    }

    /// BT.601 weighted luminance, used for registration.
    pub fn luminance(&self) -> Frame {
        let (h, w, _) = self.data.dim();
        let data = Array2::from_shape_fn((h, w), |(r, c)| {
            LUMINANCE_R * self.data[[r, c, 0]]
                + LUMINANCE_G * self.data[[r, c, 1]]
                + LUMINANCE_B * self.data[[r, c, 2]]
        });
        Frame::new(data, self.original_bit_depth)
    }
}

/// Color/Bayer mode of the source data.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ColorMode {
    Mono,
    BayerRGGB,
    BayerGRBG,
    BayerGBRG,
    BayerBGGR,
    RGB,
    BGR,
}

/// Metadata about a video source.
#[derive(Clone, Debug)]
pub struct SourceInfo {
    pub filename: PathBuf,
    pub total_frames: usize,
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub color_mode: ColorMode,
}
