//! Frame source for compressed containers (mp4, avi, mov) decoded by OpenCV.

use std::path::Path;

use ndarray::Array3;
use opencv::{core, prelude::*, videoio};
use tracing::debug;

use crate::consts::COLOR_CHANNEL_COUNT;
use crate::error::{ResonatorError, Result};
use crate::frame::{ColorFrame, ColorMode, SourceInfo};
use crate::io::source::FrameSource;

/// Sequential reader over a `VideoCapture`.
pub struct CvSource {
    capture: videoio::VideoCapture,
    info: SourceInfo,
    fps: f64,
    cursor: usize,
    buffer: Mat,
}

impl CvSource {
    pub fn open(path: &Path) -> Result<Self> {
        let name = path.to_str().ok_or_else(|| {
            ResonatorError::Stream(format!("Non UTF-8 video path: {}", path.display()))
        })?;
        let capture = videoio::VideoCapture::from_file(name, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(ResonatorError::Stream(format!(
                "Failed to open video: {}",
                path.display()
            )));
        }

        let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)?;
        let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)?;
        if width < 1.0 || height < 1.0 {
            return Err(ResonatorError::InvalidDimensions {
                width: width.max(0.0) as u32,
                height: height.max(0.0) as u32,
            });
        }
        // Container estimate; the decoder may deliver fewer frames.
        let total_frames = capture.get(videoio::CAP_PROP_FRAME_COUNT)?.max(0.0) as usize;
        let fps = capture.get(videoio::CAP_PROP_FPS)?;

        let info = SourceInfo {
            filename: path.to_path_buf(),
            total_frames,
            width: width as u32,
            height: height as u32,
            bit_depth: 8,
            color_mode: ColorMode::BGR,
        };
        debug!(
            path = %path.display(),
            frames = info.total_frames,
            width = info.width,
            height = info.height,
            fps,
            "Opened video capture"
        );
        Ok(Self {
            capture,
            info,
            fps,
            cursor: 0,
            buffer: Mat::default(),
        })
    }
}

impl FrameSource for CvSource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn seconds_per_frame(&self) -> Option<f64> {
        (self.fps.is_finite() && self.fps > 0.0).then(|| 1.0 / self.fps)
    }

    fn position(&self) -> usize {
        self.cursor
    }

    fn next_frame(&mut self) -> Result<Option<ColorFrame>> {
        if !self.capture.read(&mut self.buffer)? || self.buffer.empty() {
            return Ok(None);
        }
        let frame = bgr_to_frame(&self.buffer, self.cursor)?;
        self.cursor += 1;
        Ok(Some(frame))
    }

    fn skip(&mut self, count: usize) -> Result<usize> {
        let mut skipped = 0;
        while skipped < count && self.capture.grab()? {
            skipped += 1;
        }
        self.cursor += skipped;
        Ok(skipped)
    }
}

/// Convert a decoded 8-bit BGR `Mat` into an RGB frame in [0, 1].
fn bgr_to_frame(mat: &Mat, index: usize) -> Result<ColorFrame> {
    if mat.typ() != core::CV_8UC3 {
        return Err(ResonatorError::Stream(format!(
            "Unsupported decoded pixel type {} (expected 8-bit BGR)",
            mat.typ()
        )));
    }
    let (h, w) = (mat.rows() as usize, mat.cols() as usize);
    let pixels = mat.data_typed::<core::Vec3b>()?;
    let data = Array3::from_shape_fn((h, w, COLOR_CHANNEL_COUNT), |(row, col, ch)| {
        pixels[row * w + col].0[2 - ch] as f32 / 255.0
    });
    Ok(ColorFrame::new(data, 8, index))
}
