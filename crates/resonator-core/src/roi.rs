//! Region of interest and its transfer from basis to subject coordinates.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ResonatorError, Result};
use crate::register::homography::Homography;

/// Axis-aligned rectangle in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoiRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl RoiRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// One past the last column. Widened so no `u32` rectangle overflows.
    pub fn right(&self) -> u64 {
        self.x as u64 + self.width as u64
    }

    /// One past the last row.
    pub fn bottom(&self) -> u64 {
        self.y as u64 + self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether the far edges still fit in `u32` pixel coordinates.
    pub fn in_pixel_range(&self) -> bool {
        self.x.checked_add(self.width).is_some() && self.y.checked_add(self.height).is_some()
    }

    /// Whether the rectangle lies fully inside a `width` x `height` frame.
    pub fn fits(&self, width: u32, height: u32) -> bool {
        !self.is_empty() && self.right() <= width as u64 && self.bottom() <= height as u64
    }

    /// Corners in (x, y) order: top-left, top-right, bottom-left, bottom-right.
    pub fn corners(&self) -> [(f64, f64); 4] {
        let (x0, y0) = (self.x as f64, self.y as f64);
        let (x1, y1) = (self.right() as f64, self.bottom() as f64);
        [(x0, y0), (x1, y0), (x0, y1), (x1, y1)]
    }
}

impl std::fmt::Display for RoiRect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{} {}x{}", self.x, self.y, self.width, self.height)
    }
}

impl std::str::FromStr for RoiRect {
    type Err = ResonatorError;

    /// Parse `x,y,width,height`.
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<u32> = s
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| ResonatorError::Config(format!("invalid ROI '{s}': {e}")))?;
        match parts.as_slice() {
            &[x, y, width, height] if width > 0 && height > 0 => {
                let roi = Self::new(x, y, width, height);
                if roi.in_pixel_range() {
                    Ok(roi)
                } else {
                    Err(ResonatorError::Config(format!(
                        "ROI '{s}' extends past the largest pixel coordinate"
                    )))
                }
            }
            _ => Err(ResonatorError::Config(format!(
                "ROI must be x,y,width,height with positive size, got '{s}'"
            ))),
        }
    }
}

/// Map a basis-space ROI into the subject frame.
///
/// The four corners go through `basis_to_subject` (with the perspective
/// divide) and the axis-aligned bounding box of the result is clipped to the
/// frame. Perspective distortion inside the box is not modelled. An empty or
/// fully out-of-frame result is an error asking for the basis to be reset.
pub fn map_roi(
    roi: &RoiRect,
    basis_to_subject: &Homography,
    frame_width: u32,
    frame_height: u32,
) -> Result<RoiRect> {
    let out_of_frame = |x: i64, y: i64, width: i64, height: i64| ResonatorError::RoiOutOfFrame {
        x,
        y,
        width,
        height,
        frame_width,
        frame_height,
    };

    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for (cx, cy) in roi.corners() {
        let Some((x, y)) = basis_to_subject.project(cx, cy) else {
            return Err(out_of_frame(
                roi.x as i64,
                roi.y as i64,
                roi.width as i64,
                roi.height as i64,
            ));
        };
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }

    let (x0, y0) = (min_x.round() as i64, min_y.round() as i64);
    let (x1, y1) = (max_x.round() as i64, max_y.round() as i64);

    let cx0 = x0.max(0);
    let cy0 = y0.max(0);
    let cx1 = x1.min(frame_width as i64);
    let cy1 = y1.min(frame_height as i64);
    if cx1 <= cx0 || cy1 <= cy0 {
        return Err(out_of_frame(x0, y0, x1 - x0, y1 - y0));
    }

    let mapped = RoiRect::new(
        cx0 as u32,
        cy0 as u32,
        (cx1 - cx0) as u32,
        (cy1 - cy0) as u32,
    );
    if (cx0, cy0, cx1, cy1) != (x0, y0, x1, y1) {
        warn!(
            unclipped = format!("{x0},{y0} {}x{}", x1 - x0, y1 - y0),
            clipped = %mapped,
            "Mapped ROI extends past the frame; clipped"
        );
    }
    Ok(mapped)
}
