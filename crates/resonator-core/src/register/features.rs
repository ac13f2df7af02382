//! Oriented FAST keypoints with rotated BRIEF descriptors.
//!
//! Keypoints are detected on a small Gaussian pyramid so that moderate scale
//! changes between mounts still produce matchable features. Descriptor bits
//! compare pairs of smoothed intensities from a fixed pseudo-random pattern,
//! rotated by the keypoint orientation.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::consts::{
    BRIEF_BITS, BRIEF_PATCH_SIZE, BRIEF_SMOOTHING_SIGMA, KEYPOINT_BORDER, ORIENTATION_RADIUS,
    PYRAMID_BLUR_SIGMA,
};
use crate::filters::gaussian::gaussian_blur;
use crate::frame::Frame;

/// 256-bit binary descriptor.
pub type Descriptor = [u64; BRIEF_BITS / 64];

const BRIEF_PATTERN_SEED: u64 = 0x5EED_0B1E;

/// Contiguous arc length for a FAST corner.
const FAST_ARC: usize = 9;

/// Bresenham circle of radius 3 as (dx, dy), clockwise from the top.
const FAST_CIRCLE: [(i32, i32); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

#[derive(Clone, Debug)]
pub struct KeypointParams {
    pub max_features: usize,
    pub fast_threshold: u8,
    pub pyramid_levels: usize,
}

/// A detected keypoint. Coordinates are in full-resolution pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
    pub level: usize,
    /// Orientation in radians.
    pub angle: f64,
    pub response: f32,
}

#[derive(Clone, Debug, Default)]
pub struct Features {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: Vec<Descriptor>,
}

impl Features {
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

/// Detect up to `max_features` keypoints and compute their descriptors.
pub fn detect_and_describe(frame: &Frame, params: &KeypointParams) -> Features {
    let pattern = brief_pattern();
    let pyramid = build_pyramid(frame, params.pyramid_levels);
    let budgets = level_budgets(params.max_features, pyramid.len());

    let mut features = Features::default();
    for (level, (image, budget)) in pyramid.iter().zip(budgets).enumerate() {
        let gray = image.to_u8();
        let mut corners = fast_corners(&gray, params.fast_threshold);
        corners.sort_by(|a, b| b.2.cmp(&a.2).then(a.1.cmp(&b.1)).then(a.0.cmp(&b.0)));
        corners.truncate(budget);

        let smoothed = gaussian_blur(image, BRIEF_SMOOTHING_SIGMA);
        let scale = (1usize << level) as f64;

        let described: Vec<(Keypoint, Descriptor)> = corners
            .par_iter()
            .map(|&(x, y, score)| {
                let angle = intensity_centroid_angle(&image.data, x, y);
                let descriptor = describe(&smoothed.data, x, y, angle, &pattern);
                let kp = Keypoint {
                    x: (x as f64 + 0.5) * scale - 0.5,
                    y: (y as f64 + 0.5) * scale - 0.5,
                    level,
                    angle,
                    response: score as f32,
                };
                (kp, descriptor)
            })
            .collect();

        for (kp, d) in described {
            features.keypoints.push(kp);
            features.descriptors.push(d);
        }
    }
    features
}

/// Level 0 is the input; each further level halves both dimensions.
/// Levels too small to hold a descriptor patch are not built.
fn build_pyramid(frame: &Frame, levels: usize) -> Vec<Frame> {
    let min_side = 2 * KEYPOINT_BORDER + 1;
    let mut pyramid = vec![frame.clone()];
    for _ in 1..levels.max(1) {
        let Some(last) = pyramid.last() else { break };
        if last.width() / 2 < min_side || last.height() / 2 < min_side {
            break;
        }
        let blurred = gaussian_blur(last, PYRAMID_BLUR_SIGMA);
        pyramid.push(Frame::new(downsample_2x(&blurred.data), frame.original_bit_depth));
    }
    pyramid
}

fn downsample_2x(data: &Array2<f32>) -> Array2<f32> {
    let (h, w) = data.dim();
    Array2::from_shape_fn((h / 2, w / 2), |(r, c)| {
        (data[[2 * r, 2 * c]]
            + data[[2 * r, 2 * c + 1]]
            + data[[2 * r + 1, 2 * c]]
            + data[[2 * r + 1, 2 * c + 1]])
            * 0.25
    })
}

/// Split the feature budget across levels in proportion to their area.
fn level_budgets(total: usize, levels: usize) -> Vec<usize> {
    let weights: Vec<f64> = (0..levels).map(|l| 0.25f64.powi(l as i32)).collect();
    let sum: f64 = weights.iter().sum();
    weights
        .iter()
        .map(|w| ((total as f64) * w / sum).ceil() as usize)
        .collect()
}

/// FAST-9 corners as (x, y, score) after 3x3 non-maximum suppression.
///
/// Only pixels at least `KEYPOINT_BORDER` from the edge are tested, so every
/// corner can hold a rotated descriptor patch.
pub fn fast_corners(gray: &Array2<u8>, threshold: u8) -> Vec<(usize, usize, u32)> {
    let (h, w) = gray.dim();
    let border = KEYPOINT_BORDER;
    if h <= 2 * border || w <= 2 * border {
        return Vec::new();
    }

    let mut scores = Array2::<u32>::zeros((h, w));
    for y in border..h - border {
        for x in border..w - border {
            scores[[y, x]] = fast_score(gray, x, y, threshold as i16);
        }
    }

    let mut corners = Vec::new();
    for y in border..h - border {
        for x in border..w - border {
            let s = scores[[y, x]];
            if s == 0 {
                continue;
            }
            let mut is_max = true;
            'nms: for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let n = scores[[(y as i32 + dy) as usize, (x as i32 + dx) as usize]];
                    // Ties go to the first pixel in raster order.
                    let before = dy < 0 || (dy == 0 && dx < 0);
                    if n > s || (before && n == s) {
                        is_max = false;
                        break 'nms;
                    }
                }
            }
            if is_max {
                corners.push((x, y, s));
            }
        }
    }
    corners
}

/// Sum of absolute excess differences over the ring when the pixel is a
/// corner, 0 otherwise.
fn fast_score(gray: &Array2<u8>, x: usize, y: usize, threshold: i16) -> u32 {
    let center = gray[[y, x]] as i16;
    let ring: [i16; 16] = FAST_CIRCLE.map(|(dx, dy)| {
        gray[[(y as i32 + dy) as usize, (x as i32 + dx) as usize]] as i16
    });

    let brighter = |v: i16| v > center + threshold;
    let darker = |v: i16| v < center - threshold;

    let arc = |pred: &dyn Fn(i16) -> bool| -> bool {
        let mut run = 0;
        for i in 0..(16 + FAST_ARC) {
            if pred(ring[i % 16]) {
                run += 1;
                if run >= FAST_ARC {
                    return true;
                }
            } else {
                run = 0;
            }
        }
        false
    };

    if arc(&brighter) {
        ring.iter()
            .filter(|&&v| brighter(v))
            .map(|&v| (v - center - threshold) as u32)
            .sum()
    } else if arc(&darker) {
        ring.iter()
            .filter(|&&v| darker(v))
            .map(|&v| (center - threshold - v) as u32)
            .sum()
    } else {
        0
    }
}

/// Orientation from the intensity centroid of a disc around the keypoint.
fn intensity_centroid_angle(data: &Array2<f32>, x: usize, y: usize) -> f64 {
    let r = ORIENTATION_RADIUS;
    let (mut m01, mut m10) = (0.0f64, 0.0f64);
    for dy in -r..=r {
        for dx in -r..=r {
            if dx * dx + dy * dy > r * r {
                continue;
            }
            let v = data[[(y as i32 + dy) as usize, (x as i32 + dx) as usize]] as f64;
            m10 += dx as f64 * v;
            m01 += dy as f64 * v;
        }
    }
    m01.atan2(m10)
}

type PatternPair = ((f64, f64), (f64, f64));

/// The fixed sampling pattern shared by every image.
fn brief_pattern() -> Vec<PatternPair> {
    let mut rng = StdRng::seed_from_u64(BRIEF_PATTERN_SEED);
    let half = (BRIEF_PATCH_SIZE / 2) as f64;
    // Mean of three uniforms approximates an isotropic Gaussian around the center.
    let mut coord = move || -> f64 {
        let s: f64 = (0..3).map(|_| rng.gen_range(-half..=half)).sum();
        (s / 3.0 * 1.5).clamp(-half, half).round()
    };
    (0..BRIEF_BITS)
        .map(|_| ((coord(), coord()), (coord(), coord())))
        .collect()
}

fn describe(data: &Array2<f32>, x: usize, y: usize, angle: f64, pattern: &[PatternPair]) -> Descriptor {
    let (sin, cos) = angle.sin_cos();
    let sample = |(px, py): (f64, f64)| -> f32 {
        let rx = (cos * px - sin * py).round() as i64;
        let ry = (sin * px + cos * py).round() as i64;
        data[[(y as i64 + ry) as usize, (x as i64 + rx) as usize]]
    };

    let mut descriptor: Descriptor = [0; BRIEF_BITS / 64];
    for (bit, &(a, b)) in pattern.iter().enumerate() {
        if sample(a) < sample(b) {
            descriptor[bit / 64] |= 1 << (bit % 64);
        }
    }
    descriptor
}
