use ndarray::Array2;
use rayon::prelude::*;

use crate::consts::{GAUSSIAN_TRUNCATE, PARALLEL_PIXEL_THRESHOLD};
use crate::frame::Frame;

/// Normalized Gaussian kernel of radius `round(truncate * sigma)`.
pub fn gaussian_kernel(sigma: f64, truncate: f64) -> Vec<f64> {
    let radius = (truncate * sigma + 0.5).floor().max(0.0) as usize;
    let s2 = 2.0 * sigma * sigma;
    let mut kernel: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-x * x / s2).exp()
        })
        .collect();
    let sum: f64 = kernel.iter().sum();
    for k in &mut kernel {
        *k /= sum;
    }
    kernel
}

/// Apply Gaussian blur to a frame using separable 1D convolution.
///
/// Edges are clamped. A non-positive sigma returns the frame unchanged.
pub fn gaussian_blur(frame: &Frame, sigma: f32) -> Frame {
    if sigma <= 0.0 {
        return frame.clone();
    }
    let kernel: Vec<f32> = gaussian_kernel(sigma as f64, 3.0)
        .into_iter()
        .map(|k| k as f32)
        .collect();
    let rows = convolve(&frame.data, &kernel, false);
    let both = convolve(&rows, &kernel, true);
    Frame::new(both, frame.original_bit_depth)
}

fn convolve(data: &Array2<f32>, kernel: &[f32], vertical: bool) -> Array2<f32> {
    let (h, w) = data.dim();
    let radius = kernel.len() as isize / 2;

    let row_at = |row: usize| -> Vec<f32> {
        (0..w)
            .map(|col| {
                kernel
                    .iter()
                    .enumerate()
                    .map(|(ki, &kv)| {
                        let off = ki as isize - radius;
                        let v = if vertical {
                            let r = (row as isize + off).clamp(0, h as isize - 1) as usize;
                            data[[r, col]]
                        } else {
                            let c = (col as isize + off).clamp(0, w as isize - 1) as usize;
                            data[[row, c]]
                        };
                        v * kv
                    })
                    .sum()
            })
            .collect()
    };

    let rows: Vec<Vec<f32>> = if h * w >= PARALLEL_PIXEL_THRESHOLD {
        (0..h).into_par_iter().map(row_at).collect()
    } else {
        (0..h).map(row_at).collect()
    };

    Array2::from_shape_fn((h, w), |(r, c)| rows[r][c])
}

/// One-dimensional Gaussian low-pass filter.
///
/// Boundaries are handled by half-sample reflection (`d c b a | a b c d`)
/// and the kernel is truncated at four standard deviations. A non-positive
/// sigma returns the input unchanged.
pub fn gaussian_filter1d(data: &[f64], sigma: f64) -> Vec<f64> {
    if sigma <= 0.0 || data.is_empty() {
        return data.to_vec();
    }
    let kernel = gaussian_kernel(sigma, GAUSSIAN_TRUNCATE);
    let radius = kernel.len() as isize / 2;
    let n = data.len() as isize;

    (0..n)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .map(|(ki, &kv)| data[reflect(i + ki as isize - radius, n)] * kv)
                .sum()
        })
        .collect()
}

fn reflect(mut idx: isize, n: isize) -> usize {
    let period = 2 * n;
    idx = idx.rem_euclid(period);
    if idx >= n {
        idx = period - 1 - idx;
    }
    idx as usize
}
