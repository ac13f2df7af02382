//! Diagnostic overlay plot of brightness against the reference series.
//!
//! Each series is scaled to its own vertical range, the raster equivalent of
//! independent y-axes. Vertical ticks mark whole minutes.

use std::path::Path;

use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_cross_mut, draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut,
};
use imageproc::rect::Rect;

use crate::error::Result;
use crate::io::reference::TimeSeries;

use super::reconcile::Reconciled;

pub const PLOT_WIDTH: u32 = 1200;
pub const PLOT_HEIGHT: u32 = 500;
const MARGIN: u32 = 40;
const TICK_LENGTH: f32 = 6.0;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const FRAME_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
const BRIGHTNESS_COLOR: Rgb<u8> = Rgb([128, 0, 0]);
const CELLS_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
const SENSOR_COLOR: Rgb<u8> = Rgb([0, 0, 255]);

/// Maps data coordinates into the plotting area.
struct Axes {
    x_range: (f64, f64),
    left: f32,
    top: f32,
    width: f32,
    height: f32,
}

impl Axes {
    fn x(&self, t: f64) -> f32 {
        let (lo, hi) = self.x_range;
        self.left + (((t - lo) / (hi - lo).max(f64::EPSILON)) as f32) * self.width
    }

    fn y(&self, v: f64, range: (f64, f64)) -> f32 {
        let (lo, hi) = range;
        let frac = if hi > lo { (v - lo) / (hi - lo) } else { 0.5 };
        self.top + (1.0 - frac as f32) * self.height
    }
}

fn value_range(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Render the overlay plot.
pub fn render_plot(result: &Reconciled) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(PLOT_WIDTH, PLOT_HEIGHT, BACKGROUND);

    let cells = result.cells.as_present();
    let sensor = result.sensor.as_present();
    let all_times: Vec<f64> = result
        .times
        .iter()
        .chain(cells.map(|s| s.times.iter()).into_iter().flatten())
        .chain(sensor.map(|s| s.times.iter()).into_iter().flatten())
        .copied()
        .collect();
    let x_range = value_range(&all_times).unwrap_or((0.0, 1.0));

    let axes = Axes {
        x_range,
        left: MARGIN as f32,
        top: MARGIN as f32,
        width: (PLOT_WIDTH - 2 * MARGIN) as f32,
        height: (PLOT_HEIGHT - 2 * MARGIN) as f32,
    };

    draw_hollow_rect_mut(
        &mut canvas,
        Rect::at(MARGIN as i32, MARGIN as i32).of_size(PLOT_WIDTH - 2 * MARGIN, PLOT_HEIGHT - 2 * MARGIN),
        FRAME_COLOR,
    );
    let bottom = axes.top + axes.height;
    let mut minute = x_range.0.floor();
    while minute <= x_range.1.ceil() {
        if minute >= x_range.0 && minute <= x_range.1 {
            let x = axes.x(minute);
            draw_line_segment_mut(&mut canvas, (x, bottom), (x, bottom + TICK_LENGTH), FRAME_COLOR);
        }
        minute += 1.0;
    }

    if let Some(range) = value_range(&result.calibrated) {
        for (t, v) in result.times.windows(2).zip(result.calibrated.windows(2)) {
            let start = (axes.x(t[0]), axes.y(v[0], range));
            let end = (axes.x(t[1]), axes.y(v[1], range));
            draw_line_segment_mut(&mut canvas, start, end, BRIGHTNESS_COLOR);
        }
    }

    if let Some(series) = cells {
        plot_points(&mut canvas, &axes, series, |canvas, x, y| {
            draw_filled_circle_mut(canvas, (x, y), 3, CELLS_COLOR);
        });
    }
    if let Some(series) = sensor {
        plot_points(&mut canvas, &axes, series, |canvas, x, y| {
            draw_cross_mut(canvas, SENSOR_COLOR, x, y);
        });
    }

    canvas
}

fn plot_points(
    canvas: &mut RgbImage,
    axes: &Axes,
    series: &TimeSeries,
    mut mark: impl FnMut(&mut RgbImage, i32, i32),
) {
    let Some(range) = value_range(&series.values) else {
        return;
    };
    for (&t, &v) in series.times.iter().zip(&series.values) {
        let x = axes.x(t).round() as i32;
        let y = axes.y(v, range).round() as i32;
        mark(canvas, x, y);
    }
}

/// Render and save the plot as PNG.
pub fn save_plot(result: &Reconciled, path: &Path) -> Result<()> {
    render_plot(result).save(path)?;
    Ok(())
}
