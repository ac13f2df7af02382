use std::path::Path;

use image::{GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use ndarray::Array2;

use crate::error::Result;
use crate::frame::{ColorFrame, Frame};

/// Load an image file as a grayscale Frame.
pub fn load_image(path: &Path) -> Result<Frame> {
    let img = image::open(path)?;
    let gray = img.to_luma16();
    let (w, h) = gray.dimensions();
    let data = Array2::from_shape_fn((h as usize, w as usize), |(row, col)| {
        gray.get_pixel(col as u32, row as u32).0[0] as f32 / 65535.0
    });
    Ok(Frame::new(data, 16))
}

/// Convert a frame to an 8-bit grayscale image buffer.
pub fn to_gray_image(frame: &Frame) -> GrayImage {
    let mut img = GrayImage::new(frame.width() as u32, frame.height() as u32);
    for row in 0..frame.height() {
        for col in 0..frame.width() {
            let val = (frame.data[[row, col]].clamp(0.0, 1.0) * 255.0).round() as u8;
            img.put_pixel(col as u32, row as u32, Luma([val]));
        }
    }
    img
}

/// Convert a color frame to an 8-bit RGB image buffer.
pub fn to_rgb_image(frame: &ColorFrame) -> RgbImage {
    let mut img = RgbImage::new(frame.width() as u32, frame.height() as u32);
    for row in 0..frame.height() {
        for col in 0..frame.width() {
            let px = [0, 1, 2].map(|ch| (frame.data[[row, col, ch]].clamp(0.0, 1.0) * 255.0).round() as u8);
            img.put_pixel(col as u32, row as u32, Rgb(px));
        }
    }
    img
}

/// Save a color frame as 8-bit RGB PNG.
pub fn save_color_png(frame: &ColorFrame, path: &Path) -> Result<()> {
    to_rgb_image(frame).save_with_format(path, ImageFormat::Png)?;
    Ok(())
}
