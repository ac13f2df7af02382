#![allow(dead_code)]

use std::path::{Path, PathBuf};

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use resonator_core::io::ser::SER_HEADER_SIZE;

/// Build a SER file header.
///
/// `color_id`: 0=MONO, 100=RGB, 101=BGR
pub fn build_ser_header_full(
    width: u32,
    height: u32,
    bit_depth: u32,
    num_frames: usize,
    color_id: i32,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(SER_HEADER_SIZE);

    // Magic (14 bytes)
    buf.extend_from_slice(b"LUCAM-RECORDER");
    // LuID
    buf.extend_from_slice(&0i32.to_le_bytes());
    // ColorID
    buf.extend_from_slice(&color_id.to_le_bytes());
    // LittleEndian = 0 (little-endian per Siril convention)
    buf.extend_from_slice(&0i32.to_le_bytes());
    buf.extend_from_slice(&(width as i32).to_le_bytes());
    buf.extend_from_slice(&(height as i32).to_le_bytes());
    buf.extend_from_slice(&(bit_depth as i32).to_le_bytes());
    buf.extend_from_slice(&(num_frames as i32).to_le_bytes());
    // Observer, Instrument, Telescope (40 bytes each)
    buf.extend_from_slice(&[0u8; 120]);
    // DateTime, DateTimeUTC
    buf.extend_from_slice(&0u64.to_le_bytes());
    buf.extend_from_slice(&0u64.to_le_bytes());

    assert_eq!(buf.len(), SER_HEADER_SIZE);
    buf
}

/// Complete mono 8-bit SER file.
pub fn build_mono_ser(width: u32, height: u32, frames: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = build_ser_header_full(width, height, 8, frames.len(), 0);
    for frame in frames {
        buf.extend_from_slice(frame);
    }
    buf
}

/// Complete RGB 8-bit SER file; frames are interleaved RGB bytes.
pub fn build_rgb_ser(width: u32, height: u32, frames: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = build_ser_header_full(width, height, 8, frames.len(), 100);
    for frame in frames {
        buf.extend_from_slice(frame);
    }
    buf
}

/// Append a timestamp trailer with a fixed interval in 100 ns ticks.
pub fn append_timestamps(buf: &mut Vec<u8>, frames: usize, interval_ticks: u64) {
    for i in 0..frames as u64 {
        buf.extend_from_slice(&(1_000_000 + i * interval_ticks).to_le_bytes());
    }
}

/// Write bytes to `dir/name` and return the path.
pub fn write_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).expect("write test file");
    path
}

/// Blocky random texture in [0.1, 0.9], rich in FAST corners.
pub fn block_texture(width: usize, height: usize, block: usize, seed: u64) -> Array2<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let bw = width.div_ceil(block);
    let bh = height.div_ceil(block);
    let levels: Vec<f32> = (0..bw * bh).map(|_| rng.gen_range(0.1..0.9)).collect();
    Array2::from_shape_fn((height, width), |(r, c)| levels[(r / block) * bw + c / block])
}

/// Window of `tex` with its top-left corner at (x, y).
pub fn window(tex: &Array2<f32>, x: usize, y: usize, width: usize, height: usize) -> Array2<f32> {
    tex.slice(ndarray::s![y..y + height, x..x + width]).to_owned()
}

/// Quantize [0, 1] values to 8-bit bytes in row-major order.
pub fn to_bytes(data: &Array2<f32>) -> Vec<u8> {
    data.iter()
        .map(|&v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
        .collect()
}

/// Save [0, 1] values as an 8-bit grayscale PNG.
pub fn save_gray_png(data: &Array2<f32>, path: &Path) {
    let (h, w) = data.dim();
    let img = image::GrayImage::from_raw(w as u32, h as u32, to_bytes(data)).expect("image size");
    img.save(path).expect("save png");
}
