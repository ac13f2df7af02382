use std::path::{Path, PathBuf};

use ndarray::Array3;
use tracing::info;

use crate::consts::{COLOR_CHANNEL_COUNT, DOWNSCALED_SUFFIX, SER_TICKS_PER_SECOND};
use crate::error::Result;
use crate::frame::ColorFrame;
use crate::io::ser::{encode_frame, SerHeader, SerReader};
use crate::io::ser_writer::SerWriter;
use crate::io::source::open_source;

/// Location of the downscaled copy of `input`: `<stem>_small.ser` alongside it.
pub fn downscaled_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{stem}{DOWNSCALED_SUFFIX}.ser"))
}

/// Downscale any supported container to a SER copy of `target_height` rows.
pub fn downscale_video(input: &Path, target_height: u32) -> Result<PathBuf> {
    let is_ser = input
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("ser"));
    if is_ser {
        downscale_ser(input, target_height)
    } else {
        downscale_stream(input, target_height)
    }
}

/// Scaled geometry keeping the aspect ratio.
fn scaled_size(width: u32, height: u32, target_height: u32) -> (u32, u32) {
    let scale = target_height as f64 / height as f64;
    (((width as f64 * scale).round() as u32).max(1), target_height)
}

/// Write a copy of `input` scaled to `target_height` rows, keeping the
/// aspect ratio. An existing copy is reused; sources already at or below the
/// target height are returned as-is.
pub fn downscale_ser(input: &Path, target_height: u32) -> Result<PathBuf> {
    let reader = SerReader::open(input)?;
    let src = &reader.header;
    if target_height == 0 || target_height >= src.height {
        return Ok(input.to_path_buf());
    }

    let out_path = downscaled_path(input);
    if out_path.exists() {
        info!(path = %out_path.display(), "Reusing downscaled video");
        return Ok(out_path);
    }

    let (new_w, new_h) = scaled_size(src.width, src.height, target_height);
    let header = src.resized(new_w, new_h);

    info!(
        from = format!("{}x{}", src.width, src.height),
        to = format!("{new_w}x{new_h}"),
        "Downscaling video"
    );

    let mut writer = SerWriter::create(&out_path, &header)?;
    let mut timestamps = Vec::with_capacity(reader.frame_count());
    for i in 0..reader.frame_count() {
        let frame = reader.read_frame(i)?;
        let resized = resize_bilinear(&frame, new_w as usize, new_h as usize);
        writer.write_raw_frame(&encode_frame(&resized, &header))?;
        if let Some(ts) = reader.read_timestamp(i) {
            timestamps.push(ts);
        }
    }
    if timestamps.len() == reader.frame_count() {
        writer.write_timestamps(&timestamps)?;
    }
    writer.finalize()?;

    Ok(out_path)
}

/// Decode `input` sequentially into an 8-bit RGB SER copy. Timestamps are
/// synthesized from the container frame rate when it reports one.
fn downscale_stream(input: &Path, target_height: u32) -> Result<PathBuf> {
    let mut source = open_source(input)?;
    let info = source.info().clone();
    if target_height == 0 || target_height >= info.height {
        return Ok(input.to_path_buf());
    }

    let out_path = downscaled_path(input);
    if out_path.exists() {
        info!(path = %out_path.display(), "Reusing downscaled video");
        return Ok(out_path);
    }

    let (new_w, new_h) = scaled_size(info.width, info.height, target_height);
    let header = SerHeader::rgb8(new_w, new_h);
    info!(
        from = format!("{}x{}", info.width, info.height),
        to = format!("{new_w}x{new_h}"),
        "Downscaling video to SER"
    );

    let mut writer = SerWriter::create(&out_path, &header)?;
    while let Some(frame) = source.next_frame()? {
        let resized = resize_bilinear(&frame, new_w as usize, new_h as usize);
        writer.write_raw_frame(&encode_frame(&resized, &header))?;
    }
    if let Some(spf) = source.seconds_per_frame() {
        let ticks = spf * SER_TICKS_PER_SECOND;
        let timestamps: Vec<u64> = (0..writer.frames_written())
            .map(|i| (i as f64 * ticks).round() as u64)
            .collect();
        writer.write_timestamps(&timestamps)?;
    }
    writer.finalize()?;

    Ok(out_path)
}

/// Bilinear resample of every channel onto a `width` x `height` grid.
pub fn resize_bilinear(frame: &ColorFrame, width: usize, height: usize) -> ColorFrame {
    let (src_h, src_w, _) = frame.data.dim();
    let sy = src_h as f64 / height as f64;
    let sx = src_w as f64 / width as f64;

    let data = Array3::from_shape_fn((height, width, COLOR_CHANNEL_COUNT), |(r, c, ch)| {
        // Pixel centers map onto pixel centers.
        let y = ((r as f64 + 0.5) * sy - 0.5).clamp(0.0, (src_h - 1) as f64);
        let x = ((c as f64 + 0.5) * sx - 0.5).clamp(0.0, (src_w - 1) as f64);
        let y0 = y.floor() as usize;
        let x0 = x.floor() as usize;
        let y1 = (y0 + 1).min(src_h - 1);
        let x1 = (x0 + 1).min(src_w - 1);
        let fy = (y - y0 as f64) as f32;
        let fx = (x - x0 as f64) as f32;

        let v00 = frame.data[[y0, x0, ch]];
        let v01 = frame.data[[y0, x1, ch]];
        let v10 = frame.data[[y1, x0, ch]];
        let v11 = frame.data[[y1, x1, ch]];

        v00 * (1.0 - fx) * (1.0 - fy) + v01 * fx * (1.0 - fy) + v10 * (1.0 - fx) * fy + v11 * fx * fy
    });

    ColorFrame::new(data, frame.original_bit_depth, frame.index)
}
