use std::fs::File;
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt};
use memmap2::Mmap;
use ndarray::Array3;

use crate::consts::{COLOR_CHANNEL_COUNT, SER_TICKS_PER_SECOND};
use crate::error::{ResonatorError, Result};
use crate::frame::{ColorFrame, ColorMode, SourceInfo};

pub const SER_HEADER_SIZE: usize = 178;
pub const SER_MAGIC: &[u8; 14] = b"LUCAM-RECORDER";

/// SER file header (178 bytes).
#[derive(Clone, Debug)]
pub struct SerHeader {
    pub color_id: i32,
    pub little_endian: bool,
    pub width: u32,
    pub height: u32,
    pub pixel_depth: u32,
    pub frame_count: u32,
    pub observer: String,
    pub instrument: String,
    pub telescope: String,
    pub date_time: u64,
    pub date_time_utc: u64,
}

impl SerHeader {
    /// Header for an 8-bit interleaved RGB file.
    pub fn rgb8(width: u32, height: u32) -> Self {
        Self {
            color_id: 100,
            little_endian: true,
            width,
            height,
            pixel_depth: 8,
            frame_count: 0,
            observer: String::new(),
            instrument: String::new(),
            telescope: String::new(),
            date_time: 0,
            date_time_utc: 0,
        }
    }

    /// Header for a fresh file with the same pixel layout but new geometry.
    pub fn resized(&self, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame_count: 0,
            ..self.clone()
        }
    }

    /// Bytes per pixel plane (1 for 8-bit, 2 for 9-16 bit).
    pub fn bytes_per_pixel_plane(&self) -> usize {
        if self.pixel_depth <= 8 { 1 } else { 2 }
    }

    /// Number of planes per pixel (1 for mono/bayer, 3 for RGB/BGR).
    pub fn planes_per_pixel(&self) -> usize {
        match self.color_id {
            100 | 101 => 3,
            _ => 1,
        }
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.bytes_per_pixel_plane() * self.planes_per_pixel()
    }

    /// Total bytes per frame, or `None` when it does not fit in `usize`.
    pub fn checked_frame_byte_size(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.bytes_per_pixel())
    }

    /// Total bytes per frame, saturating at `usize::MAX`.
    pub fn frame_byte_size(&self) -> usize {
        self.checked_frame_byte_size().unwrap_or(usize::MAX)
    }

    /// Header plus frame data size, or `None` on overflow.
    pub fn checked_data_end(&self) -> Option<usize> {
        self.checked_frame_byte_size()?
            .checked_mul(self.frame_count as usize)?
            .checked_add(SER_HEADER_SIZE)
    }

    pub fn color_mode(&self) -> ColorMode {
        match self.color_id {
            0 => ColorMode::Mono,
            8 => ColorMode::BayerRGGB,
            9 => ColorMode::BayerGRBG,
            10 => ColorMode::BayerGBRG,
            11 => ColorMode::BayerBGGR,
            100 => ColorMode::RGB,
            101 => ColorMode::BGR,
            _ => ColorMode::Mono,
        }
    }
}

/// Memory-mapped SER file reader.
pub struct SerReader {
    mmap: Mmap,
    path: PathBuf,
    pub header: SerHeader,
}

impl SerReader {
    /// Open a SER file and parse its header.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        // SAFETY: the mapping is read-only and the file is not modified while mapped.
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() < SER_HEADER_SIZE {
            return Err(ResonatorError::InvalidSer(
                "File too small for SER header".into(),
            ));
        }

        if &mmap[0..14] != SER_MAGIC {
            return Err(ResonatorError::InvalidSer(
                "Missing LUCAM-RECORDER magic".into(),
            ));
        }

        let header = parse_header(&mmap[..SER_HEADER_SIZE])?;

        let expected_data_size = header.checked_data_end().ok_or_else(|| {
            ResonatorError::InvalidSer(format!(
                "Frame data size overflows: {}x{} x {} frames",
                header.width, header.height, header.frame_count
            ))
        })?;
        if mmap.len() < expected_data_size {
            return Err(ResonatorError::InvalidSer(format!(
                "File truncated: expected at least {} bytes, got {}",
                expected_data_size,
                mmap.len()
            )));
        }

        Ok(Self {
            mmap,
            path: path.to_path_buf(),
            header,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frame_count(&self) -> usize {
        self.header.frame_count as usize
    }

    /// Get the raw bytes for a single frame (zero-copy from mmap).
    pub fn frame_raw(&self, index: usize) -> Result<&[u8]> {
        let count = self.frame_count();
        if index >= count {
            return Err(ResonatorError::FrameIndexOutOfRange {
                index,
                total: count,
            });
        }
        let offset = SER_HEADER_SIZE + index * self.header.frame_byte_size();
        let end = offset + self.header.frame_byte_size();
        Ok(&self.mmap[offset..end])
    }

    /// Read a single frame as RGB, converting to f32 in [0.0, 1.0].
    ///
    /// Mono and Bayer data is replicated into all three channels.
    pub fn read_frame(&self, index: usize) -> Result<ColorFrame> {
        let raw = self.frame_raw(index)?;
        let data = decode_rgb(raw, &self.header);
        let bit_depth = (self.header.bytes_per_pixel_plane() * 8) as u8;
        Ok(ColorFrame::new(data, bit_depth, index))
    }

    /// Read per-frame timestamp from the optional trailer.
    pub fn read_timestamp(&self, index: usize) -> Option<u64> {
        let trailer_offset = self.header.checked_data_end()?;
        let ts_offset = trailer_offset.checked_add(index.checked_mul(8)?)?;
        let bytes = self.mmap.get(ts_offset..ts_offset.checked_add(8)?)?;
        Some(u64::from_le_bytes(bytes.try_into().ok()?))
    }

    /// Mean frame interval from the timestamp trailer, if it is present and
    /// monotonic.
    pub fn seconds_per_frame(&self) -> Option<f64> {
        let count = self.frame_count();
        if count < 2 {
            return None;
        }
        let first = self.read_timestamp(0)?;
        let last = self.read_timestamp(count - 1)?;
        if last <= first {
            return None;
        }
        Some((last - first) as f64 / SER_TICKS_PER_SECOND / (count - 1) as f64)
    }

    /// Build SourceInfo from the header.
    pub fn source_info(&self) -> SourceInfo {
        SourceInfo {
            filename: self.path.clone(),
            total_frames: self.frame_count(),
            width: self.header.width,
            height: self.header.height,
            bit_depth: self.header.pixel_depth as u8,
            color_mode: self.header.color_mode(),
        }
    }
}

fn parse_header(buf: &[u8]) -> Result<SerHeader> {
    let mut cursor = std::io::Cursor::new(&buf[14..]); // skip magic

    let _lu_id = cursor.read_i32::<LittleEndian>()?;
    let color_id = cursor.read_i32::<LittleEndian>()?;
    let le_flag = cursor.read_i32::<LittleEndian>()?;
    let width = cursor.read_i32::<LittleEndian>()?;
    let height = cursor.read_i32::<LittleEndian>()?;
    let pixel_depth = cursor.read_i32::<LittleEndian>()?;
    let frame_count = cursor.read_i32::<LittleEndian>()?;

    let observer = read_fixed_string(&buf[42..82]);
    let instrument = read_fixed_string(&buf[82..122]);
    let telescope = read_fixed_string(&buf[122..162]);

    let mut cursor = std::io::Cursor::new(&buf[162..]);
    let date_time = cursor.read_u64::<LittleEndian>()?;
    let date_time_utc = cursor.read_u64::<LittleEndian>()?;

    if width <= 0 || height <= 0 {
        return Err(ResonatorError::InvalidDimensions {
            width: width.max(0) as u32,
            height: height.max(0) as u32,
        });
    }
    if frame_count < 0 {
        return Err(ResonatorError::InvalidSer(format!(
            "Negative frame count {frame_count}"
        )));
    }
    if !(1..=16).contains(&pixel_depth) {
        return Err(ResonatorError::InvalidSer(format!(
            "Unsupported pixel depth {pixel_depth}"
        )));
    }

    // 0 is little-endian in practice (Siril convention), despite the format notes.
    let little_endian = le_flag != 1;

    Ok(SerHeader {
        color_id,
        little_endian,
        width: width as u32,
        height: height as u32,
        pixel_depth: pixel_depth as u32,
        frame_count: frame_count as u32,
        observer,
        instrument,
        telescope,
        date_time,
        date_time_utc,
    })
}

fn read_fixed_string(buf: &[u8]) -> String {
    String::from_utf8_lossy(buf)
        .trim_end_matches('\0')
        .trim()
        .to_string()
}

fn decode_rgb(raw: &[u8], header: &SerHeader) -> Array3<f32> {
    let h = header.height as usize;
    let w = header.width as usize;
    let bps = header.bytes_per_pixel_plane();
    let planes = header.planes_per_pixel();
    let max_val = ((1u32 << header.pixel_depth) - 1) as f32;
    let bgr = header.color_mode() == ColorMode::BGR;

    let sample = |idx: usize| -> f32 {
        let val = if bps == 1 {
            raw[idx] as f32
        } else {
            let pair = [raw[idx], raw[idx + 1]];
            if header.little_endian {
                u16::from_le_bytes(pair) as f32
            } else {
                u16::from_be_bytes(pair) as f32
            }
        };
        val / max_val
    };

    Array3::from_shape_fn((h, w, COLOR_CHANNEL_COUNT), |(row, col, ch)| {
        let pixel_offset = (row * w + col) * planes * bps;
        if planes == 1 {
            sample(pixel_offset)
        } else {
            let plane = if bgr { 2 - ch } else { ch };
            sample(pixel_offset + plane * bps)
        }
    })
}

/// Encode a color frame back into raw SER bytes for `header`'s layout.
///
/// Mono layouts store the channel mean.
pub fn encode_frame(frame: &ColorFrame, header: &SerHeader) -> Vec<u8> {
    let bps = header.bytes_per_pixel_plane();
    let planes = header.planes_per_pixel();
    let max_val = ((1u32 << header.pixel_depth) - 1) as f32;
    let bgr = header.color_mode() == ColorMode::BGR;
    let (h, w, _) = frame.data.dim();

    let mut out = Vec::with_capacity(h * w * planes * bps);
    for row in 0..h {
        for col in 0..w {
            for plane in 0..planes {
                let v = if planes == 1 {
                    (0..COLOR_CHANNEL_COUNT)
                        .map(|ch| frame.data[[row, col, ch]])
                        .sum::<f32>()
                        / COLOR_CHANNEL_COUNT as f32
                } else {
                    let ch = if bgr { 2 - plane } else { plane };
                    frame.data[[row, col, ch]]
                };
                let q = (v.clamp(0.0, 1.0) * max_val).round() as u16;
                if bps == 1 {
                    out.push(q as u8);
                } else if header.little_endian {
                    out.extend_from_slice(&q.to_le_bytes());
                } else {
                    out.extend_from_slice(&q.to_be_bytes());
                }
            }
        }
    }
    out
}
