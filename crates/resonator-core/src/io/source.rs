//! Sequential frame access for the extraction pipeline.

use std::path::Path;

use tracing::debug;

use crate::error::{ResonatorError, Result};
use crate::frame::{ColorFrame, SourceInfo};
use crate::io::ser::SerReader;

/// Containers decoded through OpenCV rather than read directly.
pub const COMPRESSED_EXTENSIONS: &[&str] = &["mp4", "avi", "mov"];

/// Whether `path` has a container extension `open_source` understands.
pub fn is_video_path(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|ext| ext == "ser" || COMPRESSED_EXTENSIONS.contains(&ext.as_str()))
}

/// A video opened for strictly sequential reading.
pub trait FrameSource {
    fn info(&self) -> &SourceInfo;

    /// Frame interval recorded in the container, if any.
    fn seconds_per_frame(&self) -> Option<f64>;

    /// Index of the frame the next call to `next_frame` returns.
    fn position(&self) -> usize;

    /// Next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<ColorFrame>>;

    /// Advance past `count` frames without decoding them. Returns how many
    /// were actually skipped.
    fn skip(&mut self, count: usize) -> Result<usize>;
}

/// SER-backed frame source.
pub struct SerSource {
    reader: SerReader,
    info: SourceInfo,
    cursor: usize,
}

impl SerSource {
    pub fn open(path: &Path) -> Result<Self> {
        let reader = SerReader::open(path)?;
        let info = reader.source_info();
        debug!(
            path = %path.display(),
            frames = info.total_frames,
            width = info.width,
            height = info.height,
            "Opened SER source"
        );
        Ok(Self {
            reader,
            info,
            cursor: 0,
        })
    }
}

impl FrameSource for SerSource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn seconds_per_frame(&self) -> Option<f64> {
        self.reader.seconds_per_frame()
    }

    fn position(&self) -> usize {
        self.cursor
    }

    fn next_frame(&mut self) -> Result<Option<ColorFrame>> {
        if self.cursor >= self.reader.frame_count() {
            return Ok(None);
        }
        let frame = self.reader.read_frame(self.cursor)?;
        self.cursor += 1;
        Ok(Some(frame))
    }

    fn skip(&mut self, count: usize) -> Result<usize> {
        let remaining = self.reader.frame_count().saturating_sub(self.cursor);
        let skipped = count.min(remaining);
        self.cursor += skipped;
        Ok(skipped)
    }
}

/// Open a video by file extension.
pub fn open_source(path: &Path) -> Result<Box<dyn FrameSource>> {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("ser") => Ok(Box::new(SerSource::open(path)?)),
        #[cfg(feature = "opencv")]
        Some(ext) if COMPRESSED_EXTENSIONS.contains(&ext) => {
            Ok(Box::new(crate::io::capture::CvSource::open(path)?))
        }
        #[cfg(not(feature = "opencv"))]
        Some(ext) if COMPRESSED_EXTENSIONS.contains(&ext) => Err(ResonatorError::Stream(format!(
            "{} needs a build with the `opencv` feature",
            path.display()
        ))),
        _ => Err(ResonatorError::Stream(format!(
            "Unsupported video container: {}",
            path.display()
        ))),
    }
}

/// Read the frame at `index`, skipping everything before it.
pub fn read_frame_at(path: &Path, index: usize) -> Result<ColorFrame> {
    let mut source = open_source(path)?;
    source.skip(index)?;
    match source.next_frame()? {
        Some(frame) => Ok(frame),
        None => Err(ResonatorError::Stream(format!(
            "Error reading frame {} from {} ({} frames)",
            index,
            path.display(),
            source.info().total_frames
        ))),
    }
}
