use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResonatorError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid SER file: {0}")]
    InvalidSer(String),

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Frame index {index} out of range (total: {total})")]
    FrameIndexOutOfRange { index: usize, total: usize },

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Registration failed: {0}")]
    Registration(String),

    #[error("Registration failed: need at least {needed} matches, found {found}")]
    TooFewMatches { needed: usize, found: usize },

    #[error(
        "Mapped ROI {x},{y} {width}x{height} does not fit the {frame_width}x{frame_height} frame; \
         reset the basis image and ROI"
    )]
    RoiOutOfFrame {
        x: i64,
        y: i64,
        width: i64,
        height: i64,
        frame_width: u32,
        frame_height: u32,
    },

    #[error("Video stream error: {0}")]
    Stream(String),

    #[cfg(feature = "opencv")]
    #[error("OpenCV error: {0}")]
    OpenCv(#[from] opencv::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error(
        "There are {state} {kind} files in the provided folder, please check folder {} and refer to docs",
        folder.display()
    )]
    FileCount {
        state: &'static str,
        kind: &'static str,
        folder: PathBuf,
    },

    #[error("Reference series '{series}' unreadable: {reason}")]
    ReferenceData { series: String, reason: String },

    #[error("Malformed sliced signal file at line {line}: {reason}")]
    SlicedFormat { line: usize, reason: String },

    #[error("Empty frame sequence")]
    EmptySequence,
}

pub type Result<T> = std::result::Result<T, ResonatorError>;
