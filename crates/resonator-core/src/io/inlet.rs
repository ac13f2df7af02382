//! Discovery of the videos and reference file in an input folder.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{ResonatorError, Result};
use crate::io::source::is_video_path;
use crate::pipeline::Phase;

const REFERENCE_EXTENSION: &str = "csv";
const MAX_VIDEOS: usize = 2;

/// The validated contents of an input folder.
#[derive(Clone, Debug)]
pub struct Inlet {
    pub dir: PathBuf,
    /// Videos with their phase, concentration first.
    pub videos: Vec<(Phase, PathBuf)>,
    pub reference: PathBuf,
}

/// Find the videos and the single reference file in `dir`.
///
/// Derived files (names containing `small` or `result`) are ignored. One
/// video is classified by name; two must be one concentration and one
/// washing video.
pub fn discover_inlet(dir: &Path) -> Result<Inlet> {
    let mut videos = Vec::new();
    let mut references = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let name = file_name_lower(&path);
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if is_video_path(&path) && !name.contains("small") && !name.contains("result") {
            videos.push(path);
        } else if ext == REFERENCE_EXTENSION {
            references.push(path);
        }
    }
    videos.sort();

    let count_error = |state: &'static str, kind: &'static str| ResonatorError::FileCount {
        state,
        kind,
        folder: dir.to_path_buf(),
    };

    let reference = match references.len() {
        0 => return Err(count_error("too few", "reference")),
        1 => references.remove(0),
        _ => return Err(count_error("too many", "reference")),
    };

    let videos = match videos.len() {
        0 => return Err(count_error("no", "video")),
        1 => {
            let phase = classify_video(&videos[0]);
            match phase {
                Phase::Washing => warn!(
                    "Processing a single washing video; its background comes from the washing signal itself"
                ),
                Phase::Total => info!(
                    "Processing as a total video; name files Concentration/Washing to process phases separately"
                ),
                Phase::Concentration => {}
            }
            vec![(phase, videos.remove(0))]
        }
        n if n <= MAX_VIDEOS => {
            let pick = |phase: Phase| {
                videos
                    .iter()
                    .find(|p| classify_video(p) == phase)
                    .cloned()
                    .ok_or_else(|| count_error("no 'Concentration'/'Washing'", "video"))
            };
            vec![
                (Phase::Concentration, pick(Phase::Concentration)?),
                (Phase::Washing, pick(Phase::Washing)?),
            ]
        }
        _ => return Err(count_error("too many", "video")),
    };

    info!(
        dir = %dir.display(),
        videos = videos.len(),
        reference = %reference.display(),
        "Discovered inlet"
    );
    Ok(Inlet {
        dir: dir.to_path_buf(),
        videos,
        reference,
    })
}

/// Phase implied by a video's file name.
pub fn classify_video(path: &Path) -> Phase {
    let name = file_name_lower(path);
    if name.contains("concentration") {
        Phase::Concentration
    } else if name.contains("washing") {
        Phase::Washing
    } else {
        Phase::Total
    }
}

fn file_name_lower(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}
