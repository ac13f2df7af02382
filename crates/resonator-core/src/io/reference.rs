//! Ground-truth reference data exported from the run workbook as CSV.
//!
//! Column layout (letters as in the workbook):
//!
//! | columns | content                                   |
//! |---------|-------------------------------------------|
//! | A:B     | concentration cell counts                 |
//! | C:D     | concentration sensor readings             |
//! | G:H     | washing cell counts                       |
//! | I:J     | washing sensor readings                   |
//! | M:N     | named markers, `mm:ss` text               |
//!
//! Series blocks carry a title row and a header row before the data. Series
//! times are minutes since the start of their phase; markers give each
//! phase start on the video clock.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{ResonatorError, Result};

const SERIES_HEADER_ROWS: usize = 2;
const START_OF_VIDEO: &str = "Start of video";
pub const CONCENTRATION_START: &str = "Start of concentration";
pub const WASHING_START: &str = "Start of washing";

/// Ordered (time, value) samples. Times are seconds on the video clock.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeSeries {
    pub times: Vec<f64>,
    pub values: Vec<f64>,
}

impl TimeSeries {
    pub fn new(times: Vec<f64>, values: Vec<f64>) -> Self {
        debug_assert_eq!(times.len(), values.len());
        Self { times, values }
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Earliest and latest timestamp.
    pub fn span(&self) -> Option<(f64, f64)> {
        self.times.iter().fold(None, |acc, &t| match acc {
            None => Some((t, t)),
            Some((lo, hi)) => Some((lo.min(t), hi.max(t))),
        })
    }

    /// Concatenate two series and sort by time.
    pub fn merged(&self, other: &TimeSeries) -> TimeSeries {
        let mut pairs: Vec<(f64, f64)> = self
            .times
            .iter()
            .copied()
            .zip(self.values.iter().copied())
            .chain(other.times.iter().copied().zip(other.values.iter().copied()))
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (times, values) = pairs.into_iter().unzip();
        TimeSeries { times, values }
    }
}

/// A reference series that was either provided or is missing.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Reference {
    Present(TimeSeries),
    #[default]
    Absent,
}

impl Reference {
    pub fn as_present(&self) -> Option<&TimeSeries> {
        match self {
            Self::Present(s) => Some(s),
            Self::Absent => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    /// Union of two references; absent only if both are.
    pub fn union(&self, other: &Reference) -> Reference {
        match (self, other) {
            (Self::Present(a), Self::Present(b)) => Self::Present(a.merged(b)),
            (Self::Present(a), Self::Absent) | (Self::Absent, Self::Present(a)) => {
                Self::Present(a.clone())
            }
            (Self::Absent, Self::Absent) => Self::Absent,
        }
    }
}

/// Cell-count and sensor references for one phase.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PhaseReferences {
    pub cells: Reference,
    pub sensor: Reference,
}

impl PhaseReferences {
    pub fn union(&self, other: &PhaseReferences) -> PhaseReferences {
        PhaseReferences {
            cells: self.cells.union(&other.cells),
            sensor: self.sensor.union(&other.sensor),
        }
    }
}

/// Everything read from one reference workbook.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReferenceWorkbook {
    pub concentration: PhaseReferences,
    pub washing: PhaseReferences,
    /// Marker name to seconds since the start of the video.
    pub markers: BTreeMap<String, f64>,
}

impl ReferenceWorkbook {
    /// Start of the washing phase in seconds, or 0 when not recorded.
    pub fn washing_start(&self) -> f64 {
        self.markers.get(WASHING_START).copied().unwrap_or(0.0)
    }
}

/// Parse a reference CSV. Each series is read independently: one that fails
/// is logged and left `Absent` while the others are kept.
pub fn read_reference(path: &Path) -> Result<ReferenceWorkbook> {
    let text = std::fs::read_to_string(path)?;
    let rows: Vec<Vec<String>> = text.lines().map(split_csv_line).collect();

    let markers = match parse_markers(&rows) {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, "Reference markers unreadable; phase starts unknown");
            BTreeMap::new()
        }
    };

    let series = |name: &str, col: usize, start_marker: &str| -> Reference {
        let start = match markers.get(start_marker) {
            Some(&s) => s,
            None => {
                warn!(series = name, marker = start_marker, "Phase start marker missing; series skipped");
                return Reference::Absent;
            }
        };
        match parse_series(&rows, name, col) {
            Ok(s) if s.is_empty() => {
                warn!(series = name, "Reference series has no samples; skipped");
                Reference::Absent
            }
            Ok(s) => {
                debug!(series = name, samples = s.len(), "Loaded reference series");
                Reference::Present(TimeSeries::new(
                    s.times.iter().map(|t| 60.0 * t + start).collect(),
                    s.values,
                ))
            }
            Err(e) => {
                warn!(error = %e, "Reference series skipped");
                Reference::Absent
            }
        }
    };

    Ok(ReferenceWorkbook {
        concentration: PhaseReferences {
            cells: series("concentration_cells", col_index("A"), CONCENTRATION_START),
            sensor: series("concentration_sensor", col_index("C"), CONCENTRATION_START),
        },
        washing: PhaseReferences {
            cells: series("washing_cells", col_index("G"), WASHING_START),
            sensor: series("washing_sensor", col_index("I"), WASHING_START),
        },
        markers,
    })
}

/// Zero-based index of a spreadsheet column letter.
fn col_index(letters: &str) -> usize {
    letters
        .bytes()
        .fold(0usize, |acc, b| acc * 26 + (b.to_ascii_uppercase() - b'A' + 1) as usize)
        - 1
}

fn cell(rows: &[Vec<String>], row: usize, col: usize) -> &str {
    rows.get(row)
        .and_then(|r| r.get(col))
        .map(|s| s.trim())
        .unwrap_or("")
}

/// Read the two-column block starting at `col`. Rows with a missing cell are
/// dropped; a non-numeric cell fails the whole series.
fn parse_series(rows: &[Vec<String>], name: &str, col: usize) -> Result<TimeSeries> {
    if rows.len() < SERIES_HEADER_ROWS {
        return Err(ResonatorError::ReferenceData {
            series: name.into(),
            reason: "missing title and header rows".into(),
        });
    }
    let parse = |row: usize, text: &str| -> Result<f64> {
        text.parse::<f64>().map_err(|_| ResonatorError::ReferenceData {
            series: name.into(),
            reason: format!("row {}: '{text}' is not a number", row + 1),
        })
    };

    let mut times = Vec::new();
    let mut values = Vec::new();
    for row in SERIES_HEADER_ROWS..rows.len() {
        let (t, v) = (cell(rows, row, col), cell(rows, row, col + 1));
        if t.is_empty() || v.is_empty() {
            continue;
        }
        times.push(parse(row, t)?);
        values.push(parse(row, v)?);
    }
    Ok(TimeSeries::new(times, values))
}

/// Named markers from M:N. The first row is a header; rows whose value is
/// not `mm:ss` text are ignored.
fn parse_markers(rows: &[Vec<String>]) -> Result<BTreeMap<String, f64>> {
    let (name_col, value_col) = (col_index("M"), col_index("N"));
    let mut markers = BTreeMap::new();
    for row in 1..rows.len() {
        let name = cell(rows, row, name_col);
        let mut value = cell(rows, row, value_col);
        if name.is_empty() {
            continue;
        }
        if value == START_OF_VIDEO {
            value = "0:0";
        }
        if !value.contains(':') {
            continue;
        }
        markers.insert(name.to_string(), parse_minutes_seconds(value)?);
    }
    Ok(markers)
}

/// `mm:ss` to seconds. Both parts may be fractional.
pub fn parse_minutes_seconds(text: &str) -> Result<f64> {
    let bad = || ResonatorError::ReferenceData {
        series: "reference_data".into(),
        reason: format!("'{text}' is not mm:ss"),
    };
    let (m, s) = text.split_once(':').ok_or_else(bad)?;
    let minutes: f64 = m.trim().parse().map_err(|_| bad())?;
    let seconds: f64 = s.trim().parse().map_err(|_| bad())?;
    Ok(minutes * 60.0 + seconds)
}

/// Split one CSV record, honouring double-quoted fields.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}
