//! The sliced signal file: one row per reduced time bucket, one column per
//! spatial bin, comma-delimited.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use ndarray::{Array2, ArrayView2};

use crate::error::{ResonatorError, Result};

pub const SLICED_DELIMITER: char = ',';

/// Write `signal` to `path`. Values use the shortest representation that
/// parses back to the same `f64`.
pub fn write_sliced(path: &Path, signal: ArrayView2<f64>) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for row in signal.rows() {
        let mut first = true;
        for value in row {
            if !first {
                write!(out, "{SLICED_DELIMITER}")?;
            }
            write!(out, "{value}")?;
            first = false;
        }
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}

/// Read a file written by [`write_sliced`]. Every row must have the same
/// number of columns.
pub fn read_sliced(path: &Path) -> Result<Array2<f64>> {
    let reader = BufReader::new(File::open(path)?);
    let mut values = Vec::new();
    let mut cols: Option<usize> = None;
    let mut rows = 0usize;

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let start = values.len();
        for field in line.split(SLICED_DELIMITER) {
            let v = field.trim().parse::<f64>().map_err(|e| ResonatorError::SlicedFormat {
                line: line_no,
                reason: format!("'{}': {e}", field.trim()),
            })?;
            values.push(v);
        }
        let n = values.len() - start;
        match cols {
            None => cols = Some(n),
            Some(c) if c != n => {
                return Err(ResonatorError::SlicedFormat {
                    line: line_no,
                    reason: format!("expected {c} columns, found {n}"),
                })
            }
            Some(_) => {}
        }
        rows += 1;
    }

    let cols = cols.unwrap_or(0);
    Array2::from_shape_vec((rows, cols), values).map_err(|e| ResonatorError::SlicedFormat {
        line: rows,
        reason: e.to_string(),
    })
}
