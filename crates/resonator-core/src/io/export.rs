//! Column-oriented CSV export where columns may differ in length.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Result;

/// A named column of numbers.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<f64>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// Write `columns` side by side with a header row. Shorter columns are
/// padded with empty cells.
pub fn write_columns(path: &Path, columns: &[Column]) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    let header: Vec<String> = columns.iter().map(|c| quote(&c.name)).collect();
    writeln!(out, "{}", header.join(","))?;

    let rows = columns.iter().map(|c| c.values.len()).max().unwrap_or(0);
    for row in 0..rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| c.values.get(row).map(|v| v.to_string()).unwrap_or_default())
            .collect();
        writeln!(out, "{}", cells.join(","))?;
    }
    out.flush()?;
    Ok(())
}

fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
