//! CSV loading into dense matrices
//!
//! The last column is the label, all other columns are features. A
//! header row is detected automatically (non-numeric fields), and lines
//! starting with `#` are skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::core::{DataMatrix, Result, SvmError};

/// Load a labeled dense matrix from a CSV file.
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<DataMatrix> {
    let file = File::open(path).map_err(SvmError::IoError)?;
    read_csv(BufReader::new(file))
}

/// Load a labeled dense matrix from any reader.
pub fn read_csv<R: BufRead>(reader: R) -> Result<DataMatrix> {
    let mut rows: Vec<Vec<f64>> = Vec::new();
    let mut labels: Vec<f64> = Vec::new();
    let mut first_data_line = true;

    for (lineno, line) in reader.lines().enumerate() {
        let line = line.map_err(SvmError::IoError)?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if first_data_line && is_header_line(line) {
            first_data_line = false;
            continue;
        }
        first_data_line = false;

        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() < 2 {
            return Err(SvmError::ParseError(format!(
                "line {}: need at least one feature and a label",
                lineno + 1
            )));
        }
        let mut values = Vec::with_capacity(fields.len() - 1);
        for field in &fields[..fields.len() - 1] {
            values.push(parse_field(field, lineno)?);
        }
        labels.push(parse_field(fields[fields.len() - 1], lineno)?);
        rows.push(values);
    }

    if rows.is_empty() {
        return Err(SvmError::InvalidInput("empty dataset".to_string()));
    }
    DataMatrix::from_rows(&rows, labels)
}

fn parse_field(field: &str, lineno: usize) -> Result<f64> {
    field.trim().parse().map_err(|_| {
        SvmError::ParseError(format!(
            "line {}: invalid number '{}'",
            lineno + 1,
            field.trim()
        ))
    })
}

/// A line is a header when most of its feature fields fail to parse as
/// numbers.
fn is_header_line(line: &str) -> bool {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() < 2 {
        return false;
    }
    let non_numeric = fields
        .iter()
        .take(fields.len() - 1)
        .filter(|f| f.trim().parse::<f64>().is_err())
        .count();
    non_numeric * 2 > fields.len() - 1
}
