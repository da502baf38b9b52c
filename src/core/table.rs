//! Result tables and their flat wire encoding
//!
//! Every train/select/test call returns its results as a rectangular table
//! of `f64` values. At the external boundary the table travels as a single
//! flat buffer: element 0 is the row count, element 1 the column count, and
//! the remaining `rows * cols` elements are the row-major payload.

use crate::core::{Result, SvmError};

/// A rectangular table of `f64` results.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultTable {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl ResultTable {
    /// Create an empty table with a fixed column count.
    ///
    /// Empty tables still carry their header at the wire boundary, so a
    /// test call without labels returns a 0-row errors table rather than
    /// nothing at all.
    pub fn empty(cols: usize) -> Self {
        Self {
            rows: 0,
            cols,
            data: Vec::new(),
        }
    }

    /// Create a table from row-major data.
    pub fn from_data(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(SvmError::ProtocolError(format!(
                "payload length {} does not match {}x{} table",
                data.len(),
                rows,
                cols
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Append one row.
    ///
    /// # Panics
    /// Panics if the row width does not match the table's column count.
    pub fn push_row(&mut self, row: &[f64]) {
        assert_eq!(
            row.len(),
            self.cols,
            "row width must match table column count"
        );
        self.data.extend_from_slice(row);
        self.rows += 1;
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Whether the table holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// One row as a slice.
    ///
    /// # Panics
    /// Panics if `i >= rows()`.
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Value at (row, col).
    ///
    /// # Panics
    /// Panics if out of range.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    /// One column as an owned vector.
    pub fn column(&self, col: usize) -> Vec<f64> {
        (0..self.rows).map(|r| self.get(r, col)).collect()
    }

    /// Row-major payload without the header.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Encode into the flat wire buffer: `[rows, cols, payload...]`.
    pub fn to_raw(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(2 + self.data.len());
        out.push(self.rows as f64);
        out.push(self.cols as f64);
        out.extend_from_slice(&self.data);
        out
    }

    /// Decode a flat wire buffer.
    ///
    /// The declared `rows * cols` must match the payload length exactly; a
    /// mismatch is treated as corruption, not truncated.
    pub fn from_raw(raw: &[f64]) -> Result<Self> {
        if raw.len() < 2 {
            return Err(SvmError::ProtocolError(
                "buffer too short for table header".to_string(),
            ));
        }
        let rows = raw[0];
        let cols = raw[1];
        if rows < 0.0 || cols < 0.0 || rows.fract() != 0.0 || cols.fract() != 0.0 {
            return Err(SvmError::ProtocolError(format!(
                "invalid table header ({rows}, {cols})"
            )));
        }
        let rows = rows as usize;
        let cols = cols as usize;
        if raw.len() != 2 + rows * cols {
            return Err(SvmError::ProtocolError(format!(
                "buffer length {} does not match {}x{} table",
                raw.len(),
                rows,
                cols
            )));
        }
        Ok(Self {
            rows,
            cols,
            data: raw[2..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_three_by_two() {
        let raw = [3.0, 2.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let table = ResultTable::from_raw(&raw).unwrap();
        assert_eq!(table.rows(), 3);
        assert_eq!(table.cols(), 2);
        assert_eq!(table.row(0), &[1.0, 2.0]);
        assert_eq!(table.row(1), &[3.0, 4.0]);
        assert_eq!(table.row(2), &[5.0, 6.0]);
    }

    #[test]
    fn test_length_mismatch_is_corruption() {
        let raw = [3.0, 2.0, 1.0, 2.0, 3.0];
        assert!(matches!(
            ResultTable::from_raw(&raw),
            Err(SvmError::ProtocolError(_))
        ));

        let too_long = [1.0, 1.0, 1.0, 2.0];
        assert!(ResultTable::from_raw(&too_long).is_err());
    }

    #[test]
    fn test_invalid_header() {
        assert!(ResultTable::from_raw(&[1.0]).is_err());
        assert!(ResultTable::from_raw(&[-1.0, 2.0]).is_err());
        assert!(ResultTable::from_raw(&[1.5, 2.0, 0.0, 0.0, 0.0]).is_err());
    }

    #[test]
    fn test_roundtrip() {
        let mut table = ResultTable::empty(3);
        table.push_row(&[1.0, 2.0, 3.0]);
        table.push_row(&[4.0, 5.0, 6.0]);

        let raw = table.to_raw();
        assert_eq!(raw.len(), 2 + 2 * 3);
        assert_eq!(ResultTable::from_raw(&raw).unwrap(), table);
    }

    #[test]
    fn test_empty_table_keeps_header() {
        let table = ResultTable::empty(4);
        let raw = table.to_raw();
        assert_eq!(raw, vec![0.0, 4.0]);
        let back = ResultTable::from_raw(&raw).unwrap();
        assert!(back.is_empty());
        assert_eq!(back.cols(), 4);
    }

    #[test]
    fn test_column_access() {
        let table = ResultTable::from_data(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(table.column(1), vec![2.0, 4.0]);
    }
}
