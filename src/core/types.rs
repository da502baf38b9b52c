//! Core data types for the SVM engine

use crate::core::{Result, SvmError};

/// Dense row-major feature matrix with per-row labels.
///
/// This is the ingested form of a training or test set: `rows * cols`
/// feature values laid out row by row, plus one label per row. Labels may
/// be absent for prediction-only test sets.
#[derive(Clone, Debug)]
pub struct DataMatrix {
    values: Vec<f64>,
    rows: usize,
    cols: usize,
    labels: Option<Vec<f64>>,
}

impl DataMatrix {
    /// Create a labeled matrix, validating the buffer and label shapes.
    pub fn new(values: Vec<f64>, rows: usize, cols: usize, labels: Vec<f64>) -> Result<Self> {
        let matrix = Self::unlabeled(values, rows, cols)?;
        if labels.len() != rows {
            return Err(SvmError::InvalidInput(format!(
                "label count {} does not match row count {}",
                labels.len(),
                rows
            )));
        }
        Ok(Self {
            labels: Some(labels),
            ..matrix
        })
    }

    /// Create a matrix without labels (prediction-only data).
    pub fn unlabeled(values: Vec<f64>, rows: usize, cols: usize) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(SvmError::InvalidInput("empty data matrix".to_string()));
        }
        if values.len() != rows * cols {
            return Err(SvmError::InvalidInput(format!(
                "buffer length {} does not match {}x{} matrix",
                values.len(),
                rows,
                cols
            )));
        }
        Ok(Self {
            values,
            rows,
            cols,
            labels: None,
        })
    }

    /// Build a labeled matrix from per-row slices.
    pub fn from_rows(rows: &[Vec<f64>], labels: Vec<f64>) -> Result<Self> {
        if rows.is_empty() {
            return Err(SvmError::InvalidInput("empty data matrix".to_string()));
        }
        let cols = rows[0].len();
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(SvmError::InvalidInput(format!(
                    "row {} has {} columns, expected {}",
                    i,
                    row.len(),
                    cols
                )));
            }
        }
        let values = rows.iter().flatten().copied().collect();
        Self::new(values, rows.len(), cols, labels)
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// The row-major feature buffer.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of feature columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// One feature row as a slice.
    ///
    /// # Panics
    /// Panics if `i >= rows()`.
    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i * self.cols..(i + 1) * self.cols]
    }

    /// Label of row `i`, if labels are present.
    pub fn label(&self, i: usize) -> Option<f64> {
        self.labels.as_ref().map(|l| l[i])
    }

    /// All labels, if present.
    pub fn labels(&self) -> Option<&[f64]> {
        self.labels.as_deref()
    }

    /// Whether labels were supplied.
    pub fn is_labeled(&self) -> bool {
        self.labels.is_some()
    }

    /// Distinct label values in ascending order.
    ///
    /// Used by classification scenarios to enumerate classes. Returns an
    /// empty vector for unlabeled data.
    pub fn distinct_labels(&self) -> Vec<f64> {
        let mut out: Vec<f64> = match &self.labels {
            Some(labels) => labels.clone(),
            None => return Vec::new(),
        };
        out.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        out.dedup();
        out
    }
}

/// Squared Euclidean distance between two dense feature rows.
pub fn squared_distance(x: &[f64], y: &[f64]) -> f64 {
    x.iter()
        .zip(y.iter())
        .map(|(a, b)| {
            let d = a - b;
            d * d
        })
        .sum()
}

/// Dot product of two dense feature rows.
pub fn dot(x: &[f64], y: &[f64]) -> f64 {
    x.iter().zip(y.iter()).map(|(a, b)| a * b).sum()
}
