//! Training data partitioning
//!
//! Splits the training rows into cells so per-cell problems stay bounded
//! and independent fits can run in parallel. Whatever the strategy, three
//! invariants hold: every row lands in exactly one cell, no cell is empty,
//! and the same data under the same configuration yields the same
//! partition. Determinism is what makes a later select() reproducible
//! against an earlier train().

use crate::config::{PARTITION_CELLS, PARTITION_NONE};
use crate::core::{DataMatrix, Result, SvmError};

/// Partition-choice code for sequential chunking.
pub const PARTITION_CHUNKS: i64 = 1;

/// An ordered set of cells, each owning a disjoint subset of row indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    cells: Vec<Vec<usize>>,
}

impl Partition {
    /// Build the partition for a training set under a partition-choice
    /// code and target cell size.
    pub fn build(data: &DataMatrix, choice: i64, cell_size: usize) -> Result<Self> {
        let all: Vec<usize> = (0..data.rows()).collect();
        let cells = match choice {
            PARTITION_NONE => vec![all],
            PARTITION_CHUNKS => all.chunks(cell_size.max(1)).map(|c| c.to_vec()).collect(),
            PARTITION_CELLS => {
                let mut cells = Vec::new();
                bisect(data, all, cell_size.max(1), &mut cells);
                cells
            }
            other => {
                return Err(SvmError::InvalidParameter(format!(
                    "unknown partition choice {other}"
                )))
            }
        };
        Ok(Self { cells })
    }

    /// Number of cells.
    pub fn n_cells(&self) -> usize {
        self.cells.len()
    }

    /// Row indices of one cell.
    ///
    /// # Panics
    /// Panics if `i >= n_cells()`.
    pub fn cell(&self, i: usize) -> &[usize] {
        &self.cells[i]
    }

    /// Iterate over cells in order.
    pub fn iter(&self) -> impl Iterator<Item = &[usize]> {
        self.cells.iter().map(|c| c.as_slice())
    }
}

/// Recursive spatial bisection: split along the widest-spread feature at
/// the median until cells fit the target size. Ties in the split
/// coordinate are broken by row index, keeping the result deterministic.
fn bisect(data: &DataMatrix, mut rows: Vec<usize>, cell_size: usize, out: &mut Vec<Vec<usize>>) {
    if rows.len() <= cell_size {
        if !rows.is_empty() {
            out.push(rows);
        }
        return;
    }

    let dim = widest_dimension(data, &rows);
    rows.sort_by(|&a, &b| {
        let va = data.row(a)[dim];
        let vb = data.row(b)[dim];
        va.partial_cmp(&vb)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });

    let mid = rows.len() / 2;
    let right = rows.split_off(mid);
    bisect(data, rows, cell_size, out);
    bisect(data, right, cell_size, out);
}

fn widest_dimension(data: &DataMatrix, rows: &[usize]) -> usize {
    let mut best_dim = 0;
    let mut best_spread = f64::NEG_INFINITY;
    for dim in 0..data.cols() {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for &r in rows {
            let v = data.row(r)[dim];
            lo = lo.min(v);
            hi = hi.max(v);
        }
        let spread = hi - lo;
        if spread > best_spread {
            best_spread = spread;
            best_dim = dim;
        }
    }
    best_dim
}
