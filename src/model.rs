//! Trained model representations
//!
//! A candidate is one fit for a (task, cell, grid point) triple together
//! with its validation diagnostics. The selector promotes one candidate
//! per (task, cell) to a selected model. Fits store global row indices
//! into the session's training matrix rather than copies of the rows.

use std::sync::Arc;

use crate::core::DataMatrix;
use crate::kernel::{Kernel, KernelKind};

/// The support-vector expansion of one fit.
#[derive(Debug, Clone)]
pub struct Fit {
    kernel_kind: KernelKind,
    gamma: f64,
    /// Global training-row indices with nonzero coefficients.
    support_rows: Vec<usize>,
    coefficients: Vec<f64>,
}

impl Fit {
    pub fn new(
        kernel_kind: KernelKind,
        gamma: f64,
        support_rows: Vec<usize>,
        coefficients: Vec<f64>,
    ) -> Self {
        debug_assert_eq!(support_rows.len(), coefficients.len());
        Self {
            kernel_kind,
            gamma,
            support_rows,
            coefficients,
        }
    }

    /// Instantiate the kernel this fit was trained under.
    pub fn kernel(&self) -> Arc<dyn Kernel> {
        self.kernel_kind.build(self.gamma)
    }

    pub fn support_rows(&self) -> &[usize] {
        &self.support_rows
    }

    pub fn n_support_vectors(&self) -> usize {
        self.support_rows.len()
    }

    /// Decision value at a point, evaluating the kernel against the
    /// training matrix the fit was built from.
    pub fn decision(&self, train: &DataMatrix, kernel: &dyn Kernel, x: &[f64]) -> f64 {
        self.support_rows
            .iter()
            .zip(self.coefficients.iter())
            .map(|(&row, &beta)| beta * kernel.compute(train.row(row), x))
            .sum()
    }
}

/// One trained candidate with its diagnostics.
#[derive(Debug, Clone)]
pub struct CandidateModel {
    /// Flat index of the grid point, the selector's tie-break order.
    pub grid_index: usize,
    pub gamma_index: usize,
    pub lambda_index: usize,
    pub gamma: f64,
    pub lambda: f64,
    /// `None` when the solver failed for this candidate; the failure is
    /// recorded in the diagnostics row instead of aborting the pass.
    pub fit: Option<Fit>,
    /// Mean validation loss; infinite for failed candidates so they never
    /// win selection.
    pub val_error: f64,
    /// Validation error on positive-class rows (classification tasks).
    pub val_pos_error: f64,
    /// Validation error on negative-class rows (classification tasks).
    pub val_neg_error: f64,
    pub sweeps: usize,
    pub converged: bool,
    pub objective: f64,
}

impl CandidateModel {
    /// Placeholder for a candidate whose solver run failed.
    pub fn failed(grid_index: usize, gamma_index: usize, lambda_index: usize, gamma: f64, lambda: f64) -> Self {
        Self {
            grid_index,
            gamma_index,
            lambda_index,
            gamma,
            lambda,
            fit: None,
            val_error: f64::INFINITY,
            val_pos_error: f64::INFINITY,
            val_neg_error: f64::INFINITY,
            sweeps: 0,
            converged: false,
            objective: f64::NAN,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.fit.is_none()
    }

    pub fn n_support_vectors(&self) -> usize {
        self.fit.as_ref().map_or(0, Fit::n_support_vectors)
    }
}

/// The per-cell winner of a select pass.
#[derive(Debug, Clone)]
pub struct SelectedModel {
    /// Index of the trained task the winner came from.
    pub task: usize,
    pub cell: usize,
    pub grid_index: usize,
    pub gamma: f64,
    pub lambda: f64,
    pub val_error: f64,
    pub fit: Fit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_decision_uses_support_rows() {
        let train = DataMatrix::new(
            vec![0.0, 1.0, 2.0, 3.0],
            4,
            1,
            vec![0.0; 4],
        )
        .unwrap();
        let fit = Fit::new(KernelKind::Linear, 1.0, vec![1, 3], vec![2.0, -1.0]);
        let kernel = fit.kernel();
        // f(x) = 2 * (1 * x) - 1 * (3 * x) = -x
        assert_relative_eq!(fit.decision(&train, kernel.as_ref(), &[5.0]), -5.0);
        assert_eq!(fit.n_support_vectors(), 2);
    }

    #[test]
    fn test_failed_candidate_never_wins() {
        let failed = CandidateModel::failed(3, 0, 3, 1.0, 0.1);
        assert!(failed.is_failed());
        assert!(failed.val_error.is_infinite());
        assert_eq!(failed.n_support_vectors(), 0);
    }
}
