//! Weighted empirical-risk solvers
//!
//! All scenario losses reduce to two coordinate-descent families over the
//! kernel expansion f(x) = sum_i beta_i K(x_i, x) without an offset term:
//! box-constrained dual ascent for the nonsmooth losses (hinge, pinball)
//! and diagonally shifted Gauss-Seidel for the quadratic ones (least
//! squares, asymmetric least squares). Dropping the offset removes the
//! equality constraint from the dual, so plain per-coordinate updates
//! suffice.

pub mod cd;

pub use self::cd::{solve, KernelSource};

use crate::core::{Result, SvmError};
use crate::scenario::TaskSpec;

/// Stopping and resource parameters shared by all solver runs.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Tolerance on the largest projected gradient per sweep.
    pub epsilon: f64,
    /// Maximum number of full coordinate sweeps.
    pub max_sweeps: usize,
    /// Memory budget for kernel storage per fit.
    pub cache_bytes: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-3,
            max_sweeps: 1000,
            cache_bytes: 100_000_000, // 100MB
        }
    }
}

/// The loss being minimized, with its per-sample weighting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Objective {
    /// Squared loss on real labels.
    LeastSquares,
    /// Asymmetric squared loss at level tau.
    Expectile { tau: f64 },
    /// Hinge loss on ±1 labels with per-class weights.
    Hinge { pos_weight: f64, neg_weight: f64 },
    /// Pinball loss at level tau on real labels.
    Quantile { tau: f64 },
}

impl Objective {
    /// The objective a task trains under.
    pub fn for_task(task: &TaskSpec) -> Objective {
        match task {
            TaskSpec::Regression => Objective::LeastSquares,
            TaskSpec::QuantileLevel { tau } => Objective::Quantile { tau: *tau },
            TaskSpec::ExpectileLevel { tau } => Objective::Expectile { tau: *tau },
            TaskSpec::OneVersusAll { hinge, .. } | TaskSpec::AllVersusAll { hinge, .. } => {
                if *hinge {
                    Objective::Hinge {
                        pos_weight: 1.0,
                        neg_weight: 1.0,
                    }
                } else {
                    Objective::LeastSquares
                }
            }
            TaskSpec::WeightedBinary { rho } => Objective::Hinge {
                // rho weights the positive class, 1 - rho the negative one;
                // the factor 2 keeps the unweighted case at weight 1.
                pos_weight: 2.0 * rho,
                neg_weight: 2.0 * (1.0 - rho),
            },
        }
    }

    /// Loss value at one sample.
    pub fn loss(&self, label: f64, prediction: f64) -> f64 {
        match self {
            Objective::LeastSquares => {
                let r = label - prediction;
                r * r
            }
            Objective::Expectile { tau } => {
                let r = label - prediction;
                let chi = if r > 0.0 { *tau } else { 1.0 - tau };
                chi * r * r
            }
            Objective::Hinge {
                pos_weight,
                neg_weight,
            } => {
                let w = if label > 0.0 { *pos_weight } else { *neg_weight };
                w * (1.0 - label * prediction).max(0.0)
            }
            Objective::Quantile { tau } => {
                let r = label - prediction;
                if r > 0.0 {
                    tau * r
                } else {
                    (tau - 1.0) * r
                }
            }
        }
    }

    /// Mean loss over a validation slice, the selector's criterion.
    pub fn mean_loss(&self, labels: &[f64], predictions: &[f64]) -> Result<f64> {
        if labels.is_empty() {
            return Err(SvmError::InvalidInput(
                "empty validation slice".to_string(),
            ));
        }
        let total: f64 = labels
            .iter()
            .zip(predictions.iter())
            .map(|(&y, &p)| self.classification_aware_loss(y, p))
            .sum();
        Ok(total / labels.len() as f64)
    }

    /// For classification objectives the validation criterion is the
    /// (weighted) misclassification rate rather than the hinge surrogate.
    fn classification_aware_loss(&self, label: f64, prediction: f64) -> f64 {
        match self {
            Objective::Hinge {
                pos_weight,
                neg_weight,
            } => {
                let w = if label > 0.0 { *pos_weight } else { *neg_weight };
                if label * prediction <= 0.0 {
                    w
                } else {
                    0.0
                }
            }
            _ => self.loss(label, prediction),
        }
    }
}

/// Result of one candidate fit.
#[derive(Debug, Clone)]
pub struct FitOutcome {
    /// Expansion coefficients, one per training row of the fit.
    pub coefficients: Vec<f64>,
    /// Coordinate sweeps performed.
    pub sweeps: usize,
    /// Whether the stopping tolerance was reached within the sweep budget.
    pub converged: bool,
    /// Final primal objective value.
    pub objective: f64,
}

impl FitOutcome {
    /// Indices of rows with nonzero coefficients.
    pub fn support_indices(&self) -> Vec<usize> {
        self.coefficients
            .iter()
            .enumerate()
            .filter(|(_, &b)| b.abs() > 1e-12)
            .map(|(i, _)| i)
            .collect()
    }
}
