//! Coordinate descent over the kernel expansion
//!
//! One routine serves both solver families. Nonsmooth losses run dual
//! ascent on `max b'y - 0.5 b'Kb` under per-coordinate box constraints
//! (hinge: [0, C] signed by the label; pinball: [-(1-tau)C, tau*C] with
//! C = w/(2*lambda*n)). Quadratic losses run Gauss-Seidel on the shifted
//! system `(K + D)b = y` with `D_jj = n*lambda/chi_j`, where chi is 1 for
//! least squares and the asymmetry weight for expectiles, refreshed from
//! the current residual sign each sweep.
//!
//! Kernel rows come from either a precomputed dense Gram matrix or an
//! LRU-cached lazy source when the cell is too large for one.

use crate::cache::RowCache;
use crate::core::{Result, SvmError};
use crate::kernel::Kernel;
use crate::solver::{FitOutcome, Objective, SolverConfig};

const TINY: f64 = 1e-12;

/// Where kernel rows come from during a fit.
pub enum KernelSource<'a> {
    /// Dense row-major `n * n` Gram matrix.
    Dense { gram: &'a [f64], n: usize },
    /// Rows computed on demand and cached under a memory budget.
    Lazy {
        kernel: &'a dyn Kernel,
        rows: Vec<&'a [f64]>,
        cache: RowCache,
    },
}

impl<'a> KernelSource<'a> {
    /// Wrap a precomputed Gram matrix.
    pub fn dense(gram: &'a [f64], n: usize) -> Self {
        debug_assert_eq!(gram.len(), n * n);
        KernelSource::Dense { gram, n }
    }

    /// Compute rows on demand for `rows`, caching within `cache_bytes`.
    pub fn lazy(kernel: &'a dyn Kernel, rows: Vec<&'a [f64]>, cache_bytes: usize) -> Self {
        let cache = RowCache::with_memory_limit(cache_bytes, rows.len());
        KernelSource::Lazy {
            kernel,
            rows,
            cache,
        }
    }

    /// Number of training rows.
    pub fn len(&self) -> usize {
        match self {
            KernelSource::Dense { n, .. } => *n,
            KernelSource::Lazy { rows, .. } => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Kernel row `j` against all training rows.
    pub fn row(&mut self, j: usize) -> &[f64] {
        match self {
            KernelSource::Dense { gram, n } => &gram[j * *n..(j + 1) * *n],
            KernelSource::Lazy {
                kernel,
                rows,
                cache,
            } => {
                let x = rows[j];
                let all: &[&[f64]] = rows;
                cache.row(j, || all.iter().map(|y| kernel.compute(x, y)).collect())
            }
        }
    }

    /// Diagonal entry K(j, j).
    pub fn diag(&mut self, j: usize) -> f64 {
        match self {
            KernelSource::Dense { gram, n } => gram[j * *n + j],
            KernelSource::Lazy { kernel, rows, .. } => kernel.compute(rows[j], rows[j]),
        }
    }
}

/// Solve one weighted empirical-risk problem.
///
/// `labels` are the task's working labels (±1 for classification). The
/// returned coefficients are the kernel expansion weights over the same
/// rows. A warm start is clipped into the feasible box of the new
/// problem before the first sweep.
pub fn solve(
    source: &mut KernelSource,
    labels: &[f64],
    objective: Objective,
    lambda: f64,
    config: &SolverConfig,
    warm: Option<&[f64]>,
) -> Result<FitOutcome> {
    let n = labels.len();
    if n == 0 || source.is_empty() {
        return Err(SvmError::InvalidInput("no training rows".to_string()));
    }
    if n != source.len() {
        return Err(SvmError::InvalidInput(format!(
            "label count {} does not match kernel size {}",
            n,
            source.len()
        )));
    }
    if !(lambda > 0.0) {
        return Err(SvmError::InvalidParameter(format!(
            "regularization must be positive, got {lambda}"
        )));
    }

    match objective {
        Objective::Hinge { .. } | Objective::Quantile { .. } => {
            solve_box(source, labels, objective, lambda, config, warm)
        }
        Objective::LeastSquares | Objective::Expectile { .. } => {
            solve_shifted(source, labels, objective, lambda, config, warm)
        }
    }
}

/// Per-coordinate feasible box of the dual.
fn coordinate_box(objective: Objective, label: f64, lambda: f64, n: usize) -> (f64, f64) {
    match objective {
        Objective::Hinge {
            pos_weight,
            neg_weight,
        } => {
            let w = if label > 0.0 { pos_weight } else { neg_weight };
            let c = w / (2.0 * lambda * n as f64);
            if label > 0.0 {
                (0.0, c)
            } else {
                (-c, 0.0)
            }
        }
        Objective::Quantile { tau } => {
            let c = 1.0 / (2.0 * lambda * n as f64);
            (-(1.0 - tau) * c, tau * c)
        }
        _ => unreachable!("box solver only handles hinge and pinball"),
    }
}

fn solve_box(
    source: &mut KernelSource,
    labels: &[f64],
    objective: Objective,
    lambda: f64,
    config: &SolverConfig,
    warm: Option<&[f64]>,
) -> Result<FitOutcome> {
    let n = labels.len();
    let boxes: Vec<(f64, f64)> = labels
        .iter()
        .map(|&y| coordinate_box(objective, y, lambda, n))
        .collect();

    let mut beta = match warm {
        Some(prev) if prev.len() == n => prev
            .iter()
            .zip(boxes.iter())
            .map(|(&b, &(lo, hi))| b.clamp(lo, hi))
            .collect(),
        _ => vec![0.0; n],
    };
    let mut f = predictions(source, &beta);

    let scale = labels.iter().fold(1.0f64, |m, &y| m.max(y.abs()));
    let tol = config.epsilon * scale;

    let mut sweeps = 0;
    let mut converged = false;
    while sweeps < config.max_sweeps {
        sweeps += 1;
        let mut max_violation = 0.0f64;
        for j in 0..n {
            let kjj = source.diag(j);
            if kjj < TINY {
                continue;
            }
            let (lo, hi) = boxes[j];
            let g = labels[j] - f[j];
            let blocked_low = beta[j] <= lo + TINY && g < 0.0;
            let blocked_high = beta[j] >= hi - TINY && g > 0.0;
            if blocked_low || blocked_high {
                continue;
            }
            max_violation = max_violation.max(g.abs());
            let updated = (beta[j] + g / kjj).clamp(lo, hi);
            let delta = updated - beta[j];
            if delta.abs() > TINY {
                beta[j] = updated;
                let row = source.row(j);
                for (fi, &kij) in f.iter_mut().zip(row.iter()) {
                    *fi += delta * kij;
                }
            }
        }
        if max_violation < tol {
            converged = true;
            break;
        }
    }

    let objective_value = primal_objective(&beta, &f, labels, objective, lambda);
    Ok(FitOutcome {
        coefficients: beta,
        sweeps,
        converged,
        objective: objective_value,
    })
}

fn solve_shifted(
    source: &mut KernelSource,
    labels: &[f64],
    objective: Objective,
    lambda: f64,
    config: &SolverConfig,
    warm: Option<&[f64]>,
) -> Result<FitOutcome> {
    let n = labels.len();
    let mut beta = match warm {
        Some(prev) if prev.len() == n => prev.to_vec(),
        _ => vec![0.0; n],
    };
    let mut f = predictions(source, &beta);

    let scale = labels.iter().fold(1.0f64, |m, &y| m.max(y.abs()));
    let tol = config.epsilon * scale;
    let shift_base = n as f64 * lambda;

    let mut sweeps = 0;
    let mut converged = false;
    while sweeps < config.max_sweeps {
        sweeps += 1;
        let mut max_residual = 0.0f64;
        for j in 0..n {
            let kjj = source.diag(j);
            let chi = match objective {
                Objective::Expectile { tau } => {
                    if labels[j] - f[j] > 0.0 {
                        tau
                    } else {
                        1.0 - tau
                    }
                }
                _ => 1.0,
            };
            let shift = shift_base / chi;
            let g = labels[j] - f[j] - shift * beta[j];
            max_residual = max_residual.max(g.abs());
            let delta = g / (kjj + shift);
            if delta.abs() > TINY {
                beta[j] += delta;
                let row = source.row(j);
                for (fi, &kij) in f.iter_mut().zip(row.iter()) {
                    *fi += delta * kij;
                }
            }
        }
        if max_residual < tol {
            converged = true;
            break;
        }
    }

    let objective_value = primal_objective(&beta, &f, labels, objective, lambda);
    Ok(FitOutcome {
        coefficients: beta,
        sweeps,
        converged,
        objective: objective_value,
    })
}

/// Training-set predictions f = K * beta, built from kernel rows so the
/// lazy source works too.
fn predictions(source: &mut KernelSource, beta: &[f64]) -> Vec<f64> {
    let n = beta.len();
    let mut f = vec![0.0; n];
    for (j, &bj) in beta.iter().enumerate() {
        if bj.abs() > TINY {
            let row = source.row(j);
            for (fi, &kij) in f.iter_mut().zip(row.iter()) {
                *fi += bj * kij;
            }
        }
    }
    f
}

/// Primal value lambda * ||f||^2 + mean loss; ||f||^2 = b'Kb = b'f.
fn primal_objective(
    beta: &[f64],
    f: &[f64],
    labels: &[f64],
    objective: Objective,
    lambda: f64,
) -> f64 {
    let norm_sq: f64 = beta.iter().zip(f.iter()).map(|(&b, &fi)| b * fi).sum();
    let risk: f64 = labels
        .iter()
        .zip(f.iter())
        .map(|(&y, &fi)| objective.loss(y, fi))
        .sum::<f64>()
        / labels.len() as f64;
    lambda * norm_sq + risk
}
