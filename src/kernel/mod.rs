//! Kernel functions and Gram matrix construction
//!
//! The `KERNEL` configuration code selects the kernel family; the gamma
//! axis of the hyperparameter grid parametrizes the radial families. For
//! radial kernels the per-cell squared-distance matrix is computed once
//! and shared across every gamma on the grid.

pub mod laplace;
pub mod linear;
pub mod rbf;
pub mod traits;

pub use self::laplace::LaplacianKernel;
pub use self::linear::LinearKernel;
pub use self::rbf::GaussRbfKernel;
pub use self::traits::Kernel;

use std::sync::Arc;

use crate::core::{squared_distance, Result, SvmError};

/// Kernel family selected by the `KERNEL` configuration code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelKind {
    GaussRbf,
    Laplacian,
    Linear,
}

impl KernelKind {
    /// Map the external kernel code to a kernel family.
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(KernelKind::GaussRbf),
            1 => Ok(KernelKind::Laplacian),
            2 => Ok(KernelKind::Linear),
            other => Err(SvmError::InvalidParameter(format!(
                "unknown kernel code {other}"
            ))),
        }
    }

    /// Whether the family is parametrized by gamma.
    pub fn is_radial(&self) -> bool {
        !matches!(self, KernelKind::Linear)
    }

    /// Instantiate a kernel of this family at one gamma grid value.
    pub fn build(&self, gamma: f64) -> Arc<dyn Kernel> {
        match self {
            KernelKind::GaussRbf => Arc::new(GaussRbfKernel::new(gamma)),
            KernelKind::Laplacian => Arc::new(LaplacianKernel::new(gamma)),
            KernelKind::Linear => Arc::new(LinearKernel::new()),
        }
    }
}

/// Symmetric squared-distance matrix of a set of rows, row-major `n * n`.
pub fn squared_distance_matrix(rows: &[&[f64]]) -> Vec<f64> {
    let n = rows.len();
    let mut out = vec![0.0; n * n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d2 = squared_distance(rows[i], rows[j]);
            out[i * n + j] = d2;
            out[j * n + i] = d2;
        }
    }
    out
}

/// Dense Gram matrix of a set of rows for one kernel, row-major `n * n`.
///
/// Radial kernels may pass the precomputed squared-distance matrix to
/// avoid recomputing it per gamma.
pub fn gram_matrix(kernel: &dyn Kernel, rows: &[&[f64]], distances: Option<&[f64]>) -> Vec<f64> {
    let n = rows.len();
    if let Some(d2) = distances {
        if kernel.radial_value(0.0).is_some() {
            return d2
                .iter()
                .map(|&d| kernel.radial_value(d).expect("radial kernel"))
                .collect();
        }
    }
    let mut out = vec![0.0; n * n];
    for i in 0..n {
        out[i * n + i] = kernel.compute(rows[i], rows[i]);
        for j in (i + 1)..n {
            let v = kernel.compute(rows[i], rows[j]);
            out[i * n + j] = v;
            out[j * n + i] = v;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_kernel_codes() {
        assert_eq!(KernelKind::from_code(0).unwrap(), KernelKind::GaussRbf);
        assert_eq!(KernelKind::from_code(1).unwrap(), KernelKind::Laplacian);
        assert_eq!(KernelKind::from_code(2).unwrap(), KernelKind::Linear);
        assert!(KernelKind::from_code(7).is_err());
        assert!(KernelKind::GaussRbf.is_radial());
        assert!(!KernelKind::Linear.is_radial());
    }

    #[test]
    fn test_distance_matrix_symmetry() {
        let a = [0.0, 0.0];
        let b = [3.0, 4.0];
        let rows: Vec<&[f64]> = vec![&a, &b];
        let d2 = squared_distance_matrix(&rows);
        assert_eq!(d2, vec![0.0, 25.0, 25.0, 0.0]);
    }

    #[test]
    fn test_gram_from_distances_matches_direct() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        let c = [2.0, 2.0];
        let rows: Vec<&[f64]> = vec![&a, &b, &c];
        let kernel = KernelKind::GaussRbf.build(0.3);

        let d2 = squared_distance_matrix(&rows);
        let fast = gram_matrix(kernel.as_ref(), &rows, Some(&d2));
        let direct = gram_matrix(kernel.as_ref(), &rows, None);
        for (x, y) in fast.iter().zip(direct.iter()) {
            assert_relative_eq!(x, y, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_linear_gram_ignores_distances() {
        let a = [1.0, 2.0];
        let b = [3.0, 4.0];
        let rows: Vec<&[f64]> = vec![&a, &b];
        let d2 = squared_distance_matrix(&rows);
        let kernel = KernelKind::Linear.build(1.0);
        let gram = gram_matrix(kernel.as_ref(), &rows, Some(&d2));
        assert_eq!(gram, vec![5.0, 11.0, 11.0, 25.0]);
    }
}
