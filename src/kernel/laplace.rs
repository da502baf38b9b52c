//! Laplacian kernel implementation
//!
//! K(x, y) = exp(-γ * ||x - y||). Heavier tails than the Gauss RBF kernel,
//! which helps on data with sharp local structure.

use crate::core::squared_distance;
use crate::kernel::Kernel;

/// Laplacian kernel: K(x, y) = exp(-γ * ||x - y||)
#[derive(Debug, Clone, Copy)]
pub struct LaplacianKernel {
    gamma: f64,
}

impl LaplacianKernel {
    /// Create a Laplacian kernel with the given gamma.
    ///
    /// # Panics
    /// Panics if gamma is not positive.
    pub fn new(gamma: f64) -> Self {
        assert!(gamma > 0.0, "Gamma must be positive, got: {}", gamma);
        Self { gamma }
    }

    /// Get the gamma parameter.
    pub fn gamma(&self) -> f64 {
        self.gamma
    }
}

impl Kernel for LaplacianKernel {
    fn compute(&self, x: &[f64], y: &[f64]) -> f64 {
        (-self.gamma * squared_distance(x, y).sqrt()).exp()
    }

    fn radial_value(&self, squared_distance: f64) -> Option<f64> {
        Some((-self.gamma * squared_distance.max(0.0).sqrt()).exp())
    }
}
