//! Gauss RBF kernel implementation
//!
//! The Gaussian radial basis function kernel K(x, y) = exp(-γ * ||x - y||²)
//! where γ (gamma) is the bandwidth hyperparameter iterated by the grid.

use crate::core::squared_distance;
use crate::kernel::Kernel;

/// Gauss RBF kernel: K(x, y) = exp(-γ * ||x - y||²)
///
/// The gamma parameter controls the reach of each training example:
/// high gamma fits locally (risking overfit), low gamma smooths broadly.
#[derive(Debug, Clone, Copy)]
pub struct GaussRbfKernel {
    gamma: f64,
}

impl GaussRbfKernel {
    /// Create a Gauss RBF kernel with the given gamma.
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

impl Kernel for GaussRbfKernel {
    fn compute(&self, x: &[f64], y: &[f64]) -> f64 {
        (-self.gamma * squared_distance(x, y)).exp()
    }

    fn radial_value(&self, squared_distance: f64) -> Option<f64> {
        Some((-self.gamma * squared_distance.max(0.0)).exp())
    }
}
