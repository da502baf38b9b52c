//! Kernel trait definition

/// Kernel function over dense feature rows
///
/// A kernel function K(x, y) must satisfy Mercer's condition to be valid
/// for SVM training. Radial kernels additionally expose their value as a
/// function of the squared Euclidean distance, which lets the training
/// engine reuse one distance matrix per cell across the whole gamma grid.
pub trait Kernel: Send + Sync {
    /// Compute kernel value K(x, y).
    fn compute(&self, x: &[f64], y: &[f64]) -> f64;

    /// Kernel value as a function of squared distance, for radial kernels.
    /// Non-radial kernels return `None`.
    fn radial_value(&self, squared_distance: f64) -> Option<f64> {
        let _ = squared_distance;
        None
    }
}
