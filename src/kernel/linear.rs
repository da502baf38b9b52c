//! Linear kernel implementation

use crate::core::dot;
use crate::kernel::Kernel;

/// Linear kernel: K(x, y) = x · y
///
/// The gamma grid parameter has no effect on this kernel, so the training
/// engine collapses the gamma axis to a single point when it is selected.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearKernel;

impl LinearKernel {
    pub fn new() -> Self {
        Self
    }
}

impl Kernel for LinearKernel {
    fn compute(&self, x: &[f64], y: &[f64]) -> f64 {
        dot(x, y)
    }
}
