//! Hyperparameter grid construction
//!
//! Training evaluates every point on a gamma x lambda grid: kernel
//! bandwidths on one axis, regularization strengths on the other, both
//! geometrically spaced. `GRID_CHOICE` selects a preset density/range;
//! explicitly set grid parameters always win over the preset.

use crate::config::{ConfigStore, ParamKey};
use crate::core::{Result, SvmError};
use crate::kernel::KernelKind;

/// One point on the hyperparameter grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPoint {
    pub gamma_index: usize,
    pub lambda_index: usize,
    pub gamma: f64,
    pub lambda: f64,
}

/// The full gamma x lambda grid for one training pass.
#[derive(Debug, Clone, PartialEq)]
pub struct HyperGrid {
    gammas: Vec<f64>,
    lambdas: Vec<f64>,
}

struct GridPreset {
    steps: usize,
    gamma_range: (f64, f64),
    lambda_range: (f64, f64),
}

fn preset(choice: i64) -> GridPreset {
    match choice {
        c if c < 0 => GridPreset {
            steps: 5,
            gamma_range: (0.01, 10.0),
            lambda_range: (1e-4, 1.0),
        },
        1 => GridPreset {
            steps: 15,
            gamma_range: (0.001, 100.0),
            lambda_range: (1e-5, 10.0),
        },
        2 => GridPreset {
            steps: 20,
            gamma_range: (1e-4, 1000.0),
            lambda_range: (1e-6, 100.0),
        },
        _ => GridPreset {
            steps: 10,
            gamma_range: (0.01, 10.0),
            lambda_range: (1e-4, 1.0),
        },
    }
}

impl HyperGrid {
    /// Build the grid from the effective configuration.
    ///
    /// Non-radial kernels collapse the gamma axis to a single point since
    /// gamma has no effect on them.
    pub fn from_config(config: &ConfigStore, kernel: KernelKind) -> Result<Self> {
        let preset = preset(config.grid_choice());

        let gamma_steps = if config.is_set(ParamKey::GammaSteps) {
            config.gamma_steps()
        } else {
            preset.steps
        };
        let lambda_steps = if config.is_set(ParamKey::LambdaSteps) {
            config.lambda_steps()
        } else {
            preset.steps
        };

        let gamma_range = (
            pick(config, ParamKey::MinGamma, preset.gamma_range.0),
            pick(config, ParamKey::MaxGamma, preset.gamma_range.1),
        );
        let lambda_range = (
            pick(config, ParamKey::MinLambda, preset.lambda_range.0),
            pick(config, ParamKey::MaxLambda, preset.lambda_range.1),
        );

        let gammas = if kernel.is_radial() {
            geometric(gamma_range, gamma_steps, "gamma")?
        } else {
            vec![1.0]
        };
        let lambdas = geometric(lambda_range, lambda_steps, "lambda")?;

        Ok(Self { gammas, lambdas })
    }

    /// Direct construction, mainly for tests and benches.
    pub fn new(gammas: Vec<f64>, lambdas: Vec<f64>) -> Self {
        Self { gammas, lambdas }
    }

    pub fn gammas(&self) -> &[f64] {
        &self.gammas
    }

    pub fn lambdas(&self) -> &[f64] {
        &self.lambdas
    }

    /// Total number of grid points.
    pub fn len(&self) -> usize {
        self.gammas.len() * self.lambdas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grid points in canonical order: gamma-major, lambda within.
    ///
    /// The flat position of a point in this order is its grid index, the
    /// tie-break order used by the selector.
    pub fn points(&self) -> impl Iterator<Item = GridPoint> + '_ {
        self.gammas.iter().enumerate().flat_map(move |(gi, &g)| {
            self.lambdas
                .iter()
                .enumerate()
                .map(move |(li, &l)| GridPoint {
                    gamma_index: gi,
                    lambda_index: li,
                    gamma: g,
                    lambda: l,
                })
        })
    }

    /// Flat grid index of a point.
    pub fn flat_index(&self, point: &GridPoint) -> usize {
        point.gamma_index * self.lambdas.len() + point.lambda_index
    }
}

fn pick(config: &ConfigStore, key: ParamKey, fallback: f64) -> f64 {
    if config.is_set(key) {
        match key {
            ParamKey::MinGamma => config.min_gamma(),
            ParamKey::MaxGamma => config.max_gamma(),
            ParamKey::MinLambda => config.min_lambda(),
            ParamKey::MaxLambda => config.max_lambda(),
            _ => fallback,
        }
    } else {
        fallback
    }
}

/// Geometric sequence from min to max inclusive.
fn geometric(range: (f64, f64), steps: usize, what: &str) -> Result<Vec<f64>> {
    let (min, max) = range;
    if steps == 0 {
        return Ok(Vec::new());
    }
    if min <= 0.0 || max < min {
        return Err(SvmError::InvalidParameter(format!(
            "invalid {what} range [{min}, {max}]"
        )));
    }
    if steps == 1 {
        return Ok(vec![min]);
    }
    let ratio = (max / min).powf(1.0 / (steps - 1) as f64);
    Ok((0..steps).map(|i| min * ratio.powi(i as i32)).collect())
}
