//! External interface of the engine
//!
//! Two layers live here. The handle-level functions mirror the boundary
//! a foreign binding would call: sessions as integer handles, stages as
//! codes, per-call configuration as argv token sequences, results as
//! tables that encode to flat buffers. On top of that, [`Svm`] is the
//! convenience layer for the built-in learning scenarios: one call
//! constructs a session, trains the candidate grid and runs the
//! scenario's select sweep.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use cellsvm::api::Svm;
//!
//! # fn main() -> cellsvm::Result<()> {
//! let features = vec![0.0, 0.1, 0.2, 0.3, 0.4, 0.5];
//! let labels = vec![1.0, 1.2, 1.4, 1.6, 1.8, 2.0];
//! let svm = Svm::least_squares(&features, 6, 1, &labels, &[("DISPLAY", "1")])?;
//! let predictions = svm.predict(&[0.25], 1, 1)?;
//! println!("f(0.25) = {}", predictions.get(0, 0));
//! # Ok(())
//! # }
//! ```

use crate::config::Stage;
use crate::core::{Result, ResultTable};
use crate::registry;
use crate::scenario::Scenario;
use crate::session::Session;

/// Create a session from row-major features and per-row labels, returning
/// its handle (non-negative on success).
pub fn init(features: &[f64], rows: usize, cols: usize, labels: &[f64]) -> Result<i32> {
    let session = Session::new(features.to_vec(), rows, cols, labels.to_vec())?;
    Ok(registry::create(session))
}

/// Set a configuration parameter on a session.
pub fn set_param(handle: i32, name: &str, value: &str) -> Result<()> {
    registry::with_session(handle, |s| s.set_param(name, value))
}

/// Get a configuration parameter from a session.
pub fn get_param(handle: i32, name: &str) -> Result<String> {
    registry::with_session(handle, |s| s.get_param(name))
}

/// The configuration line for a stage code (1 train, 2 select, 3 test).
pub fn get_config_line(handle: i32, stage: i32) -> Result<String> {
    let stage = Stage::from_code(stage)?;
    registry::with_session(handle, |s| Ok(s.config_line(stage)))
}

/// Train all candidates under the session configuration plus argv
/// overrides (`args[0]` is the conventional program placeholder).
pub fn train(handle: i32, args: &[String]) -> Result<ResultTable> {
    registry::with_session(handle, |s| s.train(args))
}

/// Select the best candidates per (task, cell).
pub fn select(handle: i32, args: &[String]) -> Result<ResultTable> {
    registry::with_session(handle, |s| s.select(args))
}

/// Evaluate the selected models on test data. Predictions are returned
/// first; the errors table is empty when no labels are supplied.
pub fn test(
    handle: i32,
    args: &[String],
    features: &[f64],
    rows: usize,
    cols: usize,
    labels: Option<&[f64]>,
) -> Result<(ResultTable, ResultTable)> {
    registry::with_session(handle, |s| {
        s.test(
            features.to_vec(),
            rows,
            cols,
            labels.map(|l| l.to_vec()),
            args,
        )
    })
}

/// Release a session's resources. Safe to call multiple times.
pub fn clean(handle: i32) {
    registry::release(handle);
}

fn default_args() -> Vec<String> {
    vec!["cellsvm".to_string()]
}

/// A session wrapper for the built-in learning scenarios.
///
/// Construction runs the full train-and-select pipeline the scenario
/// calls for; sweep scenarios issue one select pass per sweep value the
/// way an expert would by hand. The session is released on drop.
pub struct Svm {
    handle: i32,
}

impl Svm {
    /// Create a session with a scenario and extra parameters, without
    /// training. Building block for the scenario constructors.
    pub fn with_scenario(
        scenario: &str,
        features: &[f64],
        rows: usize,
        cols: usize,
        labels: &[f64],
        params: &[(&str, &str)],
    ) -> Result<Self> {
        let handle = init(features, rows, cols, labels)?;
        let svm = Self { handle };
        for (name, value) in params {
            svm.set(name, value)?;
        }
        svm.set("SCENARIO", scenario)?;
        Ok(svm)
    }

    /// Non-parametric least squares regression: train + select.
    pub fn least_squares(
        features: &[f64],
        rows: usize,
        cols: usize,
        labels: &[f64],
        params: &[(&str, &str)],
    ) -> Result<Self> {
        let svm = Self::with_scenario("LS", features, rows, cols, labels, params)?;
        svm.train(&[])?;
        svm.select(&[])?;
        Ok(svm)
    }

    /// Binary and multiclass classification. `mc_type` is one of
    /// `AvA_hinge`, `OvA_ls`, `OvA_hinge`, `AvA_ls`.
    pub fn multiclass(
        features: &[f64],
        rows: usize,
        cols: usize,
        labels: &[f64],
        mc_type: &str,
        params: &[(&str, &str)],
    ) -> Result<Self> {
        let scenario = format!("MC {mc_type}");
        let svm = Self::with_scenario(&scenario, features, rows, cols, labels, params)?;
        svm.train(&[])?;
        svm.select(&[])?;
        Ok(svm)
    }

    /// Quantile regression at the given levels (the classic five when
    /// empty), one select pass per level.
    pub fn quantile(
        features: &[f64],
        rows: usize,
        cols: usize,
        labels: &[f64],
        levels: &[f64],
        params: &[(&str, &str)],
    ) -> Result<Self> {
        Self::level_sweep("QT", features, rows, cols, labels, levels, params)
    }

    /// Expectile regression at the given levels, one select pass per
    /// level.
    pub fn expectile(
        features: &[f64],
        rows: usize,
        cols: usize,
        labels: &[f64],
        levels: &[f64],
        params: &[(&str, &str)],
    ) -> Result<Self> {
        Self::level_sweep("EX", features, rows, cols, labels, levels, params)
    }

    fn level_sweep(
        scenario: &str,
        features: &[f64],
        rows: usize,
        cols: usize,
        labels: &[f64],
        levels: &[f64],
        params: &[(&str, &str)],
    ) -> Result<Self> {
        let svm = Self::with_scenario(scenario, features, rows, cols, labels, params)?;
        let levels: Vec<f64> = if levels.is_empty() {
            Scenario::DEFAULT_LEVELS.to_vec()
        } else {
            levels.to_vec()
        };
        let rendered: Vec<String> = levels.iter().map(|l| l.to_string()).collect();
        svm.set("WEIGHTS", &rendered.join(" "))?;
        svm.train(&[])?;
        for i in 1..=levels.len() {
            svm.set("WEIGHT_NUMBER", &i.to_string())?;
            svm.select(&[])?;
        }
        Ok(svm)
    }

    /// Several points on the ROC curve from weighted binary
    /// classification, one select pass per weight step.
    pub fn roc(
        features: &[f64],
        rows: usize,
        cols: usize,
        labels: &[f64],
        weight_steps: usize,
        params: &[(&str, &str)],
    ) -> Result<Self> {
        let svm = Self::with_scenario("ROC", features, rows, cols, labels, params)?;
        svm.set("WEIGHT_STEPS", &weight_steps.to_string())?;
        svm.train(&[])?;
        for i in 1..=weight_steps {
            svm.set("WEIGHT_NUMBER", &i.to_string())?;
            svm.select(&[])?;
        }
        Ok(svm)
    }

    /// Neyman-Pearson learning: constrain the error of `class` to
    /// `constraint` scaled by each factor, one select pass per factor.
    pub fn npl(
        features: &[f64],
        rows: usize,
        cols: usize,
        labels: &[f64],
        class: i64,
        constraint: f64,
        factors: &[f64],
        params: &[(&str, &str)],
    ) -> Result<Self> {
        let scenario = format!("NPL {class}");
        let svm = Self::with_scenario(&scenario, features, rows, cols, labels, params)?;
        svm.train(&[])?;
        let factors: Vec<f64> = if factors.is_empty() {
            vec![0.5, 2.0 / 3.0, 1.0, 1.5, 2.0]
        } else {
            factors.to_vec()
        };
        for factor in factors {
            svm.set("NPL_CLASS", &class.to_string())?;
            svm.set("NPL_CONSTRAINT", &(constraint * factor).to_string())?;
            svm.select(&[])?;
        }
        Ok(svm)
    }

    /// The session handle.
    pub fn handle(&self) -> i32 {
        self.handle
    }

    pub fn set(&self, name: &str, value: &str) -> Result<()> {
        set_param(self.handle, name, value)
    }

    pub fn get(&self, name: &str) -> Result<String> {
        get_param(self.handle, name)
    }

    /// Run a training pass with optional extra `-flag value` overrides.
    pub fn train(&self, extra: &[(&str, &str)]) -> Result<ResultTable> {
        train(self.handle, &render_args(extra))
    }

    /// Run a select pass with optional extra overrides.
    pub fn select(&self, extra: &[(&str, &str)]) -> Result<ResultTable> {
        select(self.handle, &render_args(extra))
    }

    /// Predictions and error statistics on labeled test data.
    pub fn test(
        &self,
        features: &[f64],
        rows: usize,
        cols: usize,
        labels: &[f64],
    ) -> Result<(ResultTable, ResultTable)> {
        test(
            self.handle,
            &default_args(),
            features,
            rows,
            cols,
            Some(labels),
        )
    }

    /// Predictions on unlabeled data.
    pub fn predict(&self, features: &[f64], rows: usize, cols: usize) -> Result<ResultTable> {
        let (predictions, _) = test(self.handle, &default_args(), features, rows, cols, None)?;
        Ok(predictions)
    }

    /// Release the session now instead of at drop.
    pub fn clean(&mut self) {
        clean(self.handle);
        self.handle = -1;
    }
}

impl Drop for Svm {
    fn drop(&mut self) {
        if self.handle >= 0 {
            clean(self.handle);
        }
    }
}

fn render_args(extra: &[(&str, &str)]) -> Vec<String> {
    let mut args = default_args();
    for (name, value) in extra {
        args.push(format!("-{name}"));
        args.push(value.to_string());
    }
    args
}
