//! Session state
//!
//! A session owns one ingested training set, its configuration store, and
//! whatever the staged pipeline has produced so far: the trained
//! candidate grid after train(), the accumulated selection slots after
//! select(). Stage ordering is enforced here: select() before train()
//! fails with `NotTrained`, test() before select() with `NotSelected`,
//! and a failed call leaves the prior state untouched.
//!
//! Concurrent calls against one session must be serialized by the
//! caller; the handle registry wraps each session in its own lock for
//! exactly that reason.

use crate::config::{parse_overrides, ConfigStore, Stage};
use crate::core::{DataMatrix, Result, ResultTable, SvmError};
use crate::predict::run_test;
use crate::select::{run_select, SelectionState};
use crate::train::{run_train, TrainedState};

/// One training session.
#[derive(Debug)]
pub struct Session {
    config: ConfigStore,
    data: DataMatrix,
    trained: Option<TrainedState>,
    selection: SelectionState,
}

impl Session {
    /// Ingest a training set: row-major features plus one label per row.
    pub fn new(features: Vec<f64>, rows: usize, cols: usize, labels: Vec<f64>) -> Result<Self> {
        let data = DataMatrix::new(features, rows, cols, labels)?;
        Ok(Self {
            config: ConfigStore::new(),
            data,
            trained: None,
            selection: SelectionState::default(),
        })
    }

    /// The ingested training data.
    pub fn data(&self) -> &DataMatrix {
        &self.data
    }

    /// Set a configuration parameter.
    pub fn set_param(&mut self, name: &str, value: &str) -> Result<()> {
        self.config.set(name, value)
    }

    /// Get a configuration parameter's canonical value.
    pub fn get_param(&self, name: &str) -> Result<String> {
        self.config.get(name)
    }

    /// The canonical configuration line for a stage.
    pub fn config_line(&self, stage: Stage) -> String {
        self.config.config_line(stage)
    }

    /// Whether a training pass has completed on this session.
    pub fn is_trained(&self) -> bool {
        self.trained.is_some()
    }

    /// Whether any selection slot exists.
    pub fn is_selected(&self) -> bool {
        !self.selection.is_empty()
    }

    /// Effective configuration for one call: the session store overlaid
    /// with the call's argv overrides.
    fn effective_config(&self, args: &[String]) -> Result<ConfigStore> {
        let overrides = parse_overrides(args)?;
        self.config.with_overrides(&overrides)
    }

    /// Train candidates for every (task, cell, grid point). Replaces any
    /// previous candidate grid and clears the selection, since the slots
    /// referenced the old candidates.
    pub fn train(&mut self, args: &[String]) -> Result<ResultTable> {
        let effective = self.effective_config(args)?;
        let outcome = run_train(&self.data, &effective)?;
        self.trained = Some(outcome.state);
        self.selection.clear();
        Ok(outcome.table)
    }

    /// Select the best candidates per (task, cell).
    pub fn select(&mut self, args: &[String]) -> Result<ResultTable> {
        let effective = self.effective_config(args)?;
        let trained = self.trained.as_ref().ok_or(SvmError::NotTrained)?;
        run_select(trained, &mut self.selection, &effective)
    }

    /// Apply the selected models to test data. Labels are optional; when
    /// absent the errors table comes back empty.
    pub fn test(
        &self,
        features: Vec<f64>,
        rows: usize,
        cols: usize,
        labels: Option<Vec<f64>>,
        args: &[String],
    ) -> Result<(ResultTable, ResultTable)> {
        let effective = self.effective_config(args)?;
        if self.selection.is_empty() {
            return Err(SvmError::NotSelected);
        }
        let trained = self.trained.as_ref().ok_or(SvmError::NotTrained)?;
        let test_data = match labels {
            Some(labels) => DataMatrix::new(features, rows, cols, labels)?,
            None => DataMatrix::unlabeled(features, rows, cols)?,
        };
        run_test(&self.data, trained, &self.selection, &test_data, &effective)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regression_session(n: usize) -> Session {
        let features: Vec<f64> = (0..n).map(|i| i as f64 / n as f64).collect();
        let labels: Vec<f64> = features.iter().map(|x| 3.0 * x - 1.0).collect();
        let mut session = Session::new(features, n, 1, labels).unwrap();
        session.set_param("GAMMA_STEPS", "2").unwrap();
        session.set_param("LAMBDA_STEPS", "2").unwrap();
        session
    }

    fn no_args() -> Vec<String> {
        vec!["svm".to_string()]
    }

    #[test]
    fn test_stage_ordering_enforced() {
        let mut session = regression_session(30);
        assert!(matches!(
            session.select(&no_args()),
            Err(SvmError::NotTrained)
        ));
        assert!(matches!(
            session.test(vec![0.5], 1, 1, None, &no_args()),
            Err(SvmError::NotSelected)
        ));

        session.train(&no_args()).unwrap();
        assert!(matches!(
            session.test(vec![0.5], 1, 1, None, &no_args()),
            Err(SvmError::NotSelected)
        ));

        session.select(&no_args()).unwrap();
        let (predictions, errors) = session
            .test(vec![0.5], 1, 1, None, &no_args())
            .unwrap();
        assert_eq!(predictions.rows(), 1);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_argv_overrides_apply_per_call() {
        let mut session = regression_session(30);
        let args: Vec<String> = ["svm-train", "-lambda_steps", "3"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let table = session.train(&args).unwrap();
        assert_eq!(table.rows(), 6);
        // The override was per-call only.
        assert_eq!(session.get_param("LAMBDA_STEPS").unwrap(), "2");
    }

    #[test]
    fn test_retrain_clears_selection() {
        let mut session = regression_session(30);
        session.train(&no_args()).unwrap();
        session.select(&no_args()).unwrap();
        assert!(session.is_selected());

        session.train(&no_args()).unwrap();
        assert!(!session.is_selected());
    }

    #[test]
    fn test_invalid_test_shape_rejected() {
        let mut session = regression_session(30);
        session.train(&no_args()).unwrap();
        session.select(&no_args()).unwrap();
        assert!(matches!(
            session.test(vec![0.5, 0.5], 1, 2, None, &no_args()),
            Err(SvmError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_failed_select_preserves_prior_selection() {
        let mut session = regression_session(30);
        session.train(&no_args()).unwrap();
        session.select(&no_args()).unwrap();

        let bad: Vec<String> = ["svm-select", "-weight_number", "oops"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert!(session.select(&bad).is_err());
        assert!(session.is_selected());
    }
}
