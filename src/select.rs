//! The model selector
//!
//! A select pass scans the candidates a prior train() produced and
//! promotes, per (task, cell), the one minimizing validation error, with
//! the lowest grid index breaking ties so repeated selects on identical
//! candidates are reproducible.
//!
//! Sweep scenarios select one slot per call: quantile/expectile/ROC
//! sessions pick the task named by `WEIGHT_NUMBER` (0 selects every
//! task), Neyman-Pearson sessions pick, per cell, the weighted classifier
//! whose constrained-class validation error stays within
//! `NPL_CONSTRAINT` while minimizing the other class's error. Each pass
//! overwrites only its own slot; earlier slots accumulate for the test
//! stage. Nothing is committed when a pass fails, so prior selections
//! survive failed calls.

use log::info;

use crate::config::ConfigStore;
use crate::core::{Result, ResultTable, SvmError};
use crate::model::{CandidateModel, SelectedModel};
use crate::scenario::Scenario;
use crate::train::{diagnostics_row, TrainedState, DIAG_COLS};

/// Identity of one selection slot, a column of the test output.
#[derive(Debug, Clone, Copy)]
pub enum SlotKey {
    /// A scenario task (regression, multiclass subtask).
    Task(usize),
    /// A sweep task picked by its weight index.
    Weight(usize),
    /// A Neyman-Pearson pass keyed by its constrained class and level.
    Npl { class: i64, constraint: f64 },
}

impl PartialEq for SlotKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SlotKey::Task(a), SlotKey::Task(b)) => a == b,
            (SlotKey::Weight(a), SlotKey::Weight(b)) => a == b,
            (
                SlotKey::Npl { class, constraint },
                SlotKey::Npl {
                    class: c2,
                    constraint: k2,
                },
            ) => class == c2 && constraint.to_bits() == k2.to_bits(),
            _ => false,
        }
    }
}

/// One selection slot: the per-cell winners of one select pass.
#[derive(Debug, Clone)]
pub struct SelectionSlot {
    pub key: SlotKey,
    /// Winner per cell; `None` where no viable candidate existed.
    pub models: Vec<Option<SelectedModel>>,
}

/// The accumulated selections of a session.
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    slots: Vec<SelectionSlot>,
}

impl SelectionState {
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn slots(&self) -> &[SelectionSlot] {
        &self.slots
    }

    /// Replace the slot with the same key, or insert it: task and weight
    /// slots keep index order, NPL slots keep insertion order.
    fn upsert(&mut self, slot: SelectionSlot) {
        if let Some(existing) = self.slots.iter_mut().find(|s| s.key == slot.key) {
            *existing = slot;
            return;
        }
        let position = match slot.key {
            SlotKey::Task(i) => self
                .slots
                .iter()
                .position(|s| matches!(s.key, SlotKey::Task(j) if j > i)),
            SlotKey::Weight(i) => self
                .slots
                .iter()
                .position(|s| matches!(s.key, SlotKey::Weight(j) if j > i)),
            SlotKey::Npl { .. } => None,
        };
        match position {
            Some(p) => self.slots.insert(p, slot),
            None => self.slots.push(slot),
        }
    }
}

/// Execute a select pass, committing the new slots only on success.
pub fn run_select(
    trained: &TrainedState,
    selection: &mut SelectionState,
    config: &ConfigStore,
) -> Result<ResultTable> {
    let mut table = ResultTable::empty(DIAG_COLS);
    let mut new_slots: Vec<SelectionSlot> = Vec::new();
    let mut replace_all = false;

    match trained.scenario {
        Scenario::LeastSquares | Scenario::MultiClass(_) => {
            replace_all = true;
            for t in 0..trained.tasks.len() {
                let slot = select_task_slot(trained, t, SlotKey::Task(t), &mut table)?;
                new_slots.push(slot);
            }
        }
        Scenario::Quantile | Scenario::Expectile | Scenario::Roc => {
            let targets: Vec<usize> = match config.weight_number() {
                0 => (0..trained.tasks.len()).collect(),
                wn if wn <= trained.tasks.len() => vec![wn - 1],
                wn => {
                    return Err(SvmError::InvalidParameter(format!(
                        "WEIGHT_NUMBER {wn} exceeds the {} trained sweep task(s)",
                        trained.tasks.len()
                    )))
                }
            };
            for t in targets {
                let slot = select_task_slot(trained, t, SlotKey::Weight(t), &mut table)?;
                new_slots.push(slot);
            }
        }
        Scenario::Npl { .. } => {
            let class = config.npl_class();
            if class != 1 && class != -1 {
                return Err(SvmError::InvalidParameter(format!(
                    "NPL_CLASS must be 1 or -1, got {class}"
                )));
            }
            let constraint = config.npl_constraint();
            if !(constraint > 0.0 && constraint < 1.0) {
                return Err(SvmError::InvalidParameter(format!(
                    "NPL_CONSTRAINT must lie in (0, 1), got {constraint}"
                )));
            }
            new_slots.push(select_npl_slot(trained, class, constraint, &mut table)?);
        }
    }

    if config.display() > 0 {
        info!(
            "selected {} slot(s) over {} cell(s)",
            new_slots.len(),
            trained.partition.n_cells()
        );
    }

    if replace_all {
        selection.clear();
    }
    for slot in new_slots {
        selection.upsert(slot);
    }
    Ok(table)
}

/// Winner per cell for one task: minimum validation error, lowest grid
/// index first on ties.
fn select_task_slot(
    trained: &TrainedState,
    task: usize,
    key: SlotKey,
    table: &mut ResultTable,
) -> Result<SelectionSlot> {
    let mut models: Vec<Option<SelectedModel>> = Vec::new();
    for cell in 0..trained.partition.n_cells() {
        let winner = trained.candidates[task][cell]
            .iter()
            .filter(|c| !c.is_failed())
            .reduce(|best, c| if c.val_error < best.val_error { c } else { best });
        if let Some(candidate) = winner {
            table.push_row(&diagnostics_row(task, cell, candidate));
            models.push(Some(promote(task, cell, candidate)));
        } else {
            models.push(None);
        }
    }
    if models.iter().all(Option::is_none) {
        return Err(SvmError::TrainingError(format!(
            "no viable candidate for task {task} in any cell"
        )));
    }
    Ok(SelectionSlot { key, models })
}

/// Neyman-Pearson winner per cell: among all weighted classifiers and
/// grid points, the candidate whose constrained-class validation error
/// satisfies the constraint with minimal error on the other class. When
/// no candidate is feasible the one closest to feasibility wins. Ties go
/// to the lowest (task, grid) order.
fn select_npl_slot(
    trained: &TrainedState,
    class: i64,
    constraint: f64,
    table: &mut ResultTable,
) -> Result<SelectionSlot> {
    let constrained_error = |c: &CandidateModel| {
        if class > 0 {
            c.val_pos_error
        } else {
            c.val_neg_error
        }
    };
    let other_error = |c: &CandidateModel| {
        if class > 0 {
            c.val_neg_error
        } else {
            c.val_pos_error
        }
    };

    let mut models: Vec<Option<SelectedModel>> = Vec::new();
    for cell in 0..trained.partition.n_cells() {
        let mut best_feasible: Option<(usize, &CandidateModel)> = None;
        let mut best_fallback: Option<(usize, &CandidateModel)> = None;
        for (t, task_candidates) in trained.candidates.iter().enumerate() {
            for candidate in task_candidates[cell].iter().filter(|c| !c.is_failed()) {
                if constrained_error(candidate) <= constraint {
                    let better = best_feasible
                        .map(|(_, b)| other_error(candidate) < other_error(b))
                        .unwrap_or(true);
                    if better {
                        best_feasible = Some((t, candidate));
                    }
                } else {
                    let better = best_fallback
                        .map(|(_, b)| constrained_error(candidate) < constrained_error(b))
                        .unwrap_or(true);
                    if better {
                        best_fallback = Some((t, candidate));
                    }
                }
            }
        }
        match best_feasible.or(best_fallback) {
            Some((t, candidate)) => {
                table.push_row(&diagnostics_row(t, cell, candidate));
                models.push(Some(promote(t, cell, candidate)));
            }
            None => models.push(None),
        }
    }
    if models.iter().all(Option::is_none) {
        return Err(SvmError::TrainingError(
            "no viable candidate in any cell".to_string(),
        ));
    }
    Ok(SelectionSlot {
        key: SlotKey::Npl { class, constraint },
        models,
    })
}

fn promote(task: usize, cell: usize, candidate: &CandidateModel) -> SelectedModel {
    SelectedModel {
        task,
        cell,
        grid_index: candidate.grid_index,
        gamma: candidate.gamma,
        lambda: candidate.lambda,
        val_error: candidate.val_error,
        fit: candidate.fit.clone().expect("viable candidate has a fit"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DataMatrix;
    use crate::train::run_train;

    fn trained_regression() -> TrainedState {
        let values: Vec<f64> = (0..30).map(|i| i as f64 / 30.0).collect();
        let labels: Vec<f64> = values.iter().map(|x| x + 1.0).collect();
        let data = DataMatrix::new(values, 30, 1, labels).unwrap();
        let mut config = ConfigStore::new();
        config.set("GAMMA_STEPS", "2").unwrap();
        config.set("LAMBDA_STEPS", "3").unwrap();
        run_train(&data, &config).unwrap().state
    }

    #[test]
    fn test_select_picks_minimum_validation_error() {
        let trained = trained_regression();
        let mut selection = SelectionState::default();
        let table = run_select(&trained, &mut selection, &ConfigStore::new()).unwrap();

        assert_eq!(table.rows(), 1);
        assert_eq!(table.cols(), DIAG_COLS);
        let winner_error = table.get(0, 6);
        let min_error = trained.candidates[0][0]
            .iter()
            .map(|c| c.val_error)
            .fold(f64::INFINITY, f64::min);
        assert_eq!(winner_error, min_error);
        assert_eq!(selection.slots().len(), 1);
    }

    #[test]
    fn test_select_is_reproducible() {
        let trained = trained_regression();
        let mut selection = SelectionState::default();
        let a = run_select(&trained, &mut selection, &ConfigStore::new()).unwrap();
        let b = run_select(&trained, &mut selection, &ConfigStore::new()).unwrap();
        assert_eq!(a, b);
        assert_eq!(selection.slots().len(), 1);
    }

    #[test]
    fn test_tie_break_prefers_lowest_grid_index() {
        let mut trained = trained_regression();
        // Force an exact tie across all candidates.
        for candidate in trained.candidates[0][0].iter_mut() {
            candidate.val_error = 0.25;
        }
        let mut selection = SelectionState::default();
        let table = run_select(&trained, &mut selection, &ConfigStore::new()).unwrap();
        assert_eq!(table.get(0, 2), 0.0);
        assert_eq!(table.get(0, 3), 0.0);
    }

    #[test]
    fn test_weight_number_out_of_range() {
        let values: Vec<f64> = (0..30).map(|i| i as f64 / 30.0).collect();
        let labels: Vec<f64> = values.clone();
        let data = DataMatrix::new(values, 30, 1, labels).unwrap();
        let mut config = ConfigStore::new();
        config.set("SCENARIO", "QT").unwrap();
        config.set("WEIGHTS", "0.25 0.75").unwrap();
        config.set("GAMMA_STEPS", "1").unwrap();
        config.set("LAMBDA_STEPS", "2").unwrap();
        let trained = run_train(&data, &config).unwrap().state;

        let mut selection = SelectionState::default();
        let mut select_config = config.clone();
        select_config.set("WEIGHT_NUMBER", "3").unwrap();
        assert!(run_select(&trained, &mut selection, &select_config).is_err());
        // Failed pass committed nothing.
        assert!(selection.is_empty());
    }

    #[test]
    fn test_sweep_slots_accumulate_in_weight_order() {
        let values: Vec<f64> = (0..40).map(|i| i as f64 / 40.0).collect();
        let labels: Vec<f64> = values.clone();
        let data = DataMatrix::new(values, 40, 1, labels).unwrap();
        let mut config = ConfigStore::new();
        config.set("SCENARIO", "QT").unwrap();
        config.set("WEIGHTS", "0.1 0.5 0.9").unwrap();
        config.set("GAMMA_STEPS", "1").unwrap();
        config.set("LAMBDA_STEPS", "2").unwrap();
        let trained = run_train(&data, &config).unwrap().state;

        let mut selection = SelectionState::default();
        // Select out of order; slots still land in weight order.
        for wn in ["3", "1", "2"] {
            let mut c = config.clone();
            c.set("WEIGHT_NUMBER", wn).unwrap();
            run_select(&trained, &mut selection, &c).unwrap();
        }
        let keys: Vec<_> = selection.slots().iter().map(|s| s.key).collect();
        assert_eq!(keys, vec![SlotKey::Weight(0), SlotKey::Weight(1), SlotKey::Weight(2)]);

        // Re-selecting a slot overwrites in place.
        let mut c = config.clone();
        c.set("WEIGHT_NUMBER", "2").unwrap();
        run_select(&trained, &mut selection, &c).unwrap();
        assert_eq!(selection.slots().len(), 3);
    }
}
