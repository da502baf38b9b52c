//! The prediction/test engine
//!
//! Applies the selected models to new data. Test rows are routed to the
//! cell whose training centroid is nearest, then evaluated against that
//! cell's selected model for every selection slot. The prediction table
//! carries one column per slot (quantile/expectile sweeps, ROC/NPL
//! passes) or a single voted-label column for classification scenarios.
//!
//! When ground truth is supplied an errors table accompanies the
//! predictions: one row per task with columns [task, error, error on the
//! positive class, error on the negative class]; for multiclass sessions
//! the very first row is the overall classification error. Without
//! labels the errors table has zero rows but still carries its header.
//!
//! Quantile and expectile prediction columns are rearranged row-wise
//! into non-decreasing order across ascending levels, so the delivered
//! estimates never cross.

use std::sync::Arc;

use rayon::prelude::*;

use crate::config::ConfigStore;
use crate::core::{DataMatrix, Result, ResultTable, SvmError};
use crate::kernel::Kernel;
use crate::model::SelectedModel;
use crate::scenario::{Scenario, TaskSpec};
use crate::select::{SelectionSlot, SelectionState, SlotKey};
use crate::solver::Objective;
use crate::train::{run_in_pool, TrainedState};

/// Columns of the errors table.
pub const ERROR_COLS: usize = 4;

/// Evaluate the selected models on a test set.
pub fn run_test(
    train_data: &DataMatrix,
    trained: &TrainedState,
    selection: &SelectionState,
    test: &DataMatrix,
    config: &ConfigStore,
) -> Result<(ResultTable, ResultTable)> {
    if test.cols() != train_data.cols() {
        return Err(SvmError::InvalidInput(format!(
            "test data has {} features, training data has {}",
            test.cols(),
            train_data.cols()
        )));
    }

    let slots = selection.slots();
    let slot_models: Vec<Vec<Option<(&SelectedModel, Arc<dyn Kernel>)>>> = slots
        .iter()
        .map(|slot| {
            slot.models
                .iter()
                .map(|m| m.as_ref().map(|m| (m, m.fit.kernel())))
                .collect()
        })
        .collect();

    let routes: Vec<usize> = (0..test.rows())
        .map(|r| nearest_cell(&trained.centroids, test.row(r)))
        .collect();

    // One decision value per (row, slot), computed in parallel over rows
    // and collected back in row order.
    let decisions: Vec<Vec<f64>> = run_in_pool(config.threads(), || {
        (0..test.rows())
            .into_par_iter()
            .map(|r| {
                let x = test.row(r);
                let cell = routes[r];
                slot_models
                    .iter()
                    .map(|cells| match &cells[cell] {
                        Some((model, kernel)) => {
                            model.fit.decision(train_data, kernel.as_ref(), x)
                        }
                        None => f64::NAN,
                    })
                    .collect()
            })
            .collect()
    })?;

    let predictions = build_predictions(trained, slots, &decisions)?;
    let errors = match test.labels() {
        Some(labels) => build_errors(trained, slots, &predictions, &decisions, labels),
        None => ResultTable::empty(ERROR_COLS),
    };
    Ok((predictions, errors))
}

fn nearest_cell(centroids: &[Vec<f64>], x: &[f64]) -> usize {
    let mut best = 0;
    let mut best_d2 = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d2 = crate::core::squared_distance(c, x);
        if d2 < best_d2 {
            best_d2 = d2;
            best = i;
        }
    }
    best
}

fn build_predictions(
    trained: &TrainedState,
    slots: &[SelectionSlot],
    decisions: &[Vec<f64>],
) -> Result<ResultTable> {
    match trained.scenario {
        Scenario::MultiClass(_) => {
            let mut table = ResultTable::empty(1);
            for row in decisions {
                table.push_row(&[vote(&trained.tasks, slots, row)]);
            }
            Ok(table)
        }
        Scenario::Quantile | Scenario::Expectile => {
            let levels = slot_levels(trained, slots)?;
            let ranks = level_ranks(&levels);
            let mut table = ResultTable::empty(slots.len());
            let mut sorted = Vec::with_capacity(slots.len());
            for row in decisions {
                sorted.clone_from(row);
                sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                let rearranged: Vec<f64> = ranks.iter().map(|&r| sorted[r]).collect();
                table.push_row(&rearranged);
            }
            Ok(table)
        }
        Scenario::Roc | Scenario::Npl { .. } => {
            let mut table = ResultTable::empty(slots.len());
            for row in decisions {
                let signs: Vec<f64> = row
                    .iter()
                    .map(|&d| if d >= 0.0 { 1.0 } else { -1.0 })
                    .collect();
                table.push_row(&signs);
            }
            Ok(table)
        }
        Scenario::LeastSquares => {
            let mut table = ResultTable::empty(slots.len());
            for row in decisions {
                table.push_row(row);
            }
            Ok(table)
        }
    }
}

/// The quantile/expectile level behind each slot.
fn slot_levels(trained: &TrainedState, slots: &[SelectionSlot]) -> Result<Vec<f64>> {
    slots
        .iter()
        .map(|slot| match slot.key {
            SlotKey::Weight(i) | SlotKey::Task(i) => match trained.tasks[i] {
                TaskSpec::QuantileLevel { tau } | TaskSpec::ExpectileLevel { tau } => Ok(tau),
                _ => Err(SvmError::InvalidInput(
                    "selection does not match a level sweep".to_string(),
                )),
            },
            SlotKey::Npl { .. } => Err(SvmError::InvalidInput(
                "selection does not match a level sweep".to_string(),
            )),
        })
        .collect()
}

/// Rank of each slot's level among all levels, stable on ties.
fn level_ranks(levels: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..levels.len()).collect();
    order.sort_by(|&a, &b| {
        levels[a]
            .partial_cmp(&levels[b])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });
    let mut ranks = vec![0; levels.len()];
    for (pos, &slot) in order.iter().enumerate() {
        ranks[slot] = pos;
    }
    ranks
}

/// Multiclass label from the subtask decisions: argmax for one-vs-all,
/// majority vote for all-vs-all, smallest label on ties.
fn vote(tasks: &[TaskSpec], slots: &[SelectionSlot], decisions: &[f64]) -> f64 {
    let mut ova_best: Option<(f64, f64)> = None;
    let mut tally: Vec<(f64, usize)> = Vec::new();
    for (slot, &d) in slots.iter().zip(decisions.iter()) {
        let task_index = match slot.key {
            SlotKey::Task(i) => i,
            _ => continue,
        };
        match tasks[task_index] {
            TaskSpec::OneVersusAll { class, .. } => {
                let better = ova_best.map(|(_, bd)| d > bd).unwrap_or(true);
                if better && !d.is_nan() {
                    ova_best = Some((class, d));
                }
            }
            TaskSpec::AllVersusAll { pos, neg, .. } => {
                let winner = if d >= 0.0 { pos } else { neg };
                match tally.iter_mut().find(|(label, _)| *label == winner) {
                    Some((_, count)) => *count += 1,
                    None => tally.push((winner, 1)),
                }
            }
            _ => {}
        }
    }
    if let Some((class, _)) = ova_best {
        return class;
    }
    tally
        .iter()
        .max_by(|a, b| {
            a.1.cmp(&b.1).then(
                b.0.partial_cmp(&a.0)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
        })
        .map(|&(label, _)| label)
        .unwrap_or(f64::NAN)
}

fn build_errors(
    trained: &TrainedState,
    slots: &[SelectionSlot],
    predictions: &ResultTable,
    decisions: &[Vec<f64>],
    labels: &[f64],
) -> ResultTable {
    let mut table = ResultTable::empty(ERROR_COLS);
    match trained.scenario {
        Scenario::LeastSquares => {
            let col = predictions.column(0);
            let mse = mean_loss(&Objective::LeastSquares, labels, &col);
            table.push_row(&[0.0, mse, 0.0, 0.0]);
        }
        Scenario::Quantile | Scenario::Expectile => {
            for (s, slot) in slots.iter().enumerate() {
                let tau = match slot.key {
                    SlotKey::Weight(i) => match trained.tasks[i] {
                        TaskSpec::QuantileLevel { tau } | TaskSpec::ExpectileLevel { tau } => tau,
                        _ => continue,
                    },
                    _ => continue,
                };
                let objective = if matches!(trained.scenario, Scenario::Quantile) {
                    Objective::Quantile { tau }
                } else {
                    Objective::Expectile { tau }
                };
                let col = predictions.column(s);
                table.push_row(&[s as f64, mean_loss(&objective, labels, &col), 0.0, 0.0]);
            }
        }
        Scenario::Roc | Scenario::Npl { .. } => {
            for s in 0..slots.len() {
                let col = predictions.column(s);
                let (err, pos, neg) = classification_rates(labels, &col);
                table.push_row(&[s as f64, err, pos, neg]);
            }
        }
        Scenario::MultiClass(_) => {
            let voted = predictions.column(0);
            let overall = labels
                .iter()
                .zip(voted.iter())
                .filter(|(&y, &p)| y != p)
                .count() as f64
                / labels.len().max(1) as f64;
            table.push_row(&[0.0, overall, 0.0, 0.0]);

            for (s, slot) in slots.iter().enumerate() {
                let task_index = match slot.key {
                    SlotKey::Task(i) => i,
                    _ => continue,
                };
                let task = &trained.tasks[task_index];
                let mut total = 0usize;
                let mut wrong = 0usize;
                let mut pos_total = 0usize;
                let mut pos_wrong = 0usize;
                let mut neg_total = 0usize;
                let mut neg_wrong = 0usize;
                for (r, &y) in labels.iter().enumerate() {
                    let Some(wl) = task.working_label(y) else {
                        continue;
                    };
                    let d = decisions[r][s];
                    let miss = wl * d <= 0.0;
                    total += 1;
                    wrong += miss as usize;
                    if wl > 0.0 {
                        pos_total += 1;
                        pos_wrong += miss as usize;
                    } else {
                        neg_total += 1;
                        neg_wrong += miss as usize;
                    }
                }
                table.push_row(&[
                    (task_index + 1) as f64,
                    rate(wrong, total),
                    rate(pos_wrong, pos_total),
                    rate(neg_wrong, neg_total),
                ]);
            }
        }
    }
    table
}

fn mean_loss(objective: &Objective, labels: &[f64], predictions: &[f64]) -> f64 {
    objective
        .mean_loss(labels, predictions)
        .unwrap_or(f64::NAN)
}

/// Overall and per-class misclassification rates for ±1 predictions.
fn classification_rates(labels: &[f64], predictions: &[f64]) -> (f64, f64, f64) {
    let mut wrong = 0usize;
    let mut pos_total = 0usize;
    let mut pos_wrong = 0usize;
    let mut neg_total = 0usize;
    let mut neg_wrong = 0usize;
    for (&y, &p) in labels.iter().zip(predictions.iter()) {
        let working = if y > 0.0 { 1.0 } else { -1.0 };
        let miss = working * p <= 0.0;
        wrong += miss as usize;
        if working > 0.0 {
            pos_total += 1;
            pos_wrong += miss as usize;
        } else {
            neg_total += 1;
            neg_wrong += miss as usize;
        }
    }
    (
        rate(wrong, labels.len()),
        rate(pos_wrong, pos_total),
        rate(neg_wrong, neg_total),
    )
}

fn rate(wrong: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        wrong as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ranks_stable() {
        assert_eq!(level_ranks(&[0.5, 0.1, 0.9]), vec![1, 0, 2]);
        assert_eq!(level_ranks(&[0.5, 0.5]), vec![0, 1]);
    }

    #[test]
    fn test_classification_rates() {
        let labels = [1.0, 1.0, -1.0, -1.0];
        let predictions = [1.0, -1.0, -1.0, 1.0];
        let (err, pos, neg) = classification_rates(&labels, &predictions);
        assert_eq!(err, 0.5);
        assert_eq!(pos, 0.5);
        assert_eq!(neg, 0.5);
    }

    #[test]
    fn test_nearest_cell_routing() {
        let centroids = vec![vec![0.0, 0.0], vec![10.0, 10.0]];
        assert_eq!(nearest_cell(&centroids, &[1.0, 1.0]), 0);
        assert_eq!(nearest_cell(&centroids, &[9.0, 8.0]), 1);
    }
}
