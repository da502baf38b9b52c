//! The training engine
//!
//! One training pass fits a candidate model for every (task, cell, grid
//! point) triple: the scenario decomposes into tasks, the partitioner
//! splits rows into cells, and each cell solves the weighted
//! empirical-risk problem at every grid point. Within a cell a
//! deterministic holdout slice supplies the validation error the selector
//! ranks candidates by.
//!
//! Units of work, the (task, cell) pairs, are independent and run on a
//! rayon pool bounded by the `THREADS` parameter. Result rows are
//! assembled in fixed (task, cell, grid index) order regardless of
//! scheduling. A candidate whose solver run fails is recorded with a
//! failure flag in its diagnostics row; it never aborts the pass.

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::config::ConfigStore;
use crate::core::{DataMatrix, Result, ResultTable, SvmError};
use crate::grid::HyperGrid;
use crate::kernel::{gram_matrix, squared_distance_matrix, KernelKind};
use crate::model::{CandidateModel, Fit};
use crate::partition::Partition;
use crate::scenario::{decompose, Scenario, TaskSpec};
use crate::solver::{solve, KernelSource, Objective, SolverConfig};

/// Columns of the train/select diagnostics tables:
/// task, cell, gamma index, lambda index, gamma, lambda, validation
/// error, sweeps, converged, support vectors, solver-ok flag.
pub const DIAG_COLS: usize = 11;

/// Everything a training pass leaves behind for select() and test().
#[derive(Debug, Clone)]
pub struct TrainedState {
    pub scenario: Scenario,
    pub tasks: Vec<TaskSpec>,
    pub partition: Partition,
    pub kernel_kind: KernelKind,
    pub grid: HyperGrid,
    /// Mean feature vector of each cell, used to route test rows.
    pub centroids: Vec<Vec<f64>>,
    /// Candidates indexed `[task][cell][grid index]`.
    pub candidates: Vec<Vec<Vec<CandidateModel>>>,
}

/// Result of one training pass.
pub struct TrainOutcome {
    pub state: TrainedState,
    pub table: ResultTable,
}

/// Run work on a pool of `threads` workers; 0 uses the default pool.
pub(crate) fn run_in_pool<T: Send>(
    threads: usize,
    work: impl FnOnce() -> T + Send,
) -> Result<T> {
    if threads == 0 {
        return Ok(work());
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| SvmError::TrainingError(format!("failed to build thread pool: {e}")))?;
    Ok(pool.install(work))
}

/// The diagnostics row of one candidate.
pub(crate) fn diagnostics_row(task: usize, cell: usize, candidate: &CandidateModel) -> Vec<f64> {
    vec![
        task as f64,
        cell as f64,
        candidate.gamma_index as f64,
        candidate.lambda_index as f64,
        candidate.gamma,
        candidate.lambda,
        candidate.val_error,
        candidate.sweeps as f64,
        if candidate.converged { 1.0 } else { 0.0 },
        candidate.n_support_vectors() as f64,
        if candidate.is_failed() { 0.0 } else { 1.0 },
    ]
}

/// Execute a full training pass under an effective configuration.
pub fn run_train(data: &DataMatrix, config: &ConfigStore) -> Result<TrainOutcome> {
    if !data.is_labeled() {
        return Err(SvmError::TrainingError(
            "session has no labeled training data".to_string(),
        ));
    }

    let scenario = config.scenario().unwrap_or_else(|| {
        debug!("scenario unset, defaulting to least squares regression");
        Scenario::LeastSquares
    });
    let tasks = decompose(scenario, data, config)?;
    let kernel_kind = KernelKind::from_code(config.kernel_code())?;
    let grid = HyperGrid::from_config(config, kernel_kind)?;
    if grid.is_empty() {
        return Err(SvmError::TrainingError(
            "hyperparameter grid is empty".to_string(),
        ));
    }
    let partition = Partition::build(data, config.partition_choice(), config.cell_size())?;
    let centroids = cell_centroids(data, &partition);

    let folds = config.folds();
    let solver_config = SolverConfig {
        epsilon: config.epsilon(),
        max_sweeps: config.max_iterations(),
        ..SolverConfig::default()
    };

    if config.display() > 0 {
        info!(
            "training {}: {} task(s) x {} cell(s) x {} grid point(s)",
            scenario,
            tasks.len(),
            partition.n_cells(),
            grid.len()
        );
    }

    let units: Vec<(usize, usize)> = (0..tasks.len())
        .flat_map(|t| (0..partition.n_cells()).map(move |c| (t, c)))
        .collect();

    let fitted: Vec<Vec<CandidateModel>> = run_in_pool(config.threads(), || {
        units
            .par_iter()
            .map(|&(t, c)| {
                train_unit(
                    data,
                    &tasks[t],
                    partition.cell(c),
                    kernel_kind,
                    &grid,
                    folds,
                    &solver_config,
                )
            })
            .collect()
    })?;

    let mut table = ResultTable::empty(DIAG_COLS);
    let mut candidates: Vec<Vec<Vec<CandidateModel>>> = vec![Vec::new(); tasks.len()];
    for ((t, c), unit) in units.into_iter().zip(fitted) {
        for candidate in &unit {
            table.push_row(&diagnostics_row(t, c, candidate));
        }
        debug_assert_eq!(candidates[t].len(), c);
        candidates[t].push(unit);
    }

    let failed = candidates
        .iter()
        .flatten()
        .flatten()
        .filter(|c| c.is_failed())
        .count();
    if failed > 0 {
        warn!("{failed} of {} candidates failed to fit", table.rows());
    }

    Ok(TrainOutcome {
        state: TrainedState {
            scenario,
            tasks,
            partition,
            kernel_kind,
            grid,
            centroids,
            candidates,
        },
        table,
    })
}

fn cell_centroids(data: &DataMatrix, partition: &Partition) -> Vec<Vec<f64>> {
    partition
        .iter()
        .map(|cell| {
            let mut centroid = vec![0.0; data.cols()];
            for &r in cell {
                for (c, v) in centroid.iter_mut().zip(data.row(r)) {
                    *c += v;
                }
            }
            for c in &mut centroid {
                *c /= cell.len().max(1) as f64;
            }
            centroid
        })
        .collect()
}

/// Fit every grid point for one (task, cell) unit.
fn train_unit(
    data: &DataMatrix,
    task: &TaskSpec,
    cell_rows: &[usize],
    kernel_kind: KernelKind,
    grid: &HyperGrid,
    folds: usize,
    solver_config: &SolverConfig,
) -> Vec<CandidateModel> {
    let objective = Objective::for_task(task);

    // Rows of the cell that participate in this task, with their working
    // labels (AvA tasks only see their two classes).
    let members: Vec<(usize, f64)> = cell_rows
        .iter()
        .filter_map(|&r| {
            let label = data.label(r).expect("labeled training data");
            task.working_label(label).map(|wl| (r, wl))
        })
        .collect();

    if members.len() < 2 {
        return all_failed(grid);
    }

    // Deterministic holdout: every folds-th member validates, the rest
    // train. Cells too small to split fall back to resubstitution.
    let (train_members, val_members): (Vec<_>, Vec<_>) = if folds >= 2 && members.len() >= folds {
        let (val, train): (Vec<_>, Vec<_>) = members
            .iter()
            .enumerate()
            .partition(|(p, _)| p % folds == 0);
        (
            train.into_iter().map(|(_, m)| *m).collect(),
            val.into_iter().map(|(_, m)| *m).collect(),
        )
    } else {
        (members.clone(), members.clone())
    };

    let train_rows: Vec<&[f64]> = train_members.iter().map(|&(r, _)| data.row(r)).collect();
    let train_labels: Vec<f64> = train_members.iter().map(|&(_, wl)| wl).collect();
    let n = train_rows.len();

    let dense_ok = n * n * std::mem::size_of::<f64>() <= solver_config.cache_bytes;
    let distances = if kernel_kind.is_radial() && dense_ok {
        Some(squared_distance_matrix(&train_rows))
    } else {
        None
    };

    let n_lambdas = grid.lambdas().len();
    let mut candidates: Vec<Option<CandidateModel>> = vec![None; grid.len()];

    for (gi, &gamma) in grid.gammas().iter().enumerate() {
        let kernel = kernel_kind.build(gamma);
        let gram = if dense_ok {
            Some(gram_matrix(kernel.as_ref(), &train_rows, distances.as_deref()))
        } else {
            None
        };

        // Walk lambda from most to least regularized so each solution
        // warm-starts the next, slightly harder one.
        let mut warm: Option<Vec<f64>> = None;
        for li in (0..n_lambdas).rev() {
            let lambda = grid.lambdas()[li];
            let flat = gi * n_lambdas + li;
            let mut source = match &gram {
                Some(g) => KernelSource::dense(g, n),
                None => KernelSource::lazy(
                    kernel.as_ref(),
                    train_rows.clone(),
                    solver_config.cache_bytes,
                ),
            };

            match solve(
                &mut source,
                &train_labels,
                objective,
                lambda,
                solver_config,
                warm.as_deref(),
            ) {
                Ok(outcome) => {
                    warm = Some(outcome.coefficients.clone());
                    let support = outcome.support_indices();
                    let fit = Fit::new(
                        kernel_kind,
                        gamma,
                        support.iter().map(|&j| train_members[j].0).collect(),
                        support.iter().map(|&j| outcome.coefficients[j]).collect(),
                    );
                    candidates[flat] = Some(evaluate_candidate(
                        data,
                        fit,
                        outcome.sweeps,
                        outcome.converged,
                        outcome.objective,
                        &objective,
                        task,
                        &val_members,
                        flat,
                        gi,
                        li,
                        gamma,
                        lambda,
                    ));
                }
                Err(e) => {
                    warn!("candidate fit failed (gamma {gamma}, lambda {lambda}): {e}");
                    warm = None;
                    candidates[flat] =
                        Some(CandidateModel::failed(flat, gi, li, gamma, lambda));
                }
            }
        }
    }

    candidates
        .into_iter()
        .map(|c| c.expect("every grid point visited"))
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn evaluate_candidate(
    data: &DataMatrix,
    fit: Fit,
    sweeps: usize,
    converged: bool,
    objective_value: f64,
    objective: &Objective,
    task: &TaskSpec,
    val_members: &[(usize, f64)],
    grid_index: usize,
    gamma_index: usize,
    lambda_index: usize,
    gamma: f64,
    lambda: f64,
) -> CandidateModel {
    let kernel = fit.kernel();
    let predictions: Vec<f64> = val_members
        .iter()
        .map(|&(r, _)| fit.decision(data, kernel.as_ref(), data.row(r)))
        .collect();
    let labels: Vec<f64> = val_members.iter().map(|&(_, wl)| wl).collect();

    let val_error = objective
        .mean_loss(&labels, &predictions)
        .unwrap_or(f64::INFINITY);

    let (val_pos_error, val_neg_error) = if task.is_classification() {
        (
            class_error(&labels, &predictions, 1.0),
            class_error(&labels, &predictions, -1.0),
        )
    } else {
        (0.0, 0.0)
    };

    CandidateModel {
        grid_index,
        gamma_index,
        lambda_index,
        gamma,
        lambda,
        fit: Some(fit),
        val_error,
        val_pos_error,
        val_neg_error,
        sweeps,
        converged,
        objective: objective_value,
    }
}

/// Unweighted misclassification rate on one class; 0 when the class is
/// absent from the validation slice.
fn class_error(labels: &[f64], predictions: &[f64], class: f64) -> f64 {
    let mut total = 0usize;
    let mut wrong = 0usize;
    for (&y, &p) in labels.iter().zip(predictions.iter()) {
        if y == class {
            total += 1;
            if y * p <= 0.0 {
                wrong += 1;
            }
        }
    }
    if total == 0 {
        0.0
    } else {
        wrong as f64 / total as f64
    }
}

fn all_failed(grid: &HyperGrid) -> Vec<CandidateModel> {
    grid.points()
        .map(|p| {
            CandidateModel::failed(
                grid.flat_index(&p),
                p.gamma_index,
                p.lambda_index,
                p.gamma,
                p.lambda,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_data(n: usize) -> DataMatrix {
        let values: Vec<f64> = (0..n).map(|i| i as f64 / n as f64).collect();
        let labels: Vec<f64> = values.iter().map(|x| 2.0 * x + 0.5).collect();
        DataMatrix::new(values, n, 1, labels).unwrap()
    }

    fn small_config() -> ConfigStore {
        let mut config = ConfigStore::new();
        config.set("GAMMA_STEPS", "2").unwrap();
        config.set("LAMBDA_STEPS", "2").unwrap();
        config
    }

    #[test]
    fn test_train_produces_full_grid_rows() {
        let data = line_data(30);
        let outcome = run_train(&data, &small_config()).unwrap();

        assert_eq!(outcome.state.tasks.len(), 1);
        assert_eq!(outcome.state.partition.n_cells(), 1);
        assert_eq!(outcome.table.rows(), 4);
        assert_eq!(outcome.table.cols(), DIAG_COLS);
        // All candidates fit on this easy problem.
        for r in 0..outcome.table.rows() {
            assert_eq!(outcome.table.get(r, 10), 1.0);
        }
    }

    #[test]
    fn test_train_row_order_is_task_cell_grid() {
        let data = line_data(40);
        let mut config = small_config();
        config.set("PARTITION_CHOICE", "1").unwrap();
        config.set("CELL_SIZE", "20").unwrap();
        let outcome = run_train(&data, &config).unwrap();

        assert_eq!(outcome.state.partition.n_cells(), 2);
        let mut expected = Vec::new();
        for cell in 0..2 {
            for gi in 0..2 {
                for li in 0..2 {
                    expected.push((0.0, cell as f64, gi as f64, li as f64));
                }
            }
        }
        for (r, &(t, c, gi, li)) in expected.iter().enumerate() {
            assert_eq!(outcome.table.get(r, 0), t);
            assert_eq!(outcome.table.get(r, 1), c);
            assert_eq!(outcome.table.get(r, 2), gi);
            assert_eq!(outcome.table.get(r, 3), li);
        }
    }

    #[test]
    fn test_train_is_deterministic() {
        let data = line_data(50);
        let mut config = small_config();
        config.set("useCells", "1").unwrap();
        config.set("CELL_SIZE", "16").unwrap();

        let a = run_train(&data, &config).unwrap();
        let b = run_train(&data, &config).unwrap();
        assert_eq!(a.table, b.table);
        assert_eq!(a.state.partition, b.state.partition);
    }

    #[test]
    fn test_empty_grid_fails() {
        let data = line_data(10);
        let mut config = ConfigStore::new();
        config.set("GAMMA_STEPS", "0").unwrap();
        assert!(matches!(
            run_train(&data, &config),
            Err(SvmError::TrainingError(_))
        ));
    }

    #[test]
    fn test_tiny_cell_records_failures_without_aborting() {
        // 21 rows in cells of 20 leaves a 1-row cell whose task cannot
        // fit; its candidates carry the failure flag while the big cell
        // trains normally.
        let data = line_data(21);
        let mut config = small_config();
        config.set("PARTITION_CHOICE", "1").unwrap();
        config.set("CELL_SIZE", "20").unwrap();

        let outcome = run_train(&data, &config).unwrap();
        assert_eq!(outcome.table.rows(), 8);
        let cell0_ok: Vec<f64> = (0..4).map(|r| outcome.table.get(r, 10)).collect();
        let cell1_ok: Vec<f64> = (4..8).map(|r| outcome.table.get(r, 10)).collect();
        assert!(cell0_ok.iter().all(|&ok| ok == 1.0));
        assert!(cell1_ok.iter().all(|&ok| ok == 0.0));
    }

    #[test]
    fn test_multiclass_decomposes_tasks() {
        let values: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let labels: Vec<f64> = (0..30).map(|i| (i % 3) as f64).collect();
        let data = DataMatrix::new(values, 30, 1, labels).unwrap();
        let mut config = small_config();
        config.set("SCENARIO", "MC AvA_hinge").unwrap();

        let outcome = run_train(&data, &config).unwrap();
        assert_eq!(outcome.state.tasks.len(), 3);
        assert_eq!(outcome.table.rows(), 3 * 4);
    }

    #[test]
    fn test_threads_override_matches_serial() {
        let data = line_data(40);
        let mut serial = small_config();
        serial.set("THREADS", "1").unwrap();
        let mut parallel = small_config();
        parallel.set("THREADS", "4").unwrap();

        let a = run_train(&data, &serial).unwrap();
        let b = run_train(&data, &parallel).unwrap();
        assert_eq!(a.table, b.table);
    }
}
