//! Learning scenarios and their task decomposition
//!
//! A scenario is the learning-task family controlling the loss function
//! and how a session decomposes into independent tasks: one regression
//! task, one binary sub-classifier per class (or class pair), one task per
//! quantile/expectile level, or one weighted classifier per ROC/NPL weight
//! step.

use std::fmt;
use std::str::FromStr;

use crate::config::ConfigStore;
use crate::core::{DataMatrix, Result, SvmError};

/// Multiclass reduction scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McType {
    AvaHinge,
    OvaLs,
    OvaHinge,
    AvaLs,
}

impl McType {
    fn token(&self) -> &'static str {
        match self {
            McType::AvaHinge => "AvA_hinge",
            McType::OvaLs => "OvA_ls",
            McType::OvaHinge => "OvA_hinge",
            McType::AvaLs => "AvA_ls",
        }
    }

    fn parse(token: &str) -> Option<Self> {
        match token.to_lowercase().as_str() {
            "ava_hinge" => Some(McType::AvaHinge),
            "ova_ls" => Some(McType::OvaLs),
            "ova_hinge" => Some(McType::OvaHinge),
            "ava_ls" => Some(McType::AvaLs),
            _ => None,
        }
    }

    /// Whether the reduction is all-versus-all (one task per class pair).
    pub fn is_ava(&self) -> bool {
        matches!(self, McType::AvaHinge | McType::AvaLs)
    }

    /// Whether the binary subproblems use the hinge loss (as opposed to
    /// least squares on ±1 labels).
    pub fn is_hinge(&self) -> bool {
        matches!(self, McType::AvaHinge | McType::OvaHinge)
    }
}

/// The learning-task family of a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scenario {
    /// Non-parametric least squares regression.
    LeastSquares,
    /// Binary or multiclass classification via binary reductions.
    MultiClass(McType),
    /// Quantile regression with the pinball loss.
    Quantile,
    /// Expectile regression with the asymmetric least squares loss.
    Expectile,
    /// Weighted binary classification sweep over ROC weights.
    Roc,
    /// Neyman-Pearson learning constraining one error type.
    Npl { class: i64 },
}

impl Scenario {
    /// The solver-type token reported through `SVM_TYPE`.
    pub fn svm_type(&self) -> &'static str {
        match self {
            Scenario::LeastSquares => "LS_SVM",
            Scenario::MultiClass(mc) if mc.is_hinge() => "HINGE_SVM",
            Scenario::MultiClass(_) => "LS_SVM",
            Scenario::Quantile => "QUANTILE_SVM",
            Scenario::Expectile => "EXPECTILE_SVM",
            Scenario::Roc | Scenario::Npl { .. } => "HINGE_SVM",
        }
    }

    /// Whether select() sweeps over an auxiliary weight index.
    pub fn is_weight_sweep(&self) -> bool {
        matches!(
            self,
            Scenario::Quantile | Scenario::Expectile | Scenario::Roc
        )
    }

    /// Default quantile/expectile levels when `WEIGHTS` is unset.
    pub const DEFAULT_LEVELS: [f64; 5] = [0.05, 0.1, 0.5, 0.9, 0.95];

    /// Effective sweep weights for this scenario under a configuration.
    ///
    /// Quantile/expectile scenarios use the configured `WEIGHTS` (falling
    /// back to the default levels); ROC and NPL derive `WEIGHT_STEPS`
    /// evenly spaced class-weight ratios in (0, 1).
    pub fn sweep_weights(&self, config: &ConfigStore) -> Vec<f64> {
        match self {
            Scenario::Quantile | Scenario::Expectile => {
                let configured = config.weights();
                if configured.is_empty() {
                    Self::DEFAULT_LEVELS.to_vec()
                } else {
                    configured
                }
            }
            Scenario::Roc | Scenario::Npl { .. } => {
                let steps = config.weight_steps();
                (1..=steps)
                    .map(|j| j as f64 / (steps + 1) as f64)
                    .collect()
            }
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scenario::LeastSquares => write!(f, "LS"),
            Scenario::MultiClass(mc) => write!(f, "MC {}", mc.token()),
            Scenario::Quantile => write!(f, "QT"),
            Scenario::Expectile => write!(f, "EX"),
            Scenario::Roc => write!(f, "ROC"),
            Scenario::Npl { class } => write!(f, "NPL {class}"),
        }
    }
}

impl FromStr for Scenario {
    type Err = SvmError;

    fn from_str(s: &str) -> Result<Self> {
        let mut tokens = s.split_whitespace();
        let head = tokens
            .next()
            .ok_or_else(|| SvmError::InvalidParameter("empty scenario".to_string()))?;
        let tail: Vec<&str> = tokens.collect();
        let scenario = match head.to_uppercase().as_str() {
            "LS" => Scenario::LeastSquares,
            "MC" => {
                let mc = match tail.first() {
                    Some(token) => McType::parse(token).ok_or_else(|| {
                        SvmError::InvalidParameter(format!(
                            "unknown multiclass type '{token}'"
                        ))
                    })?,
                    None => McType::AvaHinge,
                };
                Scenario::MultiClass(mc)
            }
            "QT" => Scenario::Quantile,
            "EX" => Scenario::Expectile,
            "ROC" => Scenario::Roc,
            "NPL" => {
                let class = match tail.first() {
                    Some(token) => token.parse().map_err(|_| {
                        SvmError::InvalidParameter(format!("invalid NPL class '{token}'"))
                    })?,
                    None => 1,
                };
                if class != 1 && class != -1 {
                    return Err(SvmError::InvalidParameter(format!(
                        "NPL class must be 1 or -1, got {class}"
                    )));
                }
                Scenario::Npl { class }
            }
            other => {
                return Err(SvmError::InvalidParameter(format!(
                    "unknown scenario '{other}'"
                )))
            }
        };
        Ok(scenario)
    }
}

/// One independent sub-problem within a training pass.
///
/// All tasks of a pass share the same partition; each has its own
/// hyperparameter grid and its own selected model per cell.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskSpec {
    /// Plain regression on the raw labels.
    Regression,
    /// Binary classification of one class against all others.
    OneVersusAll { class: f64, hinge: bool },
    /// Binary classification of class `pos` against class `neg`, on the
    /// rows of those two classes only.
    AllVersusAll { pos: f64, neg: f64, hinge: bool },
    /// Pinball-loss regression at one quantile level.
    QuantileLevel { tau: f64 },
    /// Asymmetric least squares at one expectile level.
    ExpectileLevel { tau: f64 },
    /// Weighted binary classification at one ROC/NPL weight.
    WeightedBinary { rho: f64 },
}

impl TaskSpec {
    /// Whether the task is a binary classification problem.
    pub fn is_classification(&self) -> bool {
        matches!(
            self,
            TaskSpec::OneVersusAll { .. }
                | TaskSpec::AllVersusAll { .. }
                | TaskSpec::WeightedBinary { .. }
        )
    }

    /// The ±1 working label for a raw label, or `None` when the row does
    /// not participate in this task.
    pub fn working_label(&self, label: f64) -> Option<f64> {
        match self {
            TaskSpec::Regression
            | TaskSpec::QuantileLevel { .. }
            | TaskSpec::ExpectileLevel { .. } => Some(label),
            TaskSpec::OneVersusAll { class, .. } => {
                Some(if label == *class { 1.0 } else { -1.0 })
            }
            TaskSpec::AllVersusAll { pos, neg, .. } => {
                if label == *pos {
                    Some(1.0)
                } else if label == *neg {
                    Some(-1.0)
                } else {
                    None
                }
            }
            TaskSpec::WeightedBinary { .. } => Some(if label > 0.0 { 1.0 } else { -1.0 }),
        }
    }
}

/// Decompose a scenario into its ordered task list for a training set.
///
/// Classification scenarios enumerate the distinct labels; binary data
/// under OvA collapses to a single task so a two-class problem is not
/// trained twice.
pub fn decompose(
    scenario: Scenario,
    data: &DataMatrix,
    config: &ConfigStore,
) -> Result<Vec<TaskSpec>> {
    let tasks = match scenario {
        Scenario::LeastSquares => vec![TaskSpec::Regression],
        Scenario::MultiClass(mc) => {
            let classes = data.distinct_labels();
            if classes.len() < 2 {
                return Err(SvmError::TrainingError(format!(
                    "classification needs at least 2 classes, found {}",
                    classes.len()
                )));
            }
            if classes.len() == 2 {
                vec![TaskSpec::AllVersusAll {
                    pos: classes[1],
                    neg: classes[0],
                    hinge: mc.is_hinge(),
                }]
            } else if mc.is_ava() {
                let mut tasks = Vec::new();
                for i in 0..classes.len() {
                    for j in (i + 1)..classes.len() {
                        tasks.push(TaskSpec::AllVersusAll {
                            pos: classes[i],
                            neg: classes[j],
                            hinge: mc.is_hinge(),
                        });
                    }
                }
                tasks
            } else {
                classes
                    .iter()
                    .map(|&class| TaskSpec::OneVersusAll {
                        class,
                        hinge: mc.is_hinge(),
                    })
                    .collect()
            }
        }
        Scenario::Quantile => scenario
            .sweep_weights(config)
            .into_iter()
            .map(|tau| TaskSpec::QuantileLevel { tau })
            .collect(),
        Scenario::Expectile => scenario
            .sweep_weights(config)
            .into_iter()
            .map(|tau| TaskSpec::ExpectileLevel { tau })
            .collect(),
        Scenario::Roc | Scenario::Npl { .. } => {
            let classes = data.distinct_labels();
            if classes.len() != 2 {
                return Err(SvmError::TrainingError(format!(
                    "{scenario} requires binary labels, found {} classes",
                    classes.len()
                )));
            }
            scenario
                .sweep_weights(config)
                .into_iter()
                .map(|rho| TaskSpec::WeightedBinary { rho })
                .collect()
        }
    };
    for spec in &tasks {
        if let TaskSpec::QuantileLevel { tau } | TaskSpec::ExpectileLevel { tau } = spec {
            if !(0.0..=1.0).contains(tau) || *tau == 0.0 || *tau == 1.0 {
                return Err(SvmError::InvalidParameter(format!(
                    "quantile/expectile level must lie in (0, 1), got {tau}"
                )));
            }
        }
    }
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labeled(labels: Vec<f64>) -> DataMatrix {
        let n = labels.len();
        DataMatrix::new(vec![0.0; n], n, 1, labels).unwrap()
    }

    #[test]
    fn test_scenario_parse_display_roundtrip() {
        for text in ["LS", "MC AvA_hinge", "MC OvA_ls", "QT", "EX", "ROC", "NPL 1", "NPL -1"] {
            let scenario: Scenario = text.parse().unwrap();
            assert_eq!(scenario.to_string(), text);
        }
    }

    #[test]
    fn test_scenario_defaults() {
        assert_eq!("MC".parse::<Scenario>().unwrap(), Scenario::MultiClass(McType::AvaHinge));
        assert_eq!("NPL".parse::<Scenario>().unwrap(), Scenario::Npl { class: 1 });
        assert!("NPL 3".parse::<Scenario>().is_err());
        assert!("BOGUS".parse::<Scenario>().is_err());
    }

    #[test]
    fn test_decompose_regression() {
        let data = labeled(vec![0.5, 1.5, 2.5]);
        let tasks = decompose(Scenario::LeastSquares, &data, &ConfigStore::new()).unwrap();
        assert_eq!(tasks, vec![TaskSpec::Regression]);
    }

    #[test]
    fn test_decompose_binary_collapses() {
        let data = labeled(vec![1.0, -1.0, 1.0]);
        let tasks = decompose(
            Scenario::MultiClass(McType::OvaHinge),
            &data,
            &ConfigStore::new(),
        )
        .unwrap();
        assert_eq!(tasks.len(), 1);
        assert!(matches!(tasks[0], TaskSpec::AllVersusAll { .. }));
    }

    #[test]
    fn test_decompose_ava_pairs() {
        let data = labeled(vec![0.0, 1.0, 2.0, 0.0, 1.0, 2.0]);
        let tasks = decompose(
            Scenario::MultiClass(McType::AvaHinge),
            &data,
            &ConfigStore::new(),
        )
        .unwrap();
        assert_eq!(tasks.len(), 3);

        let ova = decompose(
            Scenario::MultiClass(McType::OvaLs),
            &data,
            &ConfigStore::new(),
        )
        .unwrap();
        assert_eq!(ova.len(), 3);
        assert!(ova.iter().all(|t| matches!(t, TaskSpec::OneVersusAll { hinge: false, .. })));
    }

    #[test]
    fn test_decompose_quantile_uses_default_levels() {
        let data = labeled(vec![0.0, 1.0, 2.0]);
        let tasks = decompose(Scenario::Quantile, &data, &ConfigStore::new()).unwrap();
        assert_eq!(tasks.len(), Scenario::DEFAULT_LEVELS.len());
        assert_eq!(tasks[2], TaskSpec::QuantileLevel { tau: 0.5 });
    }

    #[test]
    fn test_decompose_roc_weight_grid() {
        let data = labeled(vec![1.0, -1.0, 1.0, -1.0]);
        let mut config = ConfigStore::new();
        config.set("WEIGHT_STEPS", "3").unwrap();
        let tasks = decompose(Scenario::Roc, &data, &config).unwrap();
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[1], TaskSpec::WeightedBinary { rho: 0.5 });
    }

    #[test]
    fn test_invalid_levels_rejected() {
        let data = labeled(vec![0.0, 1.0]);
        let mut config = ConfigStore::new();
        config.set("WEIGHTS", "0 0.5").unwrap();
        assert!(decompose(Scenario::Quantile, &data, &config).is_err());
    }

    #[test]
    fn test_working_labels() {
        let task = TaskSpec::AllVersusAll {
            pos: 2.0,
            neg: 0.0,
            hinge: true,
        };
        assert_eq!(task.working_label(2.0), Some(1.0));
        assert_eq!(task.working_label(0.0), Some(-1.0));
        assert_eq!(task.working_label(1.0), None);

        let ova = TaskSpec::OneVersusAll {
            class: 1.0,
            hinge: false,
        };
        assert_eq!(ova.working_label(1.0), Some(1.0));
        assert_eq!(ova.working_label(3.0), Some(-1.0));
    }
}
