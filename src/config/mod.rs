//! Per-session configuration store
//!
//! Parameters are a closed enumeration of known keys, each with a declared
//! value shape and validator. Names are normalized to canonical upper case
//! before lookup, so `set("display", ..)` and `get("DISPLAY")` agree.
//! Unknown keys are rejected at the boundary instead of silently ignored.
//!
//! Each pipeline stage has a canonical configuration line: an ordered token
//! sequence mimicking a command-line invocation (`svm-train -display 1 ...`).
//! Per-call argv overrides are parsed back into (key, value) pairs with
//! later-occurrence-wins semantics.

use std::collections::BTreeMap;

use crate::core::{Result, SvmError};
use crate::scenario::Scenario;

/// Pipeline stage, also the numeric code used at the external boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Train = 1,
    Select = 2,
    Test = 3,
}

impl Stage {
    /// Map the external stage code to a stage.
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            1 => Ok(Stage::Train),
            2 => Ok(Stage::Select),
            3 => Ok(Stage::Test),
            other => Err(SvmError::InvalidInput(format!(
                "unknown stage code {other}"
            ))),
        }
    }

    /// Conventional program-name placeholder for this stage's config line.
    pub fn program_name(&self) -> &'static str {
        match self {
            Stage::Train => "svm-train",
            Stage::Select => "svm-select",
            Stage::Test => "svm-test",
        }
    }
}

/// The closed set of configuration parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ParamKey {
    Scenario,
    SvmType,
    Kernel,
    PartitionChoice,
    CellSize,
    UseCells,
    GridChoice,
    GammaSteps,
    MinGamma,
    MaxGamma,
    LambdaSteps,
    MinLambda,
    MaxLambda,
    Folds,
    Epsilon,
    MaxIterations,
    Threads,
    Display,
    Weights,
    WeightNumber,
    WeightSteps,
    NplClass,
    NplConstraint,
}

/// Value shape accepted by a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Scenario,
    Integer,
    Float,
    FloatList,
    Bool,
}

/// Partition-choice code enabling spatial cell partitioning, the value
/// `useCells = true` maps to.
pub const PARTITION_CELLS: i64 = 6;

/// Partition-choice code for the trivial single-cell partition.
pub const PARTITION_NONE: i64 = 0;

impl ParamKey {
    /// All keys in canonical ordering (also the config-line ordering).
    pub const ALL: [ParamKey; 23] = [
        ParamKey::Scenario,
        ParamKey::SvmType,
        ParamKey::Kernel,
        ParamKey::PartitionChoice,
        ParamKey::CellSize,
        ParamKey::UseCells,
        ParamKey::GridChoice,
        ParamKey::GammaSteps,
        ParamKey::MinGamma,
        ParamKey::MaxGamma,
        ParamKey::LambdaSteps,
        ParamKey::MinLambda,
        ParamKey::MaxLambda,
        ParamKey::Folds,
        ParamKey::Epsilon,
        ParamKey::MaxIterations,
        ParamKey::Threads,
        ParamKey::Display,
        ParamKey::Weights,
        ParamKey::WeightNumber,
        ParamKey::WeightSteps,
        ParamKey::NplClass,
        ParamKey::NplConstraint,
    ];

    /// Canonical upper-case name.
    pub fn name(&self) -> &'static str {
        match self {
            ParamKey::Scenario => "SCENARIO",
            ParamKey::SvmType => "SVM_TYPE",
            ParamKey::Kernel => "KERNEL",
            ParamKey::PartitionChoice => "PARTITION_CHOICE",
            ParamKey::CellSize => "CELL_SIZE",
            ParamKey::UseCells => "USECELLS",
            ParamKey::GridChoice => "GRID_CHOICE",
            ParamKey::GammaSteps => "GAMMA_STEPS",
            ParamKey::MinGamma => "MIN_GAMMA",
            ParamKey::MaxGamma => "MAX_GAMMA",
            ParamKey::LambdaSteps => "LAMBDA_STEPS",
            ParamKey::MinLambda => "MIN_LAMBDA",
            ParamKey::MaxLambda => "MAX_LAMBDA",
            ParamKey::Folds => "FOLDS",
            ParamKey::Epsilon => "EPSILON",
            ParamKey::MaxIterations => "MAX_ITERATIONS",
            ParamKey::Threads => "THREADS",
            ParamKey::Display => "DISPLAY",
            ParamKey::Weights => "WEIGHTS",
            ParamKey::WeightNumber => "WEIGHT_NUMBER",
            ParamKey::WeightSteps => "WEIGHT_STEPS",
            ParamKey::NplClass => "NPL_CLASS",
            ParamKey::NplConstraint => "NPL_CONSTRAINT",
        }
    }

    /// Look up a key by name, case-insensitively.
    pub fn parse(name: &str) -> Result<Self> {
        let canonical = name.trim().to_uppercase();
        ParamKey::ALL
            .iter()
            .copied()
            .find(|k| k.name() == canonical)
            .ok_or_else(|| SvmError::InvalidParameter(format!("unknown parameter '{name}'")))
    }

    fn value_kind(&self) -> ValueKind {
        match self {
            ParamKey::Scenario | ParamKey::SvmType => ValueKind::Scenario,
            ParamKey::UseCells => ValueKind::Bool,
            ParamKey::Kernel
            | ParamKey::PartitionChoice
            | ParamKey::CellSize
            | ParamKey::GridChoice
            | ParamKey::GammaSteps
            | ParamKey::LambdaSteps
            | ParamKey::Folds
            | ParamKey::MaxIterations
            | ParamKey::Threads
            | ParamKey::Display
            | ParamKey::WeightNumber
            | ParamKey::WeightSteps
            | ParamKey::NplClass => ValueKind::Integer,
            ParamKey::MinGamma
            | ParamKey::MaxGamma
            | ParamKey::MinLambda
            | ParamKey::MaxLambda
            | ParamKey::Epsilon
            | ParamKey::NplConstraint => ValueKind::Float,
            ParamKey::Weights => ValueKind::FloatList,
        }
    }

    /// Built-in default rendering, or `None` for keys that read as empty
    /// until explicitly set.
    fn default_value(&self) -> Option<&'static str> {
        match self {
            ParamKey::Scenario | ParamKey::SvmType | ParamKey::Weights => None,
            ParamKey::Kernel => Some("0"),
            ParamKey::PartitionChoice => Some("0"),
            ParamKey::CellSize => Some("2000"),
            ParamKey::UseCells => Some("0"),
            ParamKey::GridChoice => Some("0"),
            ParamKey::GammaSteps => Some("10"),
            ParamKey::MinGamma => Some("0.01"),
            ParamKey::MaxGamma => Some("10"),
            ParamKey::LambdaSteps => Some("10"),
            ParamKey::MinLambda => Some("0.0001"),
            ParamKey::MaxLambda => Some("1"),
            ParamKey::Folds => Some("5"),
            ParamKey::Epsilon => Some("0.001"),
            ParamKey::MaxIterations => Some("1000"),
            ParamKey::Threads => Some("0"),
            ParamKey::Display => Some("0"),
            ParamKey::WeightNumber => Some("0"),
            ParamKey::WeightSteps => Some("9"),
            ParamKey::NplClass => Some("1"),
            ParamKey::NplConstraint => Some("0.05"),
        }
    }

    /// Stages whose config line carries this key.
    fn stages(&self) -> &'static [Stage] {
        use Stage::*;
        match self {
            ParamKey::Scenario
            | ParamKey::Kernel
            | ParamKey::PartitionChoice
            | ParamKey::CellSize
            | ParamKey::GridChoice
            | ParamKey::GammaSteps
            | ParamKey::MinGamma
            | ParamKey::MaxGamma
            | ParamKey::LambdaSteps
            | ParamKey::MinLambda
            | ParamKey::MaxLambda
            | ParamKey::Weights
            | ParamKey::WeightSteps
            | ParamKey::Epsilon
            | ParamKey::MaxIterations => &[Train],
            ParamKey::Folds => &[Train, Select],
            ParamKey::WeightNumber
            | ParamKey::NplClass
            | ParamKey::NplConstraint => &[Select],
            ParamKey::Display | ParamKey::Threads => &[Train, Select, Test],
            // Derived keys never appear on config lines.
            ParamKey::SvmType | ParamKey::UseCells => &[],
        }
    }

    /// Validate a raw value and return its canonical string form.
    fn canonicalize(&self, value: &str) -> Result<String> {
        let value = value.trim();
        let invalid = || {
            SvmError::InvalidParameter(format!(
                "invalid value '{}' for parameter {}",
                value,
                self.name()
            ))
        };
        match self.value_kind() {
            ValueKind::Scenario => {
                let scenario: Scenario = value.parse()?;
                Ok(scenario.to_string())
            }
            ValueKind::Integer => {
                let n: i64 = value.parse().map_err(|_| invalid())?;
                Ok(n.to_string())
            }
            ValueKind::Float => {
                let x: f64 = value.parse().map_err(|_| invalid())?;
                if !x.is_finite() {
                    return Err(invalid());
                }
                Ok(format_float(x))
            }
            ValueKind::FloatList => {
                if value.is_empty() {
                    return Err(invalid());
                }
                let parsed: std::result::Result<Vec<f64>, _> =
                    value.split_whitespace().map(str::parse).collect();
                let list = parsed.map_err(|_| invalid())?;
                if list.iter().any(|x| !x.is_finite()) {
                    return Err(invalid());
                }
                Ok(list
                    .iter()
                    .map(|x| format_float(*x))
                    .collect::<Vec<_>>()
                    .join(" "))
            }
            ValueKind::Bool => match value {
                "1" | "true" | "True" | "TRUE" => Ok("1".to_string()),
                "0" | "false" | "False" | "FALSE" => Ok("0".to_string()),
                _ => Err(invalid()),
            },
        }
    }
}

fn format_float(x: f64) -> String {
    format!("{x}")
}

/// Per-session mapping of configuration parameters to values.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    values: BTreeMap<ParamKey, String>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter by name.
    ///
    /// `useCells` is sugar: true maps to the spatial cell partition code,
    /// false to the no-partition code, stored under `PARTITION_CHOICE`.
    /// `SVM_TYPE` is derived from the scenario and cannot be set directly.
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        let key = ParamKey::parse(name)?;
        match key {
            ParamKey::SvmType => Err(SvmError::InvalidParameter(
                "SVM_TYPE is derived from SCENARIO and cannot be set".to_string(),
            )),
            ParamKey::UseCells => {
                let canonical = key.canonicalize(value)?;
                let code = if canonical == "1" {
                    PARTITION_CELLS
                } else {
                    PARTITION_NONE
                };
                self.values
                    .insert(ParamKey::PartitionChoice, code.to_string());
                Ok(())
            }
            _ => {
                let canonical = key.canonicalize(value)?;
                self.values.insert(key, canonical);
                Ok(())
            }
        }
    }

    /// Get a parameter's canonical value by name.
    ///
    /// Unset keys with a built-in default return that default; keys without
    /// one (scenario, weights) return the empty string until set.
    pub fn get(&self, name: &str) -> Result<String> {
        let key = ParamKey::parse(name)?;
        Ok(match key {
            ParamKey::SvmType => self
                .scenario()
                .map(|s| s.svm_type().to_string())
                .unwrap_or_default(),
            ParamKey::UseCells => {
                if self.partition_choice() == PARTITION_CELLS {
                    "1".to_string()
                } else {
                    "0".to_string()
                }
            }
            _ => self.raw(key),
        })
    }

    fn raw(&self, key: ParamKey) -> String {
        self.values
            .get(&key)
            .cloned()
            .or_else(|| key.default_value().map(str::to_string))
            .unwrap_or_default()
    }

    fn int(&self, key: ParamKey) -> i64 {
        self.raw(key).parse().unwrap_or(0)
    }

    fn float(&self, key: ParamKey) -> f64 {
        self.raw(key).parse().unwrap_or(0.0)
    }

    /// The configured scenario, or `None` while unset. An unset scenario
    /// defaults to plain least-squares regression at train time.
    pub fn scenario(&self) -> Option<Scenario> {
        self.values
            .get(&ParamKey::Scenario)
            .and_then(|s| s.parse().ok())
    }

    pub fn kernel_code(&self) -> i64 {
        self.int(ParamKey::Kernel)
    }

    pub fn partition_choice(&self) -> i64 {
        self.int(ParamKey::PartitionChoice)
    }

    pub fn cell_size(&self) -> usize {
        self.int(ParamKey::CellSize).max(1) as usize
    }

    pub fn grid_choice(&self) -> i64 {
        self.int(ParamKey::GridChoice)
    }

    /// Whether a key was explicitly set (as opposed to defaulted).
    pub fn is_set(&self, key: ParamKey) -> bool {
        self.values.contains_key(&key)
    }

    pub fn gamma_steps(&self) -> usize {
        self.int(ParamKey::GammaSteps).max(0) as usize
    }

    pub fn min_gamma(&self) -> f64 {
        self.float(ParamKey::MinGamma)
    }

    pub fn max_gamma(&self) -> f64 {
        self.float(ParamKey::MaxGamma)
    }

    pub fn lambda_steps(&self) -> usize {
        self.int(ParamKey::LambdaSteps).max(0) as usize
    }

    pub fn min_lambda(&self) -> f64 {
        self.float(ParamKey::MinLambda)
    }

    pub fn max_lambda(&self) -> f64 {
        self.float(ParamKey::MaxLambda)
    }

    pub fn folds(&self) -> usize {
        self.int(ParamKey::Folds).max(1) as usize
    }

    pub fn epsilon(&self) -> f64 {
        let eps = self.float(ParamKey::Epsilon);
        if eps > 0.0 {
            eps
        } else {
            1e-3
        }
    }

    pub fn max_iterations(&self) -> usize {
        self.int(ParamKey::MaxIterations).max(1) as usize
    }

    pub fn threads(&self) -> usize {
        self.int(ParamKey::Threads).max(0) as usize
    }

    pub fn display(&self) -> i64 {
        self.int(ParamKey::Display)
    }

    /// Explicitly configured sweep weights, or empty while unset.
    pub fn weights(&self) -> Vec<f64> {
        self.values
            .get(&ParamKey::Weights)
            .map(|s| {
                s.split_whitespace()
                    .filter_map(|t| t.parse().ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 1-based sweep index for select passes; 0 selects every sweep task.
    pub fn weight_number(&self) -> usize {
        self.int(ParamKey::WeightNumber).max(0) as usize
    }

    pub fn weight_steps(&self) -> usize {
        self.int(ParamKey::WeightSteps).max(1) as usize
    }

    pub fn npl_class(&self) -> i64 {
        self.int(ParamKey::NplClass)
    }

    pub fn npl_constraint(&self) -> f64 {
        self.float(ParamKey::NplConstraint)
    }

    /// Render the canonical ordered token line for a stage.
    ///
    /// The first token is a conventional program-name placeholder; the rest
    /// are `-name value` pairs for every stage-applicable key with an
    /// effective value. Callers append their own pairs; later occurrences
    /// of a flag win.
    pub fn config_line(&self, stage: Stage) -> String {
        let mut tokens = vec![stage.program_name().to_string()];
        for key in ParamKey::ALL {
            if !key.stages().contains(&stage) {
                continue;
            }
            let value = self.raw(key);
            if value.is_empty() {
                continue;
            }
            tokens.push(format!("-{}", key.name().to_lowercase()));
            tokens.push(value);
        }
        tokens.join(" ")
    }

    /// Apply parsed argv overrides, returning the effective store for one
    /// call. The session's own store is left untouched.
    pub fn with_overrides(&self, overrides: &[(ParamKey, String)]) -> Result<ConfigStore> {
        let mut effective = self.clone();
        for (key, value) in overrides {
            effective.set(key.name(), value)?;
        }
        Ok(effective)
    }
}

/// Parse a command-line-style token sequence into (key, value) overrides.
///
/// The first token is skipped as the program-name placeholder. A token
/// starting with `-` whose remainder names a known parameter opens a flag;
/// subsequent tokens up to the next flag form its (space-joined) value.
/// Numeric tokens such as `-0.5` are values, not flags. Duplicate flags are
/// kept in order so that a later occurrence wins when applied.
pub fn parse_overrides(args: &[String]) -> Result<Vec<(ParamKey, String)>> {
    let mut overrides: Vec<(ParamKey, String)> = Vec::new();
    let mut current: Option<(ParamKey, Vec<String>)> = None;

    for token in args.iter().skip(1) {
        if let Some(name) = flag_name(token) {
            let key = ParamKey::parse(name)?;
            if let Some((prev, values)) = current.take() {
                push_override(&mut overrides, prev, values)?;
            }
            current = Some((key, Vec::new()));
        } else {
            match current.as_mut() {
                Some((_, values)) => values.push(token.clone()),
                None => {
                    return Err(SvmError::InvalidInput(format!(
                        "unexpected token '{token}' before any flag"
                    )))
                }
            }
        }
    }
    if let Some((key, values)) = current.take() {
        push_override(&mut overrides, key, values)?;
    }
    Ok(overrides)
}

fn push_override(
    overrides: &mut Vec<(ParamKey, String)>,
    key: ParamKey,
    values: Vec<String>,
) -> Result<()> {
    if values.is_empty() {
        return Err(SvmError::InvalidParameter(format!(
            "flag -{} is missing a value",
            key.name().to_lowercase()
        )));
    }
    overrides.push((key, values.join(" ")));
    Ok(())
}

/// A token is a flag if it starts with `-` and its remainder is not a
/// number (so negative values never masquerade as flags).
fn flag_name(token: &str) -> Option<&str> {
    let rest = token.strip_prefix('-')?;
    if rest.is_empty() || rest.parse::<f64>().is_ok() {
        return None;
    }
    Some(rest)
}
