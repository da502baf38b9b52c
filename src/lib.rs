//! Rust implementation of a staged SVM training engine
//!
//! Sessions ingest a training set once and then move through a three
//! stage pipeline: train() fits candidate models for every task, cell
//! and hyperparameter grid point; select() promotes the best candidate
//! per (task, cell) by validation error; test() applies the selected
//! models to new data. Learning scenarios cover least squares and
//! quantile/expectile regression, binary and multiclass classification,
//! ROC sweeps and Neyman-Pearson learning.

pub mod api;
pub mod cache;
pub mod config;
pub mod core;
pub mod data;
pub mod grid;
pub mod kernel;
pub mod model;
pub mod partition;
pub mod predict;
pub mod registry;
pub mod scenario;
pub mod select;
pub mod session;
pub mod solver;
pub mod train;

// Re-export main types for convenience
pub use crate::api::Svm;
pub use crate::config::{ConfigStore, ParamKey, Stage};
pub use crate::core::{DataMatrix, Result, ResultTable, SvmError};
pub use crate::kernel::{Kernel, KernelKind};
pub use crate::scenario::{McType, Scenario};
pub use crate::session::Session;

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
