//! Core types shared across the SVM engine

pub mod error;
pub mod table;
pub mod types;

pub use self::error::*;
pub use self::table::*;
pub use self::types::*;
