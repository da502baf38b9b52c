//! Data loading for the command-line interface
//!
//! The engine itself ingests in-memory matrices; this module only covers
//! reading those matrices from files.

pub mod csv;

pub use self::csv::*;
