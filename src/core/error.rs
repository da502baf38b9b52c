//! Error types for the SVM engine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SvmError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid session handle: {0}")]
    InvalidHandle(i32),

    #[error("Session has not been trained yet")]
    NotTrained,

    #[error("No model has been selected yet")]
    NotSelected,

    #[error("Training failed: {0}")]
    TrainingError(String),

    #[error("Malformed result buffer: {0}")]
    ProtocolError(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),
}

pub type Result<T> = std::result::Result<T, SvmError>;
