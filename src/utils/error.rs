//! Error Handling Module
//!
//! Defines the error taxonomy for the evaluation harness.
//! Uses thiserror for ergonomic error definitions.
//!
//! Every failure in the evaluation pipeline is unrecoverable locally and
//! propagates to `main`, which maps it to a process exit code via
//! [`EvalError::exit_code`]. There is no retry logic anywhere in the
//! pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for evaluation-harness operations
#[derive(Error, Debug)]
pub enum EvalError {
    /// The requested model identifier is not one of the supported variants
    #[error("Model '{0}' is not supported (expected one of: basic_dw, basic_vw, shuffle_dw, shuffle_vw)")]
    UnsupportedModel(String),

    /// Configuration rejected by validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// The weight artifact does not exist on disk
    #[error("Weight file does not exist at '{0}'")]
    WeightFileNotFound(PathBuf),

    /// The weight artifact does not structurally match the model's parameters
    #[error("Weight artifact does not match the model's parameter schema: {0}")]
    WeightSchemaMismatch(String),

    /// A compute device could not be used as planned
    #[error("Device placement failed: {0}")]
    DevicePlacement(String),

    /// Error scanning or decoding the validation dataset
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EvalError {
    /// Process exit code for this failure.
    ///
    /// The missing-weight-file code is distinguished from generic failure so
    /// a supervising process can tell "fix the path" apart from everything
    /// else.
    pub fn exit_code(&self) -> u8 {
        match self {
            EvalError::UnsupportedModel(_) | EvalError::Config(_) => 2,
            EvalError::WeightFileNotFound(_) => 3,
            EvalError::WeightSchemaMismatch(_) => 4,
            EvalError::DevicePlacement(_) => 5,
            EvalError::Dataset(_) | EvalError::Io(_) => 1,
        }
    }
}

/// Convenience Result type for evaluation-harness operations
pub type Result<T> = std::result::Result<T, EvalError>;
