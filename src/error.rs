//! Error types.
//!
//! - `PlanError` is the typed taxonomy the library returns.
//! - `AppError` is what the `dplan` binary prints before exiting with a code.

use thiserror::Error;

use crate::domain::ModelChoice;

/// Failures surfaced by the planning pipeline.
///
/// Numeric problems (negative sales, negative or runaway forecasts) are never
/// errors: they are clamped in place and reported through diagnostics.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlanError {
    /// A required column could not be identified in an upload.
    #[error("schema error: {0}")]
    Schema(String),

    /// The selected model needs more history than the series has.
    #[error("insufficient history for {model}: need {required} observations, have {available}")]
    InsufficientHistory {
        model: ModelChoice,
        required: usize,
        available: usize,
    },

    /// The requested SKU is absent from the cleaned dataset.
    #[error("no data for SKU '{0}'")]
    NoDataForSku(String),

    /// A strategy or model setting is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Reading or writing a file failed.
    #[error("io error: {0}")]
    Io(String),

    /// A file was readable but its content could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// A model fit failed numerically (singular or non-finite system).
    #[error("numeric failure: {0}")]
    Numeric(String),
}

impl PlanError {
    /// Exit code used by the binary for this error class.
    pub fn exit_code(&self) -> u8 {
        match self {
            PlanError::Schema(_) | PlanError::InvalidConfig(_) | PlanError::Parse(_) => 2,
            PlanError::NoDataForSku(_) | PlanError::InsufficientHistory { .. } => 3,
            PlanError::Io(_) | PlanError::Numeric(_) => 4,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<PlanError> for AppError {
    fn from(err: PlanError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
