//! Error types.
//!
//! - `CvError` is the domain taxonomy raised by the scorer, fold machinery,
//!   grid evaluator, and selector.
//! - `AppError` is the application boundary: a message plus the process exit code.
//!
//! Exit codes:
//! - 2: bad input / configuration
//! - 3: insufficient data
//! - 4: fit or numeric failure

use thiserror::Error;

use crate::domain::FoldSplit;

#[derive(Debug, Clone, Error)]
pub enum CvError {
    #[error("Input length mismatch: {what} has length {actual}, expected {expected}.")]
    InputLengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Domain error: {0}")]
    DomainError(String),

    #[error("Invalid fold count k={k} for n={n} observations (need 1 <= k <= n).")]
    InvalidFoldCount { k: usize, n: usize },

    #[error("Fold {0} is not one of the assigned folds.")]
    UnknownFold(usize),

    #[error("Fit failed for grid value {param} on split [{split}]: {reason}")]
    FitFailure {
        param: f64,
        split: FoldSplit,
        reason: String,
    },

    #[error("Parameter grid is empty.")]
    EmptyGridError,
}

impl CvError {
    pub fn domain(message: impl Into<String>) -> Self {
        CvError::DomainError(message.into())
    }

    fn exit_code(&self) -> u8 {
        match self {
            CvError::InputLengthMismatch { .. }
            | CvError::UnknownFold(_)
            | CvError::EmptyGridError => 2,
            CvError::InvalidFoldCount { .. } => 3,
            CvError::DomainError(_) | CvError::FitFailure { .. } => 4,
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

impl From<CvError> for AppError {
    fn from(err: CvError) -> Self {
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
