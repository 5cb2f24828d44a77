use crate::grid::Month;
use thiserror::Error;

/// Error type for transport setup and stepping.
///
/// Everything except [`RSCTMError::FieldShapeMismatch`] is a configuration failure:
/// the coefficient dataset is missing, truncated or corrupt and retrying cannot help.
#[derive(Error, Debug)]
pub enum RSCTMError {
    #[error("{0}")]
    Error(String),
    #[error("Invalid month {0}. Expected a value in 1..=12")]
    InvalidMonth(u32),
    #[error("Coefficient source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("No coefficients available for {month}: {reason}")]
    MissingMonth { month: Month, reason: String },
    #[error("Coefficient block for {month} holds {actual} values, expected {expected}")]
    CoefficientSizeMismatch {
        month: Month,
        expected: usize,
        actual: usize,
    },
    #[error("Coefficient block for {month} has a non-finite weight at cell {cell}, term {term}")]
    NonFiniteCoefficient {
        month: Month,
        cell: usize,
        term: usize,
    },
    #[error("Concentration field has shape {actual:?}, expected {expected:?}")]
    FieldShapeMismatch {
        expected: [usize; 3],
        actual: Vec<usize>,
    },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type for `Result<T, RSCTMError>`.
pub type RSCTMResult<T> = Result<T, RSCTMError>;
