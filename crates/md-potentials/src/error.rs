//! Pair potential errors.

use md_core::MdError;
use thiserror::Error;

/// Result type for potential setup.
pub type PotentialResult<T> = Result<T, PotentialError>;

/// Errors raised while assembling pair potentials and their parameters.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PotentialError {
    /// Invalid argument.
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// Parameter matrix is not square or has ragged rows.
    #[error("Malformed parameter matrix: {what}")]
    Shape { what: String },

    /// Parameter matrix entry (i, j) differs from (j, i).
    #[error("Parameter {param} is not symmetric for type pair ({ti}, {tj})")]
    NotSymmetric { param: usize, ti: usize, tj: usize },

    /// Parameter vector length does not match the pair function.
    #[error("Pair function {name} expects {expected} parameters, got {got}")]
    ParamCount {
        name: String,
        expected: usize,
        got: usize,
    },

    /// Non-finite or non-positive cutoff.
    #[error("Invalid cutoff {value} for type pair ({ti}, {tj})")]
    Cutoff { value: f64, ti: usize, tj: usize },

    /// The pair function has no interaction range; wrap it in a cutoff policy.
    #[error("Pair function {name} has no cutoff")]
    MissingCutoff { name: String },
}

impl From<PotentialError> for MdError {
    fn from(err: PotentialError) -> Self {
        match err {
            PotentialError::InvalidArg { what } => MdError::InvalidArg { what },
            _ => MdError::Invariant {
                what: "pair potential parameters are inconsistent",
            },
        }
    }
}
