//! Error types for simulation setup and execution.

use md_core::MdError;
use md_potentials::PotentialError;
use md_results::StoreError;
use thiserror::Error;

/// Errors encountered while configuring or running a simulation.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// Invalid schedule, flags or component combination, detected at setup.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A hard resource bound was exceeded; the run cannot continue.
    #[error("Capacity exceeded: {what} (limit {limit}, required {required})")]
    Capacity {
        what: &'static str,
        limit: usize,
        required: usize,
    },

    #[error("Non-physical condition: {what}")]
    NonPhysical { what: &'static str },

    #[error("Pair potential error: {0}")]
    Potential(#[from] PotentialError),

    #[error("Output store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Core(#[from] MdError),
}

pub type SimResult<T> = Result<T, SimError>;

impl SimError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        SimError::Config {
            message: message.into(),
        }
    }
}
