//! Error types for the md-app service layer.

use std::path::PathBuf;

/// Application error type that wraps errors from the backend crates and
/// gives front ends one interface.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Run definition error: {0}")]
    Project(String),

    #[error("Failed to read run definition: {path}")]
    DefinitionRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to build simulation: {0}")]
    Build(String),

    #[error("Potential error: {0}")]
    Potential(String),

    #[error("Simulation error: {0}")]
    Simulation(String),

    #[error("Results error: {0}")]
    Results(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for md-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<md_project::ProjectError> for AppError {
    fn from(err: md_project::ProjectError) -> Self {
        AppError::Project(err.to_string())
    }
}

impl From<md_potentials::PotentialError> for AppError {
    fn from(err: md_potentials::PotentialError) -> Self {
        AppError::Potential(err.to_string())
    }
}

impl From<md_sim::SimError> for AppError {
    fn from(err: md_sim::SimError) -> Self {
        AppError::Simulation(err.to_string())
    }
}

impl From<md_results::StoreError> for AppError {
    fn from(err: md_results::StoreError) -> Self {
        match err {
            md_results::StoreError::RunNotFound { run_id } => AppError::RunNotFound(run_id),
            other => AppError::Results(other.to_string()),
        }
    }
}
