//! Application service layer for mdflow.
//!
//! Shared by front ends: turns run definitions into simulations, executes
//! them with progress reporting, caches results in a run store keyed by a
//! content hash of the definition, and answers queries on recorded output.

pub mod build;
pub mod error;
pub mod progress;
pub mod query;
pub mod run_service;

pub use build::{PotentialVisitor, SimulationParts, build_parts, with_potential};
pub use error::{AppError, AppResult};
pub use progress::{RunProgressEvent, RunStage};
pub use query::{EnergySummary, describe_output, energy_summary, scalar_series, scalars_csv};
pub use run_service::{
    RunOptions, RunRequest, RunResponse, RunTimingSummary, ensure_run, ensure_run_with_progress,
    list_runs, load_run, open_run_store, run_definition,
};
