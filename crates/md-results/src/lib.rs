//! md-results: block-structured simulation output and run cache.
//!
//! Output is organised as named groups (one per runtime action plus
//! `initial_configuration`), each holding attributes and datasets. Datasets
//! that grow during a run have the timeblock as their first axis.

pub mod dataset;
pub mod dir_store;
pub mod hash;
pub mod legacy;
pub mod reader;
pub mod run_store;
pub mod store;
pub mod types;

pub use dataset::{AttrValue, Dataset, Group};
pub use dir_store::DirStore;
pub use hash::compute_run_id;
pub use reader::{describe, open_trajectory};
pub use run_store::RunStore;
pub use store::{MemoryStore, OutputStore};
pub use types::*;

use std::path::PathBuf;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Path not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("No trajectory or energy files in {}", path.display())]
    EmptyTrajectory { path: PathBuf },

    #[error("Missing group: {group}")]
    MissingGroup { group: String },

    #[error("Missing dataset: {group}/{name}")]
    MissingDataset { group: String, name: String },

    #[error("Invalid group or dataset name: {name:?}")]
    InvalidName { name: String },

    #[error("Shape mismatch: {what}")]
    Shape { what: String },

    #[error("Block {block} out of range for {group}/{name} ({len} blocks written)")]
    BlockOutOfRange {
        group: String,
        name: String,
        block: usize,
        len: usize,
    },

    #[error("Parse error in {} line {line}: {message}", file.display())]
    Parse {
        file: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Run not found: {run_id}")]
    RunNotFound { run_id: String },
}
