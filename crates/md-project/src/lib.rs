//! md-project: run definition file format and validation.
//!
//! A run definition describes one simulation end to end: the initial
//! configuration, the pair potential, the integrator, runtime actions, the
//! timeblock schedule and optional launch overrides. Files are YAML (or JSON)
//! and are migrated to [`LATEST_VERSION`] and validated on load.

pub mod migrate;
pub mod schema;
pub mod validate;

pub use migrate::{LATEST_VERSION, migrate_to_latest};
pub use schema::*;
pub use validate::{KNOWN_FLAGS, ValidationError, validate_run};

pub type ProjectResult<T> = Result<T, ProjectError>;

#[derive(thiserror::Error, Debug)]
pub enum ProjectError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Migration error: {what}")]
    Migration { what: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parses, migrates and validates a YAML run definition.
pub fn from_yaml_str(content: &str) -> ProjectResult<RunDefinition> {
    let def: RunDefinition = serde_yaml::from_str(content)?;
    let def = migrate_to_latest(def)?;
    validate_run(&def)?;
    Ok(def)
}

pub fn load_yaml(path: &std::path::Path) -> ProjectResult<RunDefinition> {
    let content = std::fs::read_to_string(path)?;
    from_yaml_str(&content)
}

pub fn save_yaml(path: &std::path::Path, def: &RunDefinition) -> ProjectResult<()> {
    validate_run(def)?;
    let content = serde_yaml::to_string(def)?;
    std::fs::write(path, content)?;
    Ok(())
}

pub fn load_json(path: &std::path::Path) -> ProjectResult<RunDefinition> {
    let content = std::fs::read_to_string(path)?;
    let def: RunDefinition = serde_json::from_str(&content)?;
    let def = migrate_to_latest(def)?;
    validate_run(&def)?;
    Ok(def)
}

pub fn save_json(path: &std::path::Path, def: &RunDefinition) -> ProjectResult<()> {
    validate_run(def)?;
    let content = serde_json::to_string_pretty(def)?;
    std::fs::write(path, content)?;
    Ok(())
}
