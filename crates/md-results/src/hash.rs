//! Content-based hashing for run IDs.

use serde::Serialize;
use sha2::{Digest, Sha256};

pub fn compute_run_id<T: Serialize>(definition: &T, engine_version: &str) -> String {
    let mut hasher = Sha256::new();

    let definition_json = serde_json::to_string(definition).unwrap_or_default();
    hasher.update(definition_json.as_bytes());

    hasher.update(engine_version.as_bytes());

    let result = hasher.finalize();
    format!("{:x}", result)
}
