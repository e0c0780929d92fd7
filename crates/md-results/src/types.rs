//! Result data types.

use serde::{Deserialize, Serialize};

pub type RunId = String;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: RunId,
    pub name: String,
    pub timestamp: String,
    pub engine_version: String,
    pub integrator: String,
    pub n: usize,
    pub d: usize,
    pub dt: f64,
    pub num_timeblocks: usize,
    pub steps_per_timeblock: usize,
    pub status: RunStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RunStatus {
    Completed,
    Failed,
}

/// RFC 3339 timestamp for manifests.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
