//! Run storage API.

use crate::dir_store::DirStore;
use crate::types::RunManifest;
use crate::{StoreError, StoreResult};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone)]
pub struct RunStore {
    root_dir: PathBuf,
}

impl RunStore {
    pub fn new(root_dir: PathBuf) -> StoreResult<Self> {
        if !root_dir.exists() {
            fs::create_dir_all(&root_dir)?;
        }
        Ok(Self { root_dir })
    }

    /// Runs are cached next to the run definition file.
    pub fn for_definition(definition_path: &Path) -> StoreResult<Self> {
        let dir = definition_path.parent().unwrap_or_else(|| Path::new("."));
        Self::new(dir.join(".mdflow").join("runs"))
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root_dir.join(run_id)
    }

    pub fn output_dir(&self, run_id: &str) -> PathBuf {
        self.run_dir(run_id).join("output")
    }

    pub fn has_run(&self, run_id: &str) -> bool {
        self.run_dir(run_id).join("manifest.json").exists()
    }

    /// Fresh output store for a run, discarding any partial previous output.
    pub fn create_output(&self, run_id: &str) -> StoreResult<DirStore> {
        DirStore::create(self.output_dir(run_id))
    }

    pub fn open_output(&self, run_id: &str) -> StoreResult<DirStore> {
        if !self.has_run(run_id) {
            return Err(StoreError::RunNotFound {
                run_id: run_id.to_string(),
            });
        }
        DirStore::open(self.output_dir(run_id))
    }

    pub fn save_manifest(&self, manifest: &RunManifest) -> StoreResult<()> {
        let run_dir = self.run_dir(&manifest.run_id);
        fs::create_dir_all(&run_dir)?;
        let manifest_json = serde_json::to_string_pretty(manifest)?;
        fs::write(run_dir.join("manifest.json"), manifest_json)?;
        Ok(())
    }

    pub fn load_manifest(&self, run_id: &str) -> StoreResult<RunManifest> {
        let manifest_path = self.run_dir(run_id).join("manifest.json");

        if !manifest_path.exists() {
            return Err(StoreError::RunNotFound {
                run_id: run_id.to_string(),
            });
        }

        let content = fs::read_to_string(manifest_path)?;
        let manifest = serde_json::from_str(&content)?;
        Ok(manifest)
    }

    pub fn list_runs(&self) -> StoreResult<Vec<RunManifest>> {
        let mut runs = Vec::new();

        if !self.root_dir.exists() {
            return Ok(runs);
        }

        for entry in fs::read_dir(&self.root_dir)? {
            let entry = entry?;
            if entry.path().is_dir() {
                let run_id = entry.file_name().to_string_lossy().to_string();
                if let Ok(manifest) = self.load_manifest(&run_id) {
                    runs.push(manifest);
                }
            }
        }
        runs.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        Ok(runs)
    }

    pub fn delete_run(&self, run_id: &str) -> StoreResult<()> {
        let run_dir = self.run_dir(run_id);
        if run_dir.exists() {
            fs::remove_dir_all(run_dir)?;
        }
        Ok(())
    }
}
