//! Opening stored trajectories regardless of their on-disk generation.

use crate::dir_store::{DirStore, MANIFEST_FILE};
use crate::legacy;
use crate::store::{MemoryStore, OutputStore};
use crate::{StoreError, StoreResult};
use std::fmt::Write;
use std::path::Path;
use tracing::warn;

/// Load output from `path`.
///
/// - a directory holding `store.json` is read as a [`DirStore`];
/// - any other directory is read as rumd3 `TrajectoryFiles`;
/// - a missing path without an extension is [`StoreError::NotFound`];
/// - a file, or a path with an extension, is not a supported format and
///   yields `Ok(None)`.
pub fn open_trajectory(path: &Path) -> StoreResult<Option<MemoryStore>> {
    if path.is_dir() {
        if path.join(MANIFEST_FILE).exists() {
            return DirStore::open(path).map(|s| Some(s.into_memory()));
        }
        return legacy::read_rumd3(path).map(Some);
    }
    if path.exists() || path.extension().is_some() {
        warn!("unsupported trajectory format: {}", path.display());
        return Ok(None);
    }
    Err(StoreError::NotFound {
        path: path.to_path_buf(),
    })
}

/// Human-readable listing of groups, attributes and dataset shapes.
pub fn describe(store: &dyn OutputStore) -> String {
    let mut out = String::new();
    for (key, value) in store.root_attrs() {
        let _ = writeln!(out, "{key}: {value:?}");
    }
    for name in store.group_names() {
        let Some(group) = store.group(&name) else {
            continue;
        };
        let _ = writeln!(out, "{name}/");
        for (key, value) in &group.attrs {
            let _ = writeln!(out, "\t{key}: {value:?}");
        }
        for (ds_name, ds) in &group.datasets {
            let _ = writeln!(out, "\t{ds_name}, shape: {:?}", ds.shape());
        }
    }
    out
}
