//! Persistent directory backend.
//!
//! Layout under the root directory:
//!
//! ```text
//! store.json                 root attrs, groups, group attrs, dataset shapes
//! <group>/<dataset>.f64      raw native-endian f64 values, row-major
//! ```
//!
//! Block writes that append go straight to the end of the data file, so a run
//! interrupted between blocks leaves every completed block on disk.

use crate::dataset::{AttrValue, BlockWrite, Dataset, Group};
use crate::store::{MemoryStore, OutputStore, check_name};
use crate::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "store.json";
const FORMAT: &str = "mdflow-store";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoreManifest {
    format: String,
    version: u32,
    attrs: BTreeMap<String, AttrValue>,
    groups: BTreeMap<String, GroupManifest>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct GroupManifest {
    attrs: BTreeMap<String, AttrValue>,
    datasets: BTreeMap<String, Vec<usize>>,
}

pub struct DirStore {
    root: PathBuf,
    memory: MemoryStore,
}

impl DirStore {
    /// Create a new store, clearing any previous store at `root`.
    pub fn create(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        if root.join(MANIFEST_FILE).exists() {
            fs::remove_dir_all(&root)?;
        }
        fs::create_dir_all(&root)?;
        let mut store = Self {
            root,
            memory: MemoryStore::new(),
        };
        store.write_manifest()?;
        Ok(store)
    }

    /// Load an existing store fully into memory.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        let manifest_path = root.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            return Err(StoreError::NotFound { path: manifest_path });
        }
        let manifest: StoreManifest = serde_json::from_str(&fs::read_to_string(&manifest_path)?)?;
        if manifest.format != FORMAT || manifest.version > FORMAT_VERSION {
            return Err(StoreError::Parse {
                file: manifest_path,
                line: 1,
                message: format!("unsupported format {} v{}", manifest.format, manifest.version),
            });
        }

        let mut groups = BTreeMap::new();
        for (group_name, gm) in manifest.groups {
            let mut group = Group {
                attrs: gm.attrs,
                datasets: BTreeMap::new(),
            };
            for (ds_name, shape) in gm.datasets {
                let data = read_values(&data_path(&root, &group_name, &ds_name))?;
                group.datasets.insert(ds_name, Dataset::new(shape, data)?);
            }
            groups.insert(group_name, group);
        }

        Ok(Self {
            root,
            memory: MemoryStore::from_parts(manifest.attrs, groups),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn into_memory(self) -> MemoryStore {
        self.memory
    }

    fn write_manifest(&self) -> StoreResult<()> {
        let groups = self
            .memory
            .groups()
            .iter()
            .map(|(name, g)| {
                let datasets = g
                    .datasets
                    .iter()
                    .map(|(n, ds)| (n.clone(), ds.shape().to_vec()))
                    .collect();
                (
                    name.clone(),
                    GroupManifest {
                        attrs: g.attrs.clone(),
                        datasets,
                    },
                )
            })
            .collect();
        let manifest = StoreManifest {
            format: FORMAT.to_string(),
            version: FORMAT_VERSION,
            attrs: self.memory.root_attrs().clone(),
            groups,
        };
        fs::write(
            self.root.join(MANIFEST_FILE),
            serde_json::to_string_pretty(&manifest)?,
        )?;
        Ok(())
    }
}

fn data_path(root: &Path, group: &str, dataset: &str) -> PathBuf {
    root.join(group).join(format!("{dataset}.f64"))
}

fn write_values(path: &Path, values: &[f64]) -> StoreResult<()> {
    fs::write(path, bytemuck::cast_slice::<f64, u8>(values))?;
    Ok(())
}

fn append_values(path: &Path, values: &[f64]) -> StoreResult<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(bytemuck::cast_slice::<f64, u8>(values))?;
    Ok(())
}

fn read_values(path: &Path) -> StoreResult<Vec<f64>> {
    let bytes = fs::read(path)?;
    if bytes.len() % size_of::<f64>() != 0 {
        return Err(StoreError::Parse {
            file: path.to_path_buf(),
            line: 0,
            message: format!("{} bytes is not a whole number of f64 values", bytes.len()),
        });
    }
    let mut values = vec![0.0_f64; bytes.len() / size_of::<f64>()];
    bytemuck::cast_slice_mut::<f64, u8>(&mut values).copy_from_slice(&bytes);
    Ok(values)
}

impl OutputStore for DirStore {
    fn root_attrs(&self) -> &BTreeMap<String, AttrValue> {
        self.memory.root_attrs()
    }

    fn set_root_attr(&mut self, key: &str, value: AttrValue) -> StoreResult<()> {
        self.memory.set_root_attr(key, value)
    }

    fn create_group(&mut self, name: &str) -> StoreResult<()> {
        check_name(name)?;
        let dir = self.root.join(name);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        fs::create_dir_all(&dir)?;
        self.memory.create_group(name)?;
        self.write_manifest()
    }

    fn group(&self, name: &str) -> Option<&Group> {
        self.memory.group(name)
    }

    fn group_names(&self) -> Vec<String> {
        self.memory.group_names()
    }

    fn set_group_attr(&mut self, group: &str, key: &str, value: AttrValue) -> StoreResult<()> {
        self.memory.set_group_attr(group, key, value)
    }

    fn create_dataset(&mut self, group: &str, name: &str, dataset: Dataset) -> StoreResult<()> {
        self.memory.create_dataset(group, name, dataset)?;
        let ds = self.memory.dataset(group, name)?;
        write_values(&data_path(&self.root, group, name), ds.data())?;
        self.write_manifest()
    }

    fn write_block(&mut self, group: &str, name: &str, block: usize, data: &[f64]) -> StoreResult<()> {
        let path = data_path(&self.root, group, name);
        match self.memory.write_block_inner(group, name, block, data)? {
            BlockWrite::Append => append_values(&path, data),
            BlockWrite::Overwrite => {
                let ds = self.memory.dataset(group, name)?;
                write_values(&path, ds.data())
            }
        }
    }

    fn flush(&mut self) -> StoreResult<()> {
        self.write_manifest()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("md_dir_store_{}_{}", tag, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn blocks_survive_reopen() {
        let root = temp_root("reopen");
        let mut store = DirStore::create(&root).unwrap();
        store.set_root_attr("dt", AttrValue::Float(0.005)).unwrap();
        store.create_group("scalar_saver").unwrap();
        store
            .set_group_attr("scalar_saver", "scalar_names", vec!["U".to_string(), "K".to_string()].into())
            .unwrap();
        store
            .create_dataset("scalar_saver", "scalars", Dataset::blocks(&[2, 2]))
            .unwrap();
        store.write_block("scalar_saver", "scalars", 0, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        store.write_block("scalar_saver", "scalars", 1, &[5.0, 6.0, 7.0, 8.0]).unwrap();
        store.write_block("scalar_saver", "scalars", 0, &[0.5, 2.0, 3.0, 4.0]).unwrap();
        store.flush().unwrap();

        let reopened = DirStore::open(&root).unwrap();
        let ds = reopened.dataset("scalar_saver", "scalars").unwrap();
        assert_eq!(ds.shape(), &[2, 2, 2]);
        assert_eq!(ds.data(), &[0.5, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        assert_eq!(reopened.root_attr("dt"), Some(&AttrValue::Float(0.005)));
        assert_eq!(
            reopened
                .group_attr("scalar_saver", "scalar_names")
                .and_then(|a| a.as_text_list())
                .map(|v| v.len()),
            Some(2)
        );

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn open_missing_store_fails() {
        let root = temp_root("missing");
        assert!(matches!(DirStore::open(&root), Err(StoreError::NotFound { .. })));
    }
}
