//! Output store interface and the in-memory backend.

use crate::dataset::{AttrValue, BlockWrite, Dataset, Group};
use crate::{StoreError, StoreResult};
use std::collections::BTreeMap;

/// Destination for simulation output.
///
/// Backends share one logical layout: root attributes plus named groups of
/// attributes and datasets. Runtime actions write through this trait only.
pub trait OutputStore: Send {
    fn root_attrs(&self) -> &BTreeMap<String, AttrValue>;

    fn set_root_attr(&mut self, key: &str, value: AttrValue) -> StoreResult<()>;

    /// Create an empty group, replacing any existing group of that name.
    fn create_group(&mut self, name: &str) -> StoreResult<()>;

    fn group(&self, name: &str) -> Option<&Group>;

    fn group_names(&self) -> Vec<String>;

    fn set_group_attr(&mut self, group: &str, key: &str, value: AttrValue) -> StoreResult<()>;

    fn create_dataset(&mut self, group: &str, name: &str, dataset: Dataset) -> StoreResult<()>;

    /// Write one timeblock of a block dataset (see [`Dataset::write_block`]).
    fn write_block(&mut self, group: &str, name: &str, block: usize, data: &[f64]) -> StoreResult<()>;

    /// Make everything written so far durable. No-op for memory.
    fn flush(&mut self) -> StoreResult<()>;

    fn root_attr(&self, key: &str) -> Option<&AttrValue> {
        self.root_attrs().get(key)
    }

    fn group_attr(&self, group: &str, key: &str) -> Option<&AttrValue> {
        self.group(group).and_then(|g| g.attrs.get(key))
    }

    fn dataset(&self, group: &str, name: &str) -> StoreResult<&Dataset> {
        let g = self.group(group).ok_or_else(|| StoreError::MissingGroup {
            group: group.to_string(),
        })?;
        g.datasets.get(name).ok_or_else(|| StoreError::MissingDataset {
            group: group.to_string(),
            name: name.to_string(),
        })
    }
}

pub(crate) fn check_name(name: &str) -> StoreResult<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control);
    if bad {
        return Err(StoreError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Transient backend; everything lives in process memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryStore {
    attrs: BTreeMap<String, AttrValue>,
    groups: BTreeMap<String, Group>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(
        attrs: BTreeMap<String, AttrValue>,
        groups: BTreeMap<String, Group>,
    ) -> Self {
        Self { attrs, groups }
    }

    pub(crate) fn groups(&self) -> &BTreeMap<String, Group> {
        &self.groups
    }

    fn group_mut(&mut self, name: &str) -> StoreResult<&mut Group> {
        self.groups
            .get_mut(name)
            .ok_or_else(|| StoreError::MissingGroup {
                group: name.to_string(),
            })
    }

    /// Same as [`OutputStore::write_block`], reporting whether it appended.
    pub(crate) fn write_block_inner(
        &mut self,
        group: &str,
        name: &str,
        block: usize,
        data: &[f64],
    ) -> StoreResult<BlockWrite> {
        let g = self.group_mut(group)?;
        let ds = g
            .datasets
            .get_mut(name)
            .ok_or_else(|| StoreError::MissingDataset {
                group: group.to_string(),
                name: name.to_string(),
            })?;
        ds.write_block(block, data).map_err(|err| match err {
            StoreError::BlockOutOfRange { block, len, .. } => StoreError::BlockOutOfRange {
                group: group.to_string(),
                name: name.to_string(),
                block,
                len,
            },
            other => other,
        })
    }
}

impl OutputStore for MemoryStore {
    fn root_attrs(&self) -> &BTreeMap<String, AttrValue> {
        &self.attrs
    }

    fn set_root_attr(&mut self, key: &str, value: AttrValue) -> StoreResult<()> {
        self.attrs.insert(key.to_string(), value);
        Ok(())
    }

    fn create_group(&mut self, name: &str) -> StoreResult<()> {
        check_name(name)?;
        self.groups.insert(name.to_string(), Group::default());
        Ok(())
    }

    fn group(&self, name: &str) -> Option<&Group> {
        self.groups.get(name)
    }

    fn group_names(&self) -> Vec<String> {
        self.groups.keys().cloned().collect()
    }

    fn set_group_attr(&mut self, group: &str, key: &str, value: AttrValue) -> StoreResult<()> {
        self.group_mut(group)?.attrs.insert(key.to_string(), value);
        Ok(())
    }

    fn create_dataset(&mut self, group: &str, name: &str, dataset: Dataset) -> StoreResult<()> {
        check_name(name)?;
        self.group_mut(group)?
            .datasets
            .insert(name.to_string(), dataset);
        Ok(())
    }

    fn write_block(&mut self, group: &str, name: &str, block: usize, data: &[f64]) -> StoreResult<()> {
        self.write_block_inner(group, name, block, data).map(|_| ())
    }

    fn flush(&mut self) -> StoreResult<()> {
        Ok(())
    }
}
