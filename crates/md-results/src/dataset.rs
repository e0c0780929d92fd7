//! Groups, datasets and attributes.

use crate::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Attribute value attached to the store root or to a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Text(String),
    TextList(Vec<String>),
    FloatList(Vec<f64>),
}

impl AttrValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Int(v) => Some(*v as f64),
            AttrValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_usize(&self) -> Option<usize> {
        match self {
            AttrValue::Int(v) => usize::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_text_list(&self) -> Option<&[String]> {
        match self {
            AttrValue::TextList(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_float_list(&self) -> Option<&[f64]> {
        match self {
            AttrValue::FloatList(v) => Some(v),
            _ => None,
        }
    }
}

impl From<usize> for AttrValue {
    fn from(v: usize) -> Self {
        AttrValue::Int(v as i64)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Text(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Text(v)
    }
}

impl From<Vec<String>> for AttrValue {
    fn from(v: Vec<String>) -> Self {
        AttrValue::TextList(v)
    }
}

impl From<Vec<f64>> for AttrValue {
    fn from(v: Vec<f64>) -> Self {
        AttrValue::FloatList(v)
    }
}

/// Dense row-major array of `f64`.
///
/// Block datasets are created with a leading extent of zero and grow one
/// timeblock at a time through [`Dataset::write_block`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl Dataset {
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> StoreResult<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(StoreError::Shape {
                what: format!(
                    "shape {:?} needs {} values, got {}",
                    shape,
                    expected,
                    data.len()
                ),
            });
        }
        Ok(Self { shape, data })
    }

    /// Empty dataset of shape `[0, block_shape...]`.
    pub fn blocks(block_shape: &[usize]) -> Self {
        let mut shape = Vec::with_capacity(block_shape.len() + 1);
        shape.push(0);
        shape.extend_from_slice(block_shape);
        Self {
            shape,
            data: Vec::new(),
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Extent of the first axis.
    pub fn num_blocks(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    /// Number of values in one slice along the first axis.
    pub fn block_len(&self) -> usize {
        self.shape.iter().skip(1).product()
    }

    pub fn block(&self, block: usize) -> Option<&[f64]> {
        let len = self.block_len();
        self.data.get(block * len..(block + 1) * len)
    }

    /// Values of blocks `first..last`, concatenated.
    pub fn blocks_range(&self, first: usize, last: usize) -> &[f64] {
        let len = self.block_len();
        let last = last.min(self.num_blocks());
        let first = first.min(last);
        &self.data[first * len..last * len]
    }

    /// Overwrite block `block`, or append it when `block == num_blocks()`.
    pub fn write_block(&mut self, block: usize, values: &[f64]) -> StoreResult<BlockWrite> {
        let len = self.block_len();
        if values.len() != len {
            return Err(StoreError::Shape {
                what: format!("block of shape {:?} needs {} values, got {}", &self.shape[1..], len, values.len()),
            });
        }
        let blocks = self.num_blocks();
        if block < blocks {
            self.data[block * len..(block + 1) * len].copy_from_slice(values);
            Ok(BlockWrite::Overwrite)
        } else if block == blocks {
            self.data.extend_from_slice(values);
            self.shape[0] += 1;
            Ok(BlockWrite::Append)
        } else {
            Err(StoreError::BlockOutOfRange {
                group: String::new(),
                name: String::new(),
                block,
                len: blocks,
            })
        }
    }

    /// Value at a full multi-index.
    pub fn get(&self, index: &[usize]) -> Option<f64> {
        if index.len() != self.shape.len() {
            return None;
        }
        let mut flat = 0;
        for (i, (&idx, &extent)) in index.iter().zip(&self.shape).enumerate() {
            if idx >= extent {
                return None;
            }
            flat = if i == 0 { idx } else { flat * extent + idx };
        }
        self.data.get(flat).copied()
    }
}

/// Outcome of [`Dataset::write_block`], used by persistent backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockWrite {
    Append,
    Overwrite,
}

/// Named collection of attributes and datasets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Group {
    pub attrs: BTreeMap<String, AttrValue>,
    pub datasets: BTreeMap<String, Dataset>,
}

impl Group {
    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.get(key)
    }

    pub fn dataset(&self, name: &str) -> Option<&Dataset> {
        self.datasets.get(name)
    }
}
