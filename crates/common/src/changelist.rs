//! Changelists and payload-bounded batching
//!
//! A changelist is the ordered list of insert/delete operations sent to the
//! DataLayer `batch_update` call. The node rejects request bodies over a size
//! ceiling, so [`ChangeListBuilder`] packs operations greedily, left to right,
//! into batches whose serialized size stays within that ceiling.

use std::collections::HashSet;
use std::io;

use serde::{Deserialize, Serialize};

use crate::codec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Insert,
    Delete,
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeAction::Insert => write!(f, "insert"),
            ChangeAction::Delete => write!(f, "delete"),
        }
    }
}

/// A single changelist entry, in the node's wire form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeOperation {
    pub action: ChangeAction,
    /// hex-encoded key
    pub key: String,
    /// hex-encoded value, absent for deletes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ChangeOperation {
    pub fn insert(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            action: ChangeAction::Insert,
            key: key.into(),
            value: Some(value.into()),
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            action: ChangeAction::Delete,
            key: key.into(),
            value: None,
        }
    }

    /// Bytes this operation occupies once serialized as JSON.
    pub fn serialized_size(&self) -> Result<usize, ChangeListError> {
        let mut counter = ByteCounter::default();
        serde_json::to_writer(&mut counter, self)?;
        Ok(counter.0)
    }
}

/// Hex key and optional hex value, before an action is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: Option<String>,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }

    pub fn key(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }
}

/// An ordered run of operations submitted in one RPC call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeBatch {
    operations: Vec<ChangeOperation>,
    /// serialized size of `operations` as a JSON array
    size: usize,
}

impl ChangeBatch {
    fn new() -> Self {
        Self {
            operations: Vec::new(),
            size: EMPTY_ARRAY_SIZE,
        }
    }

    /// Size of the batch if `op_size` more bytes were appended.
    fn size_with(&self, op_size: usize) -> usize {
        let separator = usize::from(!self.operations.is_empty());
        self.size + separator + op_size
    }

    fn push(&mut self, op: ChangeOperation, op_size: usize) {
        self.size = self.size_with(op_size);
        self.operations.push(op);
    }

    pub fn operations(&self) -> &[ChangeOperation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Serialized size in bytes of the batch as a JSON array.
    pub fn serialized_size(&self) -> usize {
        self.size
    }
}

/// `[]`
const EMPTY_ARRAY_SIZE: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum ChangeListError {
    #[error(
        "operation for key {key} serializes to {size} bytes, over the {ceiling} byte payload ceiling"
    )]
    PayloadTooLarge {
        key: String,
        size: usize,
        ceiling: usize,
    },
    #[error("failed to serialize operation: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy)]
pub struct ChangeListBuilder {
    ceiling: usize,
}

impl ChangeListBuilder {
    pub fn new(ceiling: u64) -> Self {
        Self {
            ceiling: usize::try_from(ceiling).unwrap_or(usize::MAX),
        }
    }

    /// Turn `entries` into batches of `action` operations.
    ///
    /// With `split` the entries are packed into as few batches as possible
    /// without reordering, each within the ceiling. Without it everything
    /// lands in one batch and the caller is responsible for its size.
    /// No entries means no batches.
    pub fn build(
        &self,
        action: ChangeAction,
        entries: impl IntoIterator<Item = KeyValue>,
        split: bool,
    ) -> Result<Vec<ChangeBatch>, ChangeListError> {
        let ops = entries.into_iter().map(|entry| match action {
            ChangeAction::Insert => {
                ChangeOperation::insert(entry.key, entry.value.unwrap_or_default())
            }
            ChangeAction::Delete => ChangeOperation::delete(entry.key),
        });
        self.pack(ops.map(|op| vec![op]), split)
    }

    /// Like an insert [`build`](Self::build), but keys already present in the
    /// store (normalized hex, see [`crate::codec::normalize_key`]) are deleted
    /// immediately before being inserted again. The node refuses to insert a
    /// key that exists.
    ///
    /// A delete and its insert always land in the same batch, so a failed
    /// submission never leaves a key deleted without its replacement.
    pub fn build_upserts(
        &self,
        entries: impl IntoIterator<Item = KeyValue>,
        existing: &HashSet<String>,
        split: bool,
    ) -> Result<Vec<ChangeBatch>, ChangeListError> {
        let units = entries.into_iter().map(|entry| {
            let mut unit = Vec::with_capacity(2);
            if existing.contains(&codec::normalize_key(&entry.key)) {
                unit.push(ChangeOperation::delete(entry.key.clone()));
            }
            unit.push(ChangeOperation::insert(entry.key, entry.value.unwrap_or_default()));
            unit
        });
        self.pack(units, split)
    }

    /// Greedy left-to-right packing. Each unit is placed whole: it either
    /// fits in the current batch or starts the next one.
    fn pack(
        &self,
        units: impl IntoIterator<Item = Vec<ChangeOperation>>,
        split: bool,
    ) -> Result<Vec<ChangeBatch>, ChangeListError> {
        let mut batches = Vec::new();
        let mut current = ChangeBatch::new();

        for unit in units {
            let sizes = unit
                .iter()
                .map(ChangeOperation::serialized_size)
                .collect::<Result<Vec<_>, _>>()?;
            // operations plus the separators between them
            let unit_size = sizes.iter().sum::<usize>() + sizes.len().saturating_sub(1);

            if split {
                let alone = EMPTY_ARRAY_SIZE + unit_size;
                if alone > self.ceiling {
                    return Err(ChangeListError::PayloadTooLarge {
                        key: unit.first().map(|op| op.key.clone()).unwrap_or_default(),
                        size: alone,
                        ceiling: self.ceiling,
                    });
                }

                if !current.is_empty() && current.size_with(unit_size) > self.ceiling {
                    batches.push(std::mem::replace(&mut current, ChangeBatch::new()));
                }
            }

            for (op, op_size) in unit.into_iter().zip(sizes) {
                current.push(op, op_size);
            }
        }

        if !current.is_empty() {
            batches.push(current);
        }

        Ok(batches)
    }
}

/// Counts bytes written without keeping them.
#[derive(Default)]
struct ByteCounter(usize);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
