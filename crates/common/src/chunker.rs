//! Turning files into store entries
//!
//! A file that fits in one RPC payload becomes a single entry holding its
//! hex-encoded content. A larger file is split into fixed-size windows which
//! are written to the store right away as `<path>.part<n>` keys, and the
//! file's own key gets a small JSON manifest listing those part keys in
//! order. Parts are sent as soon as they are read so at most one window is
//! held in memory.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;

use crate::changelist::{ChangeListBuilder, ChangeListError, KeyValue};
use crate::codec;
use crate::operation::Reporter;
use crate::remote::{DataStore, RemoteError};
use crate::settings::{Settings, SettingsError};
use crate::walker::FileEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestType {
    Multipart,
}

/// Value stored under an oversized file's key.
///
/// Content is rebuilt by concatenating the values of `parts`, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipartManifest {
    #[serde(rename = "type")]
    pub kind: ManifestType,
    pub parts: Vec<String>,
}

impl MultipartManifest {
    pub fn new(parts: Vec<String>) -> Self {
        Self {
            kind: ManifestType::Multipart,
            parts,
        }
    }

    /// Parse a stored (decoded) value as a manifest; `None` for plain content.
    pub fn from_value(value: &[u8]) -> Option<Self> {
        serde_json::from_slice(value).ok()
    }
}

/// One window of an oversized file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPart {
    pub parent_key: String,
    /// 1-based
    pub index: u64,
    pub payload: Vec<u8>,
}

impl ChunkPart {
    pub fn key(&self) -> String {
        part_key(&self.parent_key, self.index)
    }
}

pub fn part_key(parent_key: &str, index: u64) -> String {
    format!("{}.part{}", parent_key, index)
}

/// Part keys a file of `size` bytes will be stored under; empty when it fits whole.
pub fn expected_part_keys(relative_path: &str, size: u64, chunk_size: u64) -> Vec<String> {
    if size <= chunk_size {
        return Vec::new();
    }
    let count = size.div_ceil(chunk_size);
    (1..=count).map(|i| part_key(relative_path, i)).collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("remote error while storing part: {0}")]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    ChangeList(#[from] ChangeListError),
    #[error("failed to encode manifest: {0}")]
    Manifest(#[from] serde_json::Error),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

#[derive(Debug, Clone, Copy)]
pub struct FileChunker {
    chunk_size: u64,
    builder: ChangeListBuilder,
    verbose: bool,
}

impl FileChunker {
    pub fn new(settings: &Settings) -> Result<Self, ChunkError> {
        Ok(Self {
            chunk_size: settings.chunk_size()?,
            builder: ChangeListBuilder::new(settings.maximum_rpc_payload_size),
            verbose: settings.verbose,
        })
    }

    /// Produce the insert entry for `entry`, uploading its parts first if it
    /// is larger than one chunk. Parts whose keys are in `existing` replace
    /// the stored ones.
    pub async fn process<S>(
        &self,
        entry: &FileEntry,
        store: &S,
        store_id: &str,
        existing: &HashSet<String>,
        reporter: &Reporter,
    ) -> Result<KeyValue, ChunkError>
    where
        S: DataStore + ?Sized,
    {
        let key = codec::encode(&entry.relative_path);

        if entry.size <= self.chunk_size {
            let content = tokio::fs::read(&entry.absolute_path)
                .await
                .map_err(|source| self.io_error(entry, source))?;
            return Ok(KeyValue::new(key, codec::encode(&content)));
        }

        let mut file = tokio::fs::File::open(&entry.absolute_path)
            .await
            .map_err(|source| self.io_error(entry, source))?;
        let total = entry.size.div_ceil(self.chunk_size);
        let mut parts = Vec::new();

        loop {
            let mut window = Vec::new();
            let read = (&mut file)
                .take(self.chunk_size)
                .read_to_end(&mut window)
                .await
                .map_err(|source| self.io_error(entry, source))?;
            if read == 0 {
                break;
            }

            let part = ChunkPart {
                parent_key: entry.relative_path.clone(),
                index: parts.len() as u64 + 1,
                payload: window,
            };
            let part_key = part.key();

            if self.verbose {
                reporter.info(format!(
                    "Uploading part {} of {} for {}",
                    part.index, total, entry.relative_path
                ));
            }

            let changelist = self.builder.build_upserts(
                [KeyValue::new(
                    codec::encode(&part_key),
                    codec::encode(&part.payload),
                )],
                existing,
                false,
            )?;
            for batch in changelist {
                store.update_data_store(store_id, batch.operations()).await?;
            }

            parts.push(part_key);
        }

        tracing::debug!(
            path = %entry.relative_path,
            parts = parts.len(),
            "stored multipart file"
        );

        let manifest = serde_json::to_string(&MultipartManifest::new(parts))?;
        Ok(KeyValue::new(key, codec::encode(manifest)))
    }

    fn io_error(&self, entry: &FileEntry, source: std::io::Error) -> ChunkError {
        ChunkError::Io {
            path: entry.absolute_path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_wire_form() {
        let manifest = MultipartManifest::new(vec!["a.bin.part1".into(), "a.bin.part2".into()]);
        assert_eq!(
            serde_json::to_string(&manifest).unwrap(),
            r#"{"type":"multipart","parts":["a.bin.part1","a.bin.part2"]}"#
        );
    }

    #[test]
    fn test_manifest_from_value() {
        let value = br#"{"type":"multipart","parts":["x.part1"]}"#;
        let manifest = MultipartManifest::from_value(value).unwrap();
        assert_eq!(manifest.parts, vec!["x.part1"]);

        assert!(MultipartManifest::from_value(b"hello world").is_none());
        assert!(MultipartManifest::from_value(br#"{"type":"other","parts":[]}"#).is_none());
    }

    #[test]
    fn test_expected_part_keys() {
        assert!(expected_part_keys("small", 10, 10).is_empty());
        assert_eq!(
            expected_part_keys("big", 21, 10),
            vec!["big.part1", "big.part2", "big.part3"]
        );
        assert_eq!(expected_part_keys("even", 20, 10).len(), 2);
    }
}
