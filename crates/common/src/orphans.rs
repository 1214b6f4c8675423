//! Finding remote keys with no local counterpart
//!
//! The local side of the comparison is every key a deploy of the directory
//! would write: each file's relative path plus, for oversized files, the
//! part keys its chunks will be stored under. Anything else in the store is
//! an orphan and gets deleted before the deploy inserts anything.
//!
//! Building that key set also catches two local files mapping to the same
//! key (a file literally named `x.part1` next to an oversized `x`), so such
//! a deploy fails before it writes anything.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::changelist::{ChangeAction, ChangeBatch, ChangeListBuilder, ChangeListError, KeyValue};
use crate::chunker::expected_part_keys;
use crate::codec;
use crate::remote::{DataStore, RemoteError};
use crate::settings::{Settings, SettingsError};
use crate::walker::{DirectoryWalker, WalkError};

#[derive(Debug, thiserror::Error)]
pub enum OrphanError {
    #[error("failed to list store keys: {0}")]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Walk(#[from] WalkError),
    #[error(transparent)]
    ChangeList(#[from] ChangeListError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("key {key} is claimed by both {first} and {second}")]
    KeyCollision {
        key: String,
        first: String,
        second: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct OrphanReport {
    /// Delete operations for every orphan, packed into batches
    pub deletes: Vec<ChangeBatch>,
    pub orphan_count: usize,
    /// Normalized remote keys that survive the cleanup
    pub remaining: HashSet<String>,
}

/// Hex keys (normalized) a deploy of `dir` would write.
///
/// Fails with [`OrphanError::KeyCollision`] if two files would be stored
/// under the same key. Reads the whole tree; see [`scan_local_keys`] for
/// async callers.
pub fn local_key_set(dir: &Path, settings: &Settings) -> Result<HashSet<String>, OrphanError> {
    let chunk_size = settings.chunk_size()?;
    // relative key path -> file that produces it
    let mut owners: HashMap<String, String> = HashMap::new();

    for batch in DirectoryWalker::new(dir, settings.num_files_processed_per_batch)? {
        for entry in batch? {
            claim(&mut owners, entry.relative_path.clone(), &entry.relative_path)?;
            for part in expected_part_keys(&entry.relative_path, entry.size, chunk_size) {
                claim(&mut owners, part, &entry.relative_path)?;
            }
        }
    }

    Ok(owners.into_keys().map(codec::encode).collect())
}

fn claim(owners: &mut HashMap<String, String>, key: String, owner: &str) -> Result<(), OrphanError> {
    match owners.get(&key) {
        Some(first) => Err(OrphanError::KeyCollision {
            key,
            first: first.clone(),
            second: owner.to_string(),
        }),
        None => {
            owners.insert(key, owner.to_string());
            Ok(())
        }
    }
}

/// [`local_key_set`] on the blocking thread pool.
pub async fn scan_local_keys(dir: &Path, settings: &Settings) -> Result<HashSet<String>, OrphanError> {
    let dir = dir.to_path_buf();
    let settings = settings.clone();
    let keys = tokio::task::spawn_blocking(move || local_key_set(&dir, &settings))
        .await
        .map_err(WalkError::from)??;
    Ok(keys)
}

/// Compare a store snapshot against the keys from [`local_key_set`] and
/// produce the deletes for its orphans.
pub async fn resolve_orphans<S>(
    store: &S,
    store_id: &str,
    local_keys: &HashSet<String>,
    settings: &Settings,
) -> Result<OrphanReport, OrphanError>
where
    S: DataStore + ?Sized,
{
    let remote_keys = store.get_keys(store_id).await?;

    let mut seen = HashSet::new();
    let mut orphans = Vec::new();
    let mut remaining = HashSet::new();

    for key in remote_keys {
        let key = codec::normalize_key(&key);
        if !seen.insert(key.clone()) {
            continue;
        }
        if local_keys.contains(&key) {
            remaining.insert(key);
        } else {
            orphans.push(KeyValue::key(key));
        }
    }

    tracing::debug!(
        store_id,
        remote = seen.len(),
        local = local_keys.len(),
        orphans = orphans.len(),
        "resolved orphaned keys"
    );

    let orphan_count = orphans.len();
    let builder = ChangeListBuilder::new(settings.maximum_rpc_payload_size);
    let deletes = builder.build(ChangeAction::Delete, orphans, true)?;

    Ok(OrphanReport {
        deletes,
        orphan_count,
        remaining,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{Options, MIB};
    use std::fs;

    fn tiny_chunks() -> Settings {
        Settings::from_options(&Options {
            maximum_rpc_payload_size: Some((MIB + 4) * 2),
            ..Options::default()
        })
        .unwrap()
    }

    #[test]
    fn test_local_keys_include_parts() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();
        fs::write(temp.path().join("sub/big"), b"0123456789").unwrap();
        fs::write(temp.path().join("small"), b"ok").unwrap();

        let keys = local_key_set(temp.path(), &tiny_chunks()).unwrap();
        let expected: HashSet<String> = ["sub/big", "sub/big.part1", "sub/big.part2", "sub/big.part3", "small"]
            .into_iter()
            .map(codec::encode)
            .collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn test_file_named_like_a_part_collides() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("x"), b"0123456789").unwrap();
        fs::write(temp.path().join("x.part1"), b"a").unwrap();

        let err = local_key_set(temp.path(), &tiny_chunks()).unwrap_err();
        match err {
            OrphanError::KeyCollision { key, first, second } => {
                assert_eq!(key, "x.part1");
                assert_eq!(first, "x");
                assert_eq!(second, "x.part1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_scan_matches_blocking_call() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("a.txt"), b"a").unwrap();

        let settings = Settings::default();
        assert_eq!(
            scan_local_keys(temp.path(), &settings).await.unwrap(),
            local_key_set(temp.path(), &settings).unwrap()
        );
    }
}
