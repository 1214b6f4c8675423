use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::changelist::{ChangeAction, ChangeOperation};
use crate::chunker::MultipartManifest;
use crate::codec;
use crate::remote::{DataStore, MirrorRegistration, RemoteError};

/// A call received by [`MemoryDataStore`], in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    GetKeys {
        store_id: String,
    },
    Update {
        store_id: String,
        changelist: Vec<ChangeOperation>,
    },
    AddMirror {
        store_id: String,
        urls: Vec<String>,
        amount: u64,
        fee: u64,
    },
    AddMirrorForCurrentHost {
        store_id: String,
        force_ip4: bool,
    },
}

/// In-memory data store keyed by store id
#[derive(Debug, Clone)]
pub struct MemoryDataStore {
    inner: Arc<Mutex<MemoryDataStoreInner>>,
}

#[derive(Debug)]
struct MemoryDataStoreInner {
    /// store_id -> normalized hex key -> hex value
    stores: HashMap<String, BTreeMap<String, String>>,
    calls: Vec<StoreCall>,
    mirror_result: MirrorRegistration,
    /// Fail every update once this many have been applied
    fail_updates_after: Option<usize>,
    updates_applied: usize,
}

impl Default for MemoryDataStoreInner {
    fn default() -> Self {
        Self {
            stores: HashMap::new(),
            calls: Vec::new(),
            mirror_result: MirrorRegistration {
                success: true,
                error: None,
            },
            fail_updates_after: None,
            updates_applied: 0,
        }
    }
}

impl MemoryDataStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryDataStoreInner::default())),
        }
    }

    /// Put `content` under the key of `relative_path` without recording a call.
    pub fn seed(&self, store_id: &str, relative_path: &str, content: &[u8]) {
        self.inner
            .lock()
            .stores
            .entry(store_id.to_string())
            .or_default()
            .insert(codec::encode(relative_path), codec::encode(content));
    }

    /// Decoded keys of a store, sorted.
    pub fn keys(&self, store_id: &str) -> Vec<String> {
        let inner = self.inner.lock();
        let mut keys: Vec<String> = inner
            .stores
            .get(store_id)
            .map(|entries| {
                entries
                    .keys()
                    .filter_map(|key| codec::decode(key).ok())
                    .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                    .collect()
            })
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Decoded value stored under `relative_path`.
    pub fn value(&self, store_id: &str, relative_path: &str) -> Option<Vec<u8>> {
        let inner = self.inner.lock();
        let value = inner
            .stores
            .get(store_id)?
            .get(&codec::encode(relative_path))?;
        codec::decode(value).ok()
    }

    /// File content under `relative_path`, with multipart manifests followed.
    pub fn read_file(&self, store_id: &str, relative_path: &str) -> Option<Vec<u8>> {
        let value = self.value(store_id, relative_path)?;
        let Some(manifest) = MultipartManifest::from_value(&value) else {
            return Some(value);
        };

        let mut content = Vec::new();
        for part in &manifest.parts {
            content.extend(self.value(store_id, part)?);
        }
        Some(content)
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.inner.lock().calls.clone()
    }

    /// Changelists submitted for `store_id`, in order.
    pub fn updates(&self, store_id: &str) -> Vec<Vec<ChangeOperation>> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                StoreCall::Update {
                    store_id: id,
                    changelist,
                } if id == store_id => Some(changelist.clone()),
                _ => None,
            })
            .collect()
    }

    /// What the next mirror registrations answer.
    pub fn set_mirror_result(&self, result: MirrorRegistration) {
        self.inner.lock().mirror_result = result;
    }

    /// Reject every update after the first `count` succeeded.
    pub fn fail_updates_after(&self, count: usize) {
        self.inner.lock().fail_updates_after = Some(count);
    }
}

impl Default for MemoryDataStore {
    fn default() -> Self {
        Self::new()
    }
}

fn apply(
    entries: &mut BTreeMap<String, String>,
    changelist: &[ChangeOperation],
) -> Result<(), String> {
    for op in changelist {
        let key = codec::normalize_key(&op.key);
        match op.action {
            ChangeAction::Insert => {
                if entries.contains_key(&key) {
                    return Err(format!("Key already present: {}", key));
                }
                entries.insert(key, op.value.clone().unwrap_or_default());
            }
            ChangeAction::Delete => {
                if entries.remove(&key).is_none() {
                    return Err(format!("Key not found: {}", key));
                }
            }
        }
    }
    Ok(())
}

#[async_trait]
impl DataStore for MemoryDataStore {
    async fn get_keys(&self, store_id: &str) -> Result<Vec<String>, RemoteError> {
        let mut inner = self.inner.lock();
        inner.calls.push(StoreCall::GetKeys {
            store_id: store_id.to_string(),
        });

        Ok(inner
            .stores
            .get(store_id)
            .map(|entries| {
                entries
                    .keys()
                    .map(|key| format!("{}{}", codec::HEX_PREFIX, key))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update_data_store(
        &self,
        store_id: &str,
        changelist: &[ChangeOperation],
    ) -> Result<(), RemoteError> {
        let mut inner = self.inner.lock();
        inner.calls.push(StoreCall::Update {
            store_id: store_id.to_string(),
            changelist: changelist.to_vec(),
        });

        if inner
            .fail_updates_after
            .is_some_and(|limit| inner.updates_applied >= limit)
        {
            return Err(RemoteError::Transport("connection reset".to_string()));
        }

        // a changelist applies entirely or not at all
        let mut entries = inner.stores.get(store_id).cloned().unwrap_or_default();
        apply(&mut entries, changelist).map_err(|message| RemoteError::Rejected {
            endpoint: "batch_update".to_string(),
            message,
        })?;

        inner.stores.insert(store_id.to_string(), entries);
        inner.updates_applied += 1;
        Ok(())
    }

    async fn add_mirror(
        &self,
        store_id: &str,
        urls: &[String],
        amount: u64,
        fee: u64,
    ) -> Result<MirrorRegistration, RemoteError> {
        let mut inner = self.inner.lock();
        inner.calls.push(StoreCall::AddMirror {
            store_id: store_id.to_string(),
            urls: urls.to_vec(),
            amount,
            fee,
        });
        Ok(inner.mirror_result.clone())
    }

    async fn add_mirror_for_current_host(
        &self,
        store_id: &str,
        force_ip4: bool,
    ) -> Result<MirrorRegistration, RemoteError> {
        let mut inner = self.inner.lock();
        inner.calls.push(StoreCall::AddMirrorForCurrentHost {
            store_id: store_id.to_string(),
            force_ip4,
        });
        Ok(inner.mirror_result.clone())
    }
}
