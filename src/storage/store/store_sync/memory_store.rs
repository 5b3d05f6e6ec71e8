//! An in-memory store.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::storage::{
    Bytes, ListableStorageTraits, MaybeBytes, ReadableStorageTraits,
    ReadableWritableStorageTraits, StorageError, StoreKey, StoreKeys, StorePrefix,
    WritableStorageTraits,
};

use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct MemoryEntry {
    bytes: Bytes,
    modified: DateTime<Utc>,
}

/// An in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data_map: RwLock<BTreeMap<StoreKey, MemoryEntry>>,
}

impl MemoryStore {
    /// Create a new, empty, memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` at `key` with an explicit modification time.
    pub fn set_with_modified(&self, key: &StoreKey, value: Bytes, modified: DateTime<Utc>) {
        self.data_map.write().insert(
            key.clone(),
            MemoryEntry {
                bytes: value,
                modified,
            },
        );
    }
}

impl ReadableStorageTraits for MemoryStore {
    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        Ok(self.data_map.read().get(key).map(|entry| entry.bytes.clone()))
    }

    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        Ok(self
            .data_map
            .read()
            .get(key)
            .map(|entry| entry.bytes.len() as u64))
    }

    fn last_modified(&self, key: &StoreKey) -> Result<Option<DateTime<Utc>>, StorageError> {
        Ok(self.data_map.read().get(key).map(|entry| entry.modified))
    }
}

impl WritableStorageTraits for MemoryStore {
    fn set(&self, key: &StoreKey, value: Bytes) -> Result<(), StorageError> {
        self.set_with_modified(key, value, Utc::now());
        Ok(())
    }

    fn erase(&self, key: &StoreKey) -> Result<(), StorageError> {
        self.data_map.write().remove(key);
        Ok(())
    }

    fn erase_prefix(&self, prefix: &StorePrefix) -> Result<(), StorageError> {
        self.data_map.write().retain(|key, _| !key.has_prefix(prefix));
        Ok(())
    }
}

impl ReadableWritableStorageTraits for MemoryStore {}

impl ListableStorageTraits for MemoryStore {
    fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError> {
        Ok(self
            .data_map
            .read()
            .keys()
            .filter(|&key| key.has_prefix(prefix))
            .cloned()
            .collect())
    }
}
