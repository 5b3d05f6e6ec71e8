use chrono::{DateTime, Utc};

use crate::storage::{
    Bytes, ListableStorageTraits, MaybeBytes, ReadableStorageTraits,
    ReadableWritableListableStorage, ReadableWritableStorageTraits, StorageError, StoreKey,
    StoreKeys, StorePrefix, WritableStorageTraits,
};

/// A view of a store below a prefix.
///
/// Key `k` of the adapter is key `{prefix}k` of the inner store.
#[derive(Clone)]
pub struct PrefixStorageAdapter {
    storage: ReadableWritableListableStorage,
    prefix: StorePrefix,
}

impl std::fmt::Debug for PrefixStorageAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrefixStorageAdapter")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl PrefixStorageAdapter {
    /// Create a new prefix storage adapter.
    #[must_use]
    pub fn new(storage: ReadableWritableListableStorage, prefix: StorePrefix) -> Self {
        Self { storage, prefix }
    }

    /// The prefix of the view in the inner store.
    #[must_use]
    pub fn prefix(&self) -> &StorePrefix {
        &self.prefix
    }

    fn inner_key(&self, key: &StoreKey) -> Result<StoreKey, StorageError> {
        Ok(self.prefix.join(key.as_str())?)
    }

    fn inner_prefix(&self, prefix: &StorePrefix) -> Result<StorePrefix, StorageError> {
        Ok(self.prefix.child(prefix.as_str())?)
    }
}

impl ReadableStorageTraits for PrefixStorageAdapter {
    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        self.storage.get(&self.inner_key(key)?)
    }

    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        self.storage.size_key(&self.inner_key(key)?)
    }

    fn last_modified(&self, key: &StoreKey) -> Result<Option<DateTime<Utc>>, StorageError> {
        self.storage.last_modified(&self.inner_key(key)?)
    }
}

impl WritableStorageTraits for PrefixStorageAdapter {
    fn set(&self, key: &StoreKey, value: Bytes) -> Result<(), StorageError> {
        self.storage.set(&self.inner_key(key)?, value)
    }

    fn erase(&self, key: &StoreKey) -> Result<(), StorageError> {
        self.storage.erase(&self.inner_key(key)?)
    }

    fn erase_prefix(&self, prefix: &StorePrefix) -> Result<(), StorageError> {
        self.storage.erase_prefix(&self.inner_prefix(prefix)?)
    }
}

impl ReadableWritableStorageTraits for PrefixStorageAdapter {
    fn copy(&self, from: &StoreKey, to: &StoreKey) -> Result<(), StorageError> {
        self.storage
            .copy(&self.inner_key(from)?, &self.inner_key(to)?)
    }
}

impl ListableStorageTraits for PrefixStorageAdapter {
    fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError> {
        Ok(self
            .storage
            .list_prefix(&self.inner_prefix(prefix)?)?
            .iter()
            .filter_map(|key| key.strip_prefix(&self.prefix))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::store::MemoryStore;
    use std::{error::Error, sync::Arc};

    #[test]
    fn prefix_adapter() -> Result<(), Box<dyn Error>> {
        let inner = Arc::new(MemoryStore::new());
        inner.set(&"outside".try_into()?, Bytes::from_static(b"x"))?;
        let adapter =
            PrefixStorageAdapter::new(inner.clone(), StorePrefix::from_path("datasets/a.zarr")?);

        adapter.set(&"zarr.json".try_into()?, Bytes::from_static(b"{}"))?;
        adapter.set(&"t/c/0".try_into()?, Bytes::from_static(b"0"))?;
        assert!(inner.exists(&"datasets/a.zarr/zarr.json".try_into()?)?);
        assert_eq!(
            adapter.list()?,
            &["t/c/0".try_into()?, "zarr.json".try_into()?]
        );
        assert_eq!(adapter.list_prefix(&"t/".try_into()?)?, &["t/c/0".try_into()?]);

        adapter.erase_prefix(&StorePrefix::root())?;
        assert!(adapter.list()?.is_empty());
        assert!(inner.exists(&"outside".try_into()?)?);
        Ok(())
    }
}
