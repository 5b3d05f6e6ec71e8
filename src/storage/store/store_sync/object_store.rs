//! A synchronous store over any [`object_store::ObjectStore`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt};
use object_store::{path::Path, ObjectStore};

use crate::storage::{
    Bytes, ListableStorageTraits, MaybeBytes, ReadableStorageTraits,
    ReadableWritableStorageTraits, StorageError, StoreKey, StoreKeys, StorePrefix,
    WritableStorageTraits,
};

/// Maps a [`StoreKey`] to an [`object_store`] path.
fn key_to_path(key: &StoreKey) -> Path {
    Path::from(key.as_str())
}

/// Maps a [`StorePrefix`] to an [`object_store`] path. The root prefix maps to [`None`].
fn prefix_to_path(prefix: &StorePrefix) -> Option<Path> {
    (!prefix.is_root()).then(|| Path::from(prefix.as_str()))
}

/// Map [`object_store::Error::NotFound`] to None, pass through other errors
fn handle_result<T>(result: Result<T, object_store::Error>) -> Result<Option<T>, StorageError> {
    match result {
        Ok(result) => Ok(Some(result)),
        Err(object_store::Error::NotFound { .. }) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// A synchronous store backed by an [`object_store::ObjectStore`].
///
/// Requests are driven to completion on a private current thread `tokio` runtime.
/// Methods will panic if called within an asynchronous execution context.
pub struct ObjectStorage {
    object_store: Arc<dyn ObjectStore>,
    runtime: tokio::runtime::Runtime,
}

impl std::fmt::Debug for ObjectStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStorage")
            .field("object_store", &self.object_store.to_string())
            .finish_non_exhaustive()
    }
}

impl ObjectStorage {
    /// Create a new [`ObjectStorage`].
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the runtime cannot be created.
    pub fn new(object_store: Arc<dyn ObjectStore>) -> Result<Self, StorageError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            object_store,
            runtime,
        })
    }

    /// The underlying object store.
    #[must_use]
    pub fn object_store(&self) -> &Arc<dyn ObjectStore> {
        &self.object_store
    }

    fn block_on<F: core::future::Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

impl ReadableStorageTraits for ObjectStorage {
    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        self.block_on(async {
            let get = handle_result(self.object_store.get(&key_to_path(key)).await)?;
            if let Some(get) = get {
                Ok(Some(get.bytes().await?))
            } else {
                Ok(None)
            }
        })
    }

    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        Ok(
            handle_result(self.block_on(self.object_store.head(&key_to_path(key))))?
                .map(|meta| meta.size as u64),
        )
    }

    fn last_modified(&self, key: &StoreKey) -> Result<Option<DateTime<Utc>>, StorageError> {
        Ok(
            handle_result(self.block_on(self.object_store.head(&key_to_path(key))))?
                .map(|meta| meta.last_modified),
        )
    }
}

impl WritableStorageTraits for ObjectStorage {
    fn set(&self, key: &StoreKey, value: Bytes) -> Result<(), StorageError> {
        self.block_on(self.object_store.put(&key_to_path(key), value.into()))?;
        Ok(())
    }

    fn erase(&self, key: &StoreKey) -> Result<(), StorageError> {
        handle_result(self.block_on(self.object_store.delete(&key_to_path(key))))?;
        Ok(())
    }

    fn erase_prefix(&self, prefix: &StorePrefix) -> Result<(), StorageError> {
        let prefix = prefix_to_path(prefix);
        self.block_on(async {
            let locations = self
                .object_store
                .list(prefix.as_ref())
                .map_ok(|m| m.location)
                .boxed();
            self.object_store
                .delete_stream(locations)
                .try_collect::<Vec<Path>>()
                .await
        })?;
        Ok(())
    }
}

impl ReadableWritableStorageTraits for ObjectStorage {
    fn copy(&self, from: &StoreKey, to: &StoreKey) -> Result<(), StorageError> {
        match self.block_on(
            self.object_store
                .copy(&key_to_path(from), &key_to_path(to)),
        ) {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Err(StorageError::KeyNotFound(from.clone())),
            Err(err) => Err(err.into()),
        }
    }
}

impl ListableStorageTraits for ObjectStorage {
    fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError> {
        let path = prefix_to_path(prefix);
        let metas = self.block_on(
            self.object_store
                .list(path.as_ref())
                .try_collect::<Vec<_>>(),
        )?;
        let mut list = metas
            .into_iter()
            .map(|object_meta| {
                let path: &str = object_meta.location.as_ref();
                StoreKey::try_from(path)
            })
            .collect::<Result<Vec<_>, _>>()?;
        list.sort();
        Ok(list)
    }
}
