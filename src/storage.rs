//! Key-value storage beneath datasets and metadata documents.
//!
//! A store maps [`StoreKey`]s to byte values. Datasets are written through a store rooted at the dataset path
//! (the "key mapping"), while metadata documents and their history are written through a store rooted at the
//! backend root (the "filesystem handle").
//!
//! This module defines the synchronous storage traits and includes:
//!  - [`FilesystemStore`](store::FilesystemStore): a local directory,
//!  - [`MemoryStore`](store::MemoryStore): an in-process map, used in tests,
//!  - [`ObjectStorage`](store::ObjectStorage): any [`object_store::ObjectStore`] (feature `s3`),
//!  - [`PrefixStorageAdapter`](storage_adapter::PrefixStorageAdapter): a view of a store below a prefix.

pub mod storage_adapter;
mod storage_sync;
pub mod store;
mod store_key;
mod store_prefix;

use std::sync::Arc;

use thiserror::Error;

pub use store_key::{StoreKey, StoreKeyError, StoreKeys};
pub use store_prefix::{StorePrefix, StorePrefixError};

pub use self::storage_sync::{
    ListableStorageTraits, ReadableStorageTraits, ReadableWritableListableStorageTraits,
    ReadableWritableStorageTraits, WritableStorageTraits,
};

/// The bytes of a stored value.
pub type Bytes = bytes::Bytes;

/// An optional stored value. [`None`] if the key is not present.
pub type MaybeBytes = Option<Bytes>;

/// [`Arc`] wrapped readable, writable, and listable storage.
pub type ReadableWritableListableStorage = Arc<dyn ReadableWritableListableStorageTraits>;

/// A storage error.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A write operation was attempted on a read only store.
    #[error("a write operation was attempted on a read only store")]
    ReadOnly,
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    /// An invalid store prefix.
    #[error(transparent)]
    StorePrefixError(#[from] StorePrefixError),
    /// An invalid store key.
    #[error(transparent)]
    InvalidStoreKey(#[from] StoreKeyError),
    /// A key that must exist was not found.
    #[error("key {0} not found")]
    KeyNotFound(StoreKey),
    /// An error from an [`object_store::ObjectStore`].
    #[cfg(feature = "s3")]
    #[error(transparent)]
    ObjectStoreError(#[from] object_store::Error),
    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl From<&str> for StorageError {
    fn from(err: &str) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<String> for StorageError {
    fn from(err: String) -> Self {
        Self::Other(err)
    }
}
