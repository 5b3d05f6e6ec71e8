//! Stores.
//!
//! [`FilesystemStore`] backs the local backend, [`ObjectStorage`] backs the S3 backend, and [`MemoryStore`] is
//! used in tests.

mod store_sync;

pub use store_sync::filesystem_store::{FilesystemStore, FilesystemStoreCreateError};
pub use store_sync::memory_store::MemoryStore;

#[cfg(feature = "s3")]
pub use store_sync::object_store::ObjectStorage;
