//! Groups.
//!
//! The root of every dataset store is a group. Its `zarr.json` carries the dataset attributes, for example:
//! ```json
//! {
//!     "zarr_format": 3,
//!     "node_type": "group",
//!     "attributes": {
//!         "date range": ["2021010100", "2021013100"],
//!         "update_previous_end_date": "2021013000"
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    array::METADATA_KEY,
    storage::{
        Bytes, ReadableWritableListableStorage, StorageError, StoreKey, StoreKeyError,
        StorePrefix, StorePrefixError,
    },
};

/// Group metadata (`zarr.json` of a group).
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct GroupMetadata {
    /// Must be `3`.
    pub zarr_format: monostate::MustBe!(3u64),
    /// Must be `group`.
    pub node_type: monostate::MustBe!("group"),
    /// User defined attributes.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl GroupMetadata {
    /// Create group metadata with `attributes`.
    #[must_use]
    pub fn new(attributes: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            zarr_format: monostate::MustBe!(3u64),
            node_type: monostate::MustBe!("group"),
            attributes,
        }
    }
}

impl Default for GroupMetadata {
    fn default() -> Self {
        Self::new(serde_json::Map::default())
    }
}

/// A group.
#[derive(Clone)]
pub struct Group {
    storage: ReadableWritableListableStorage,
    prefix: StorePrefix,
    metadata: GroupMetadata,
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("prefix", &self.prefix)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// A group creation error.
#[derive(Debug, Error)]
pub enum GroupCreateError {
    /// An invalid group path.
    #[error(transparent)]
    InvalidPath(#[from] StorePrefixError),
    /// An invalid metadata key.
    #[error(transparent)]
    InvalidKey(#[from] StoreKeyError),
    /// Storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// An error (de)serializing the metadata.
    #[error(transparent)]
    MetadataError(#[from] serde_json::Error),
    /// Missing metadata.
    #[error("group metadata is missing")]
    MissingMetadata,
}

impl Group {
    /// Create a group at `path` of `storage` with `metadata`.
    ///
    /// # Errors
    /// Returns [`GroupCreateError`] if `path` is invalid.
    pub fn create(
        storage: ReadableWritableListableStorage,
        path: &str,
        metadata: GroupMetadata,
    ) -> Result<Self, GroupCreateError> {
        Ok(Self {
            storage,
            prefix: StorePrefix::from_path(path)?,
            metadata,
        })
    }

    /// Open the existing group at `path` of `storage`.
    ///
    /// # Errors
    /// Returns [`GroupCreateError::MissingMetadata`] if there is no metadata at `path`, or another
    /// [`GroupCreateError`] if the metadata is not a group.
    pub fn open(storage: ReadableWritableListableStorage, path: &str) -> Result<Self, GroupCreateError> {
        let prefix = StorePrefix::from_path(path)?;
        let metadata = storage
            .get(&metadata_key(&prefix)?)?
            .ok_or(GroupCreateError::MissingMetadata)?;
        let metadata: GroupMetadata = serde_json::from_slice(&metadata)?;
        Ok(Self {
            storage,
            prefix,
            metadata,
        })
    }

    /// Return the group attributes.
    #[must_use]
    pub fn attributes(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.metadata.attributes
    }

    /// Mutably borrow the group attributes.
    pub fn attributes_mut(&mut self) -> &mut serde_json::Map<String, serde_json::Value> {
        &mut self.metadata.attributes
    }

    /// Store the group metadata.
    ///
    /// # Errors
    /// Returns a [`GroupCreateError`] on failure to serialize or store the metadata.
    pub fn store_metadata(&self) -> Result<(), GroupCreateError> {
        let json = serde_json::to_vec_pretty(&self.metadata)?;
        self.storage
            .set(&metadata_key(&self.prefix)?, Bytes::from(json))?;
        Ok(())
    }
}

fn metadata_key(prefix: &StorePrefix) -> Result<StoreKey, StoreKeyError> {
    prefix.join(METADATA_KEY)
}
