//! Dataset and metadata stores.
//!
//! An [`ArrayStore`] persists a time-indexed dataset as a chunked array store and applies region writes to it. A
//! [`MetadataStore`] persists the JSON metadata documents of datasets, keeping a history snapshot of every document
//! it replaces.
//!
//! Stores are laid out below a root:
//!  - `datasets/{key}.zarr/` holds the dataset store of the dataset with key `key`, unless a custom output path is
//!    configured,
//!  - `metadata/{type}/{title}.json` holds metadata documents, without the `{type}` segment for catalogs, and
//!  - `history/{title}/{title}-{%Y-%m-%dT%H:%M:%S}.json` holds replaced metadata documents, stamped with the instant
//!    they were last modified.
//!
//! Two backends are provided: [`Local`] for a local directory and [`S3`] for an S3 bucket (with the `s3` feature).

mod cache;
mod dataset_io;
mod local;
mod metadata;
#[cfg(feature = "s3")]
mod s3;

pub use self::{
    cache::HandleCache,
    local::Local,
    metadata::{history_key, metadata_key, MetadataLocation, DATASETS_FOLDER, HISTORY_FOLDER, METADATA_FOLDER},
};

#[cfg(feature = "s3")]
pub use self::s3::{S3Options, S3};

use std::ops::Range;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    array::{ArrayCreateError, ArrayError, METADATA_KEY},
    attributes::Attributes,
    config::{DatasetConfig, StacType},
    dataset::{Dataset, DatasetError},
    group::{Group, GroupCreateError},
    storage::{
        store::FilesystemStoreCreateError, Bytes, ReadableWritableListableStorage, StorageError,
        StoreKey, StoreKeyError, StorePrefixError,
    },
};

/// Options for [`ArrayStore::open`].
#[derive(Clone, Debug, Default)]
pub struct OpenOptions {
    /// Rebuild the key mapping before reading.
    pub refresh: bool,
    /// The data variables to read, or [`None`] for all of them.
    pub variables: Option<Vec<String>>,
}

/// How [`ArrayStore::write`] treats an existing dataset.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum WriteMode {
    /// Erase any existing dataset and write the dataset in full.
    #[default]
    Overwrite,
    /// Extend an existing dataset along the time dimension. Writes in full if there is no existing dataset.
    Append,
}

/// A store construction error.
#[derive(Debug, Error)]
pub enum StoreCreateError {
    /// The bucket name is empty.
    #[error("bucket name must not be empty")]
    EmptyBucket,
    /// The custom output path cannot be used with the store.
    #[error("custom output path {0} is not valid for this store")]
    InvalidCustomPath(String),
    /// The root directory is not valid.
    #[error(transparent)]
    FilesystemStoreCreateError(#[from] FilesystemStoreCreateError),
}

/// A store error.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// An error opening or creating an array.
    #[error(transparent)]
    ArrayCreateError(#[from] ArrayCreateError),
    /// An error reading or writing an array.
    #[error(transparent)]
    ArrayError(#[from] ArrayError),
    /// An error opening or creating the root group.
    #[error(transparent)]
    GroupCreateError(#[from] GroupCreateError),
    /// An invalid dataset.
    #[error(transparent)]
    DatasetError(#[from] DatasetError),
    /// An error (de)serializing a metadata document.
    #[error(transparent)]
    SerializationError(#[from] serde_json::Error),
    /// An invalid store key.
    #[error(transparent)]
    InvalidKey(#[from] StoreKeyError),
    /// An invalid store prefix.
    #[error(transparent)]
    InvalidPrefix(#[from] StorePrefixError),
    /// An error creating a filesystem store.
    #[error(transparent)]
    FilesystemStoreCreateError(#[from] FilesystemStoreCreateError),
    /// An object store error.
    #[cfg(feature = "s3")]
    #[error(transparent)]
    ObjectStoreError(#[from] object_store::Error),
    /// Credentials that cannot be resolved.
    #[error("credentials error: {0}")]
    CredentialsError(String),
    /// The operation requires an existing dataset.
    #[error("there is no existing dataset at {0}")]
    NoExistingDataset(String),
    /// A region that does not match the dataset written to it.
    #[error("region {region:?} cannot hold {len} time steps of an existing time axis of length {existing_len}")]
    RegionMismatch {
        /// The region.
        region: Range<u64>,
        /// The length of the time axis of the dataset.
        len: usize,
        /// The length of the existing time axis.
        existing_len: u64,
    },
    /// A variable that does not match the existing dataset.
    #[error("variable {0} does not match the existing dataset")]
    IncompatibleVariable(String),
    /// An append that does not start one accepted step after the end of the existing time axis.
    #[error("cannot append at {next} after the existing time axis ending at {previous}")]
    UnexpectedAppendStep {
        /// The last timestamp of the existing time axis.
        previous: DateTime<Utc>,
        /// The first timestamp of the appended dataset.
        next: DateTime<Utc>,
    },
    /// A stored timestamp outside of the representable range.
    #[error("stored timestamp {0} is out of range")]
    InvalidTime(i64),
}

/// A store of a time-indexed dataset.
///
/// Implementations own their cached handles. The handles returned by [`filesystem_handle`](ArrayStore::filesystem_handle)
/// and [`key_mapping`](ArrayStore::key_mapping) are built once and reused until a refresh is requested.
pub trait ArrayStore: Send + Sync + std::fmt::Display {
    /// The configuration of the dataset.
    fn config(&self) -> &DatasetConfig;

    /// The location of the dataset store.
    ///
    /// This is the custom output path of the dataset if configured, otherwise `{root}/datasets/{key}.zarr`.
    fn path(&self) -> String;

    /// The storage at the root of the store.
    ///
    /// # Errors
    /// Returns a [`StoreError`] if the handle cannot be built.
    fn filesystem_handle(&self, refresh: bool) -> Result<ReadableWritableListableStorage, StoreError>;

    /// The storage at the dataset store, keyed relative to [`path`](ArrayStore::path).
    ///
    /// # Errors
    /// Returns a [`StoreError`] if the mapping cannot be built.
    fn key_mapping(&self, refresh: bool) -> Result<ReadableWritableListableStorage, StoreError>;

    /// Returns true if there is a dataset store at [`path`](ArrayStore::path).
    ///
    /// # Errors
    /// Returns a [`StoreError`] if the store cannot be reached.
    fn has_existing(&self) -> Result<bool, StoreError> {
        let key = StoreKey::new(METADATA_KEY)?;
        Ok(self.key_mapping(false)?.exists(&key)?)
    }

    /// Read the existing dataset.
    ///
    /// Returns [`None`] without reading if there is no existing dataset.
    ///
    /// # Errors
    /// Returns a [`StoreError`] if the dataset cannot be read.
    fn open(&self, options: &OpenOptions) -> Result<Option<Dataset>, StoreError> {
        let storage = self.key_mapping(options.refresh)?;
        if !self.has_existing()? {
            tracing::debug!(path = %self.path(), "no existing dataset");
            return Ok(None);
        }
        dataset_io::read_dataset(&storage, self.config(), options.variables.as_deref()).map(Some)
    }

    /// Write `dataset` to the store.
    ///
    /// # Errors
    /// Returns [`StoreError::UnexpectedAppendStep`] if an appended dataset does not start one accepted step after the
    /// existing time axis, or another [`StoreError`] if the dataset does not match the existing dataset or cannot be
    /// written.
    fn write(&self, dataset: &Dataset, mode: WriteMode) -> Result<(), StoreError> {
        let storage = self.key_mapping(false)?;
        match mode {
            WriteMode::Append if self.has_existing()? => {
                let (existing_len, existing_end) =
                    dataset_io::existing_time_end(&storage, dataset.time_dim())?;
                if let (Some(previous), Some(&next)) = (existing_end, dataset.times().first()) {
                    let config = self.config();
                    if !config
                        .validator()
                        .accepts_step(next - previous, config.expected_delta())
                    {
                        return Err(StoreError::UnexpectedAppendStep { previous, next });
                    }
                }
                let region = existing_len..existing_len + dataset.times().len() as u64;
                tracing::info!(store = %self, path = %self.path(), region = ?region, "appending dataset");
                dataset_io::write_region(&storage, dataset, region)
            }
            WriteMode::Append | WriteMode::Overwrite => {
                tracing::info!(store = %self, path = %self.path(), "writing dataset");
                dataset_io::write_dataset(&storage, dataset, self.config())
            }
        }
    }

    /// Write `dataset` to the positions `region` of the time axis of the existing dataset.
    ///
    /// All other positions are left untouched. The time axis grows if `region` extends past its end.
    ///
    /// # Errors
    /// Returns a [`StoreError`] if there is no existing dataset, `region` does not match `dataset`, or the region cannot
    /// be written.
    fn write_region(&self, dataset: &Dataset, region: Range<u64>) -> Result<(), StoreError> {
        if !self.has_existing()? {
            return Err(StoreError::NoExistingDataset(self.path()));
        }
        tracing::info!(store = %self, path = %self.path(), region = ?region, "writing region");
        dataset_io::write_region(&self.key_mapping(false)?, dataset, region)
    }
}

/// A store of dataset metadata documents.
pub trait MetadataStore: ArrayStore {
    /// Render the location of `key` of the [root storage](ArrayStore::filesystem_handle).
    fn render_location(&self, key: &StoreKey) -> String;

    /// The location of the metadata document `title` of kind `metadata_type`.
    ///
    /// # Errors
    /// Returns [`StoreError::InvalidKey`] if `title` does not form a valid key.
    fn metadata_path(
        &self,
        title: &str,
        metadata_type: StacType,
    ) -> Result<MetadataLocation, StoreError> {
        let key = metadata_key(title, metadata_type)?;
        let display = self.render_location(&key);
        Ok(MetadataLocation::new(key, display))
    }

    /// Returns true if the metadata document `title` of kind `metadata_type` exists.
    ///
    /// # Errors
    /// Returns a [`StoreError`] if the store cannot be reached.
    fn exists(&self, title: &str, metadata_type: StacType) -> Result<bool, StoreError> {
        let location = self.metadata_path(title, metadata_type)?;
        Ok(self.filesystem_handle(false)?.exists(location.key())?)
    }

    /// Write `content` as the metadata document `title` of kind `metadata_type`.
    ///
    /// An existing document is first copied to its history location, stamped with its last modified instant.
    ///
    /// # Errors
    /// Returns a [`StoreError`] if the document cannot be serialized, the existing document cannot be copied, or the
    /// document cannot be written.
    fn push(
        &self,
        title: &str,
        content: &serde_json::Value,
        metadata_type: StacType,
    ) -> Result<MetadataLocation, StoreError> {
        let storage = self.filesystem_handle(false)?;
        let location = self.metadata_path(title, metadata_type)?;
        if let Some(modified) = storage.last_modified(location.key())? {
            let history = history_key(title, &modified)?;
            storage.copy(location.key(), &history)?;
            tracing::info!(
                from = %location,
                to = %self.render_location(&history),
                "archived metadata"
            );
        }
        let bytes = serde_json::to_vec_pretty(content)?;
        storage.set(location.key(), Bytes::from(bytes))?;
        tracing::info!(location = %location, "pushed metadata");
        Ok(location)
    }

    /// Read the metadata document `title` of kind `metadata_type`.
    ///
    /// Returns [`None`] if the document does not exist.
    ///
    /// # Errors
    /// Returns a [`StoreError`] if the document cannot be read or deserialized.
    fn retrieve(
        &self,
        title: &str,
        metadata_type: StacType,
    ) -> Result<Option<(serde_json::Value, MetadataLocation)>, StoreError> {
        let location = self.metadata_path(title, metadata_type)?;
        let Some(bytes) = self.filesystem_handle(false)?.get(location.key())? else {
            return Ok(None);
        };
        let content = serde_json::from_slice(&bytes)?;
        Ok(Some((content, location)))
    }

    /// Merge `attributes` into the attributes of the existing dataset store's root group.
    ///
    /// Keys in `attributes` are added or overwritten and all other keys are kept. No history is kept.
    ///
    /// # Errors
    /// Returns [`StoreError::NoExistingDataset`] if there is no existing dataset, or another [`StoreError`] if the
    /// attributes cannot be read or written.
    fn write_metadata_only(&self, attributes: &Attributes) -> Result<(), StoreError> {
        let mut group = match Group::open(self.key_mapping(false)?, "") {
            Ok(group) => group,
            Err(GroupCreateError::MissingMetadata) => {
                return Err(StoreError::NoExistingDataset(self.path()))
            }
            Err(err) => return Err(err.into()),
        };
        group
            .attributes_mut()
            .extend(attributes.iter().map(|(key, value)| (key.clone(), value.clone())));
        group.store_metadata()?;
        tracing::info!(path = %self.path(), keys = ?attributes.keys().collect::<Vec<_>>(), "updated dataset attributes");
        Ok(())
    }
}
