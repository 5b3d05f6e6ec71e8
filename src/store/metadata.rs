use chrono::{DateTime, Utc};
use derive_more::Display;

use crate::{
    config::{StacType, METADATA_SUFFIX},
    storage::{StoreKey, StoreKeyError},
};

/// The folder of dataset stores below a store root.
pub const DATASETS_FOLDER: &str = "datasets";

/// The folder of metadata documents below a store root.
pub const METADATA_FOLDER: &str = "metadata";

/// The folder of replaced metadata documents below a store root.
pub const HISTORY_FOLDER: &str = "history";

/// The resolved location of a metadata document.
#[derive(Clone, Eq, PartialEq, Debug, Display)]
#[display("{display}")]
pub struct MetadataLocation {
    key: StoreKey,
    display: String,
}

impl MetadataLocation {
    pub(crate) fn new(key: StoreKey, display: String) -> Self {
        Self { key, display }
    }

    /// The key of the document relative to the store root.
    #[must_use]
    pub fn key(&self) -> &StoreKey {
        &self.key
    }

    /// The location as rendered by the store, e.g. `s3://bucket/metadata/datasets/title.json`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.display
    }
}

/// The key of the metadata document `title` of kind `metadata_type`, relative to a store root.
///
/// # Errors
/// Returns [`StoreKeyError`] if `title` does not form a valid key.
pub fn metadata_key(title: &str, metadata_type: StacType) -> Result<StoreKey, StoreKeyError> {
    match metadata_type.folder() {
        "" => StoreKey::new(format!("{METADATA_FOLDER}/{title}.{METADATA_SUFFIX}")),
        folder => StoreKey::new(format!("{METADATA_FOLDER}/{folder}/{title}.{METADATA_SUFFIX}")),
    }
}

/// The key of the history snapshot of the metadata document `title` last modified at `modified`.
///
/// The instant is rendered in UTC to the second, e.g. `history/title/title-2023-08-21T17:30:17.json`.
///
/// # Errors
/// Returns [`StoreKeyError`] if `title` does not form a valid key.
pub fn history_key(title: &str, modified: &DateTime<Utc>) -> Result<StoreKey, StoreKeyError> {
    let stamp = modified.format("%Y-%m-%dT%H:%M:%S");
    StoreKey::new(format!(
        "{HISTORY_FOLDER}/{title}/{title}-{stamp}.{METADATA_SUFFIX}"
    ))
}
