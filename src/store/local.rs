use std::{
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use super::{
    ArrayStore, HandleCache, MetadataStore, StoreCreateError, StoreError, DATASETS_FOLDER,
};
use crate::{
    config::{DatasetConfig, ARRAY_SUFFIX},
    storage::{
        storage_adapter::PrefixStorageAdapter,
        store::{FilesystemStore, FilesystemStoreCreateError},
        ReadableWritableListableStorage, StoreKey, StorePrefix,
    },
};

/// A store in a local directory.
///
/// The dataset store of dataset key `key` is at `{root}/datasets/{key}.zarr` unless a custom output path is
/// configured.
#[derive(Debug)]
pub struct Local {
    config: DatasetConfig,
    root: PathBuf,
    filesystem: HandleCache<ReadableWritableListableStorage>,
    mapping: HandleCache<ReadableWritableListableStorage>,
}

impl std::fmt::Display for Local {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Local")
    }
}

impl Local {
    /// Create a local store of the dataset configured by `config` below the directory `root`.
    ///
    /// The directory is created when the store is first written to.
    ///
    /// # Errors
    /// Returns [`StoreCreateError`] if `root` is a file or not valid on this system.
    pub fn new<P: AsRef<Path>>(config: DatasetConfig, root: P) -> Result<Self, StoreCreateError> {
        let root = root.as_ref().to_path_buf();
        if root.to_str().is_none() || root.is_file() {
            return Err(FilesystemStoreCreateError::InvalidBasePath(root).into());
        }
        Ok(Self {
            config,
            root,
            filesystem: HandleCache::new(),
            mapping: HandleCache::new(),
        })
    }

    /// The root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The directory of the dataset store.
    #[must_use]
    pub fn dataset_path(&self) -> PathBuf {
        match &self.config.custom_output_path {
            Some(path) => PathBuf::from(path),
            None => self
                .root
                .join(DATASETS_FOLDER)
                .join(format!("{}.{ARRAY_SUFFIX}", self.config.key())),
        }
    }

    /// The prefix of `path` below the root directory, if it is below it.
    fn root_prefix(&self, path: &Path) -> Option<StorePrefix> {
        let relative = pathdiff::diff_paths(path, &self.root)?;
        let segments = relative
            .components()
            .map(|component| match component {
                Component::Normal(segment) => segment.to_str(),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()?;
        if segments.is_empty() {
            None
        } else {
            StorePrefix::from_path(&segments.join("/")).ok()
        }
    }
}

impl ArrayStore for Local {
    fn config(&self) -> &DatasetConfig {
        &self.config
    }

    fn path(&self) -> String {
        match &self.config.custom_output_path {
            Some(path) => path.clone(),
            None => self.dataset_path().display().to_string(),
        }
    }

    fn filesystem_handle(&self, refresh: bool) -> Result<ReadableWritableListableStorage, StoreError> {
        self.filesystem.get_or_try_init(refresh, || {
            tracing::debug!(root = %self.root.display(), "building filesystem handle");
            let store: ReadableWritableListableStorage = Arc::new(FilesystemStore::new(&self.root)?);
            Ok(store)
        })
    }

    fn key_mapping(&self, refresh: bool) -> Result<ReadableWritableListableStorage, StoreError> {
        self.mapping.get_or_try_init(refresh, || {
            let path = self.dataset_path();
            tracing::debug!(path = %path.display(), "building key mapping");
            let mapping: ReadableWritableListableStorage = match self.root_prefix(&path) {
                Some(prefix) => Arc::new(PrefixStorageAdapter::new(
                    self.filesystem_handle(refresh)?,
                    prefix,
                )),
                None => Arc::new(FilesystemStore::new(&path)?),
            };
            Ok(mapping)
        })
    }
}

impl MetadataStore for Local {
    fn render_location(&self, key: &StoreKey) -> String {
        self.root.join(key.as_str()).display().to_string()
    }
}
