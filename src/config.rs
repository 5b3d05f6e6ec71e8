//! Configuration.
//!
//! [`Config`] holds process wide defaults. [`DatasetConfig`] describes one dataset: its name, temporal resolution,
//! variant, irregular update cadence, and where it is written.

use std::{collections::BTreeMap, path::Path};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;

use crate::{
    dims::{DatasetVariant, StandardDims},
    time_axis::{IrregularCadence, TimeAxisValidator, TimeResolution},
};

/// Global configuration options.
///
/// Retrieve the global [`Config`] with [`global_config`] and modify it with [`global_config_mut`].
///
/// ## Default Time Chunk Length
/// > default: `100`
///
/// The chunk length along the time dimension of new arrays, unless the dataset requests otherwise.
///
/// ## Default Spatial Chunk Length
/// > default: `64`
///
/// The chunk length along every other dimension of new arrays, unless the dataset requests otherwise.
#[derive(Debug)]
pub struct Config {
    default_time_chunk_length: u64,
    default_spatial_chunk_length: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            default_time_chunk_length: 100,
            default_spatial_chunk_length: 64,
        }
    }
}

impl Config {
    /// Get the [default time chunk length](#default-time-chunk-length) configuration.
    #[must_use]
    pub fn default_time_chunk_length(&self) -> u64 {
        self.default_time_chunk_length
    }

    /// Set the [default time chunk length](#default-time-chunk-length) configuration.
    ///
    /// A length of zero is treated as one.
    pub fn set_default_time_chunk_length(&mut self, length: u64) -> &mut Self {
        self.default_time_chunk_length = length.max(1);
        self
    }

    /// Get the [default spatial chunk length](#default-spatial-chunk-length) configuration.
    #[must_use]
    pub fn default_spatial_chunk_length(&self) -> u64 {
        self.default_spatial_chunk_length
    }

    /// Set the [default spatial chunk length](#default-spatial-chunk-length) configuration.
    ///
    /// A length of zero is treated as one.
    pub fn set_default_spatial_chunk_length(&mut self, length: u64) -> &mut Self {
        self.default_spatial_chunk_length = length.max(1);
        self
    }
}

static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();

/// Returns a reference to the global configuration.
///
/// Might deadlock if the global config is already held mutably by the current thread.
pub fn global_config() -> RwLockReadGuard<'static, Config> {
    CONFIG.get_or_init(|| RwLock::new(Config::default())).read()
}

/// Returns a mutable reference to the global configuration.
///
/// Might deadlock if the global config is already held by the current thread.
pub fn global_config_mut() -> RwLockWriteGuard<'static, Config> {
    CONFIG.get_or_init(|| RwLock::new(Config::default())).write()
}

/// The suffix of dataset stores.
pub const ARRAY_SUFFIX: &str = "zarr";

/// The suffix of metadata documents.
pub const METADATA_SUFFIX: &str = "json";

/// The kind of a metadata document, selecting the folder it is stored in.
#[derive(Serialize, Deserialize, Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
#[serde(rename_all = "lowercase")]
pub enum StacType {
    /// A catalog, stored directly below the metadata root.
    Catalog,
    /// A collection, stored in `collections`.
    Collection,
    /// An item, stored in `datasets`.
    #[default]
    Item,
}

impl StacType {
    /// The folder of documents of this kind, empty for the metadata root.
    #[must_use]
    pub fn folder(&self) -> &'static str {
        match self {
            Self::Catalog => "",
            Self::Collection => "collections",
            Self::Item => "datasets",
        }
    }
}

/// A dataset configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An IO error reading the configuration.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    /// The configuration is not valid JSON or has invalid fields.
    #[error(transparent)]
    InvalidConfig(#[from] serde_json::Error),
    /// The dataset name is empty.
    #[error("dataset name must not be empty")]
    EmptyDatasetName,
    /// A requested chunk length is zero.
    #[error("requested chunk length for dimension {0} must be positive")]
    InvalidChunkLength(String),
}

fn is_false(value: &bool) -> bool {
    !value
}

/// The configuration of a dataset.
///
/// ```json
/// {
///     "dataset_name": "chirps_final_05",
///     "time_resolution": "daily",
///     "variant": "regular",
///     "irregular_update_cadence": ["3d", "4d"],
///     "update_attributes": ["bbox"],
///     "requested_chunks": {"time": 50}
/// }
/// ```
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DatasetConfig {
    /// The name of the dataset.
    pub dataset_name: String,
    /// The temporal resolution of the dataset.
    pub time_resolution: TimeResolution,
    /// The variant of the dataset.
    #[serde(default)]
    pub variant: DatasetVariant,
    /// Acceptable steps between timestamps beyond the nominal step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub irregular_update_cadence: Option<IrregularCadence>,
    /// Custom attribute keys that are moved out of the dataset attributes after parsing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub update_attributes: Vec<String>,
    /// Chunk lengths by dimension name, overriding the [global defaults](Config).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub requested_chunks: BTreeMap<String, u64>,
    /// A store path used verbatim instead of the derived dataset path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_output_path: Option<String>,
    /// The kind of the dataset's metadata document.
    #[serde(default)]
    pub metadata_type: StacType,
    /// Whether the dataset is published as a hindcast, overriding `variant` when set.
    #[serde(default, skip_serializing_if = "is_false")]
    pub hindcast: bool,
}

impl DatasetConfig {
    /// Create a regular dataset configuration with defaults for all optional fields.
    #[must_use]
    pub fn new(dataset_name: impl Into<String>, time_resolution: TimeResolution) -> Self {
        Self {
            dataset_name: dataset_name.into(),
            time_resolution,
            variant: DatasetVariant::Regular,
            irregular_update_cadence: None,
            update_attributes: Vec::new(),
            requested_chunks: BTreeMap::new(),
            custom_output_path: None,
            metadata_type: StacType::default(),
            hindcast: false,
        }
    }

    /// Parse and validate a configuration from JSON.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if the JSON is invalid or the configuration fails [validation](DatasetConfig::validate).
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a configuration from a JSON file.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if the file cannot be read or [`from_json_str`](DatasetConfig::from_json_str) fails.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if the dataset name is empty or a requested chunk length is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dataset_name.is_empty() {
            return Err(ConfigError::EmptyDatasetName);
        }
        if let Some((dim, _)) = self.requested_chunks.iter().find(|(_, length)| **length == 0) {
            return Err(ConfigError::InvalidChunkLength(dim.clone()));
        }
        Ok(())
    }

    /// The canonical key of the dataset, `{dataset_name}-{time_resolution}`.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}-{}", self.dataset_name, self.time_resolution)
    }

    /// The active variant, accounting for the hindcast flag.
    #[must_use]
    pub fn variant(&self) -> DatasetVariant {
        if self.hindcast {
            DatasetVariant::Hindcast
        } else {
            self.variant
        }
    }

    /// The standard dimensions of the dataset.
    #[must_use]
    pub fn standard_dims(&self) -> StandardDims {
        self.variant().standard_dims()
    }

    /// The time dimension of the dataset.
    #[must_use]
    pub fn time_dim(&self) -> &'static str {
        self.standard_dims().time_dim()
    }

    /// The nominal step between consecutive timestamps.
    #[must_use]
    pub fn expected_delta(&self) -> chrono::TimeDelta {
        self.time_resolution.nominal_delta()
    }

    /// A validator for time axes of the dataset.
    #[must_use]
    pub fn validator(&self) -> TimeAxisValidator {
        TimeAxisValidator::new(self.irregular_update_cadence.clone())
    }

    /// The chunk length of dimension `dim` for new arrays.
    #[must_use]
    pub fn chunk_length(&self, dim: &str) -> u64 {
        self.requested_chunks.get(dim).copied().unwrap_or_else(|| {
            let config = global_config();
            if dim == self.time_dim() {
                config.default_time_chunk_length()
            } else {
                config.default_spatial_chunk_length()
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    #[test]
    fn config_defaults() {
        let config = Config::default();
        assert_eq!(config.default_time_chunk_length(), 100);
        assert_eq!(config.default_spatial_chunk_length(), 64);
        assert!(global_config().default_spatial_chunk_length() > 0);
    }

    #[test]
    fn dataset_config_json() {
        let config = DatasetConfig::from_json_str(
            r#"{
                "dataset_name": "chirps_final_05",
                "time_resolution": "daily",
                "irregular_update_cadence": ["3d", "4d"],
                "update_attributes": ["bbox"],
                "requested_chunks": {"time": 50},
                "metadata_type": "collection"
            }"#,
        )
        .unwrap();
        assert_eq!(config.key(), "chirps_final_05-daily");
        assert_eq!(config.variant(), DatasetVariant::Regular);
        assert_eq!(config.time_dim(), "time");
        assert_eq!(config.expected_delta(), TimeDelta::days(1));
        assert_eq!(config.chunk_length("time"), 50);
        assert_eq!(config.chunk_length("latitude"), 64);
        assert_eq!(config.metadata_type.folder(), "collections");
        assert!(config
            .validator()
            .accepts_step(TimeDelta::days(4), config.expected_delta()));
    }

    #[test]
    fn dataset_config_invalid() {
        assert!(matches!(
            DatasetConfig::from_json_str(r#"{"dataset_name": "", "time_resolution": "daily"}"#),
            Err(ConfigError::EmptyDatasetName)
        ));
        assert!(matches!(
            DatasetConfig::from_json_str(r#"{"dataset_name": "a", "time_resolution": "yearly"}"#),
            Err(ConfigError::InvalidConfig(_))
        ));
        assert!(matches!(
            DatasetConfig::from_json_str(
                r#"{"dataset_name": "a", "time_resolution": "daily", "requested_chunks": {"time": 0}}"#
            ),
            Err(ConfigError::InvalidChunkLength(_))
        ));
    }

    #[test]
    fn dataset_config_hindcast() {
        let mut config = DatasetConfig::new("era5", TimeResolution::Hourly);
        config.variant = DatasetVariant::Forecast;
        assert_eq!(config.time_dim(), "forecast_reference_time");
        config.hindcast = true;
        assert_eq!(config.time_dim(), "hindcast_reference_time");
        assert_eq!(config.key(), "era5-hourly");
    }
}
