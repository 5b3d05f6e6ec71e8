//! Array metadata.
//!
//! Arrays are described by a `zarr.json` document of the form
//! ```json
//! {
//!     "zarr_format": 3,
//!     "node_type": "array",
//!     "shape": [10, 4, 4],
//!     "data_type": "float64",
//!     "chunk_grid": {
//!         "name": "regular",
//!         "configuration": { "chunk_shape": [5, 4, 4] }
//!     },
//!     "chunk_key_encoding": {
//!         "name": "default",
//!         "configuration": { "separator": "/" }
//!     },
//!     "fill_value": "NaN",
//!     "codecs": [{ "name": "bytes", "configuration": { "endian": "little" } }],
//!     "dimension_names": ["time", "latitude", "longitude"]
//! }
//! ```

use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{ArrayCreateError, ArrayShape, DataType};

/// Configuration metadata.
pub type MetadataConfiguration = serde_json::Map<String, Value>;

/// A named extension point (chunk grid, chunk key encoding, codec) with an optional configuration.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Display)]
#[display("{name}")]
pub struct NamedMetadata {
    /// The name.
    pub name: String,
    /// The configuration, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<MetadataConfiguration>,
}

impl NamedMetadata {
    /// Create named metadata from a `name` and a JSON object `configuration`.
    #[must_use]
    pub fn new(name: &str, configuration: Value) -> Self {
        Self {
            name: name.to_string(),
            configuration: match configuration {
                Value::Object(configuration) => Some(configuration),
                _ => None,
            },
        }
    }

    fn configuration_value(&self, key: &str) -> Option<&Value> {
        self.configuration
            .as_ref()
            .and_then(|configuration| configuration.get(key))
    }
}

/// Array metadata (`zarr.json` of an array).
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct ArrayMetadata {
    /// Must be `3`.
    pub zarr_format: monostate::MustBe!(3u64),
    /// Must be `array`.
    pub node_type: monostate::MustBe!("array"),
    /// The length of each dimension.
    pub shape: ArrayShape,
    /// The data type.
    pub data_type: DataType,
    /// The chunk grid. Only `regular` is supported.
    pub chunk_grid: NamedMetadata,
    /// The mapping from chunk grid cell coordinates to keys in the store.
    pub chunk_key_encoding: NamedMetadata,
    /// The value of uninitialised elements.
    pub fill_value: Value,
    /// The codecs. Only the little endian `bytes` codec is supported.
    pub codecs: Vec<NamedMetadata>,
    /// User defined attributes.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub attributes: serde_json::Map<String, Value>,
    /// The names of the dimensions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension_names: Option<Vec<String>>,
}

impl ArrayMetadata {
    /// Create metadata for an array with a regular chunk grid and uncompressed little endian chunks.
    #[must_use]
    pub fn new(
        shape: ArrayShape,
        data_type: DataType,
        chunk_shape: ArrayShape,
        dimension_names: Option<Vec<String>>,
    ) -> Self {
        Self {
            zarr_format: monostate::MustBe!(3u64),
            node_type: monostate::MustBe!("array"),
            shape,
            data_type,
            chunk_grid: NamedMetadata::new("regular", json!({ "chunk_shape": chunk_shape })),
            chunk_key_encoding: NamedMetadata::new("default", json!({ "separator": "/" })),
            fill_value: data_type.default_fill_value(),
            codecs: vec![NamedMetadata::new("bytes", json!({ "endian": "little" }))],
            attributes: serde_json::Map::default(),
            dimension_names,
        }
    }

    /// Return the chunk shape of the regular chunk grid.
    ///
    /// # Errors
    /// Returns [`ArrayCreateError`] if the chunk grid is not regular or its dimensionality does not match the shape.
    pub fn chunk_shape(&self) -> Result<ArrayShape, ArrayCreateError> {
        if self.chunk_grid.name != "regular" {
            return Err(ArrayCreateError::UnsupportedChunkGrid(
                self.chunk_grid.to_string(),
            ));
        }
        let chunk_shape: ArrayShape = self
            .chunk_grid
            .configuration_value("chunk_shape")
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()?
            .ok_or_else(|| ArrayCreateError::UnsupportedChunkGrid(self.chunk_grid.to_string()))?;
        if chunk_shape.len() != self.shape.len() {
            return Err(ArrayCreateError::InvalidChunkGridDimensionality(
                chunk_shape.len(),
                self.shape.len(),
            ));
        }
        if chunk_shape.contains(&0) {
            return Err(ArrayCreateError::UnsupportedChunkGrid(format!(
                "regular {chunk_shape:?}"
            )));
        }
        Ok(chunk_shape)
    }

    /// Return the chunk key separator.
    ///
    /// # Errors
    /// Returns [`ArrayCreateError`] if the chunk key encoding is not supported.
    pub fn chunk_key_separator(&self) -> Result<char, ArrayCreateError> {
        let separator = match self.chunk_key_encoding.configuration_value("separator") {
            None => Some('/'),
            Some(Value::String(separator)) if separator == "/" => Some('/'),
            Some(Value::String(separator)) if separator == "." => Some('.'),
            Some(_) => None,
        };
        match (self.chunk_key_encoding.name.as_str(), separator) {
            ("default", Some(separator)) => Ok(separator),
            _ => Err(ArrayCreateError::UnsupportedChunkKeyEncoding(
                self.chunk_key_encoding.to_string(),
            )),
        }
    }

    /// Check the metadata describes an array this crate can read and write.
    ///
    /// # Errors
    /// Returns [`ArrayCreateError`] if the chunk grid, chunk key encoding, codecs, or dimension names are not supported.
    pub fn validate(&self) -> Result<(), ArrayCreateError> {
        self.chunk_shape()?;
        self.chunk_key_separator()?;
        for codec in &self.codecs {
            let little_endian = codec
                .configuration_value("endian")
                .map_or(true, |endian| endian == "little");
            if codec.name != "bytes" || !little_endian {
                return Err(ArrayCreateError::UnsupportedCodec(codec.to_string()));
            }
        }
        if let Some(dimension_names) = &self.dimension_names {
            if dimension_names.len() != self.shape.len() {
                return Err(ArrayCreateError::InvalidDimensionNames(
                    dimension_names.len(),
                    self.shape.len(),
                ));
            }
        }
        Ok(())
    }
}

impl TryFrom<&str> for ArrayMetadata {
    type Error = serde_json::Error;
    fn try_from(metadata_json: &str) -> Result<Self, Self::Error> {
        serde_json::from_str::<Self>(metadata_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_metadata_document() {
        let metadata = ArrayMetadata::new(
            vec![10, 4],
            DataType::Float64,
            vec![5, 4],
            Some(vec!["time".to_string(), "latitude".to_string()]),
        );
        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value["zarr_format"], 3);
        assert_eq!(value["node_type"], "array");
        assert_eq!(value["data_type"], "float64");
        assert_eq!(value["fill_value"], "NaN");
        assert_eq!(
            value["chunk_grid"]["configuration"]["chunk_shape"],
            json!([5, 4])
        );
        assert!(value.get("attributes").is_none());
        metadata.validate().unwrap();
    }

    #[test]
    fn array_metadata_parse() {
        let json = r#"{
            "zarr_format": 3,
            "node_type": "array",
            "shape": [4],
            "data_type": "int64",
            "chunk_grid": {"name": "regular", "configuration": {"chunk_shape": [2]}},
            "chunk_key_encoding": {"name": "default"},
            "fill_value": 0,
            "codecs": [{"name": "bytes", "configuration": {"endian": "little"}}]
        }"#;
        let metadata = ArrayMetadata::try_from(json).unwrap();
        assert_eq!(metadata.chunk_shape().unwrap(), vec![2]);
        assert_eq!(metadata.chunk_key_separator().unwrap(), '/');
        assert_eq!(metadata.data_type, DataType::Int64);

        assert!(ArrayMetadata::try_from(json.replace("\"array\"", "\"group\"").as_str()).is_err());
        let gzip = ArrayMetadata {
            codecs: vec![NamedMetadata::new("gzip", json!({"level": 1}))],
            ..metadata
        };
        assert!(gzip.validate().is_err());
    }
}
