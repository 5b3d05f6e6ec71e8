use thiserror::Error;

use crate::{
    array_subset::{ArraySubset, ArraySubsetError, IncompatibleDimensionalityError},
    storage::{StorageError, StoreKeyError, StorePrefixError},
};

use super::{ArrayShape, DataType};

/// An array creation error.
#[derive(Debug, Error)]
pub enum ArrayCreateError {
    /// An invalid array path.
    #[error(transparent)]
    InvalidPath(#[from] StorePrefixError),
    /// Unsupported chunk grid.
    #[error("unsupported chunk grid {0}")]
    UnsupportedChunkGrid(String),
    /// Unsupported chunk key encoding.
    #[error("unsupported chunk key encoding {0}")]
    UnsupportedChunkKeyEncoding(String),
    /// Unsupported codec.
    #[error("unsupported codec {0}")]
    UnsupportedCodec(String),
    /// The dimensionality of the chunk grid does not match the array shape.
    #[error("chunk grid dimensionality {0} does not match array dimensionality {1}")]
    InvalidChunkGridDimensionality(usize, usize),
    /// The number of dimension names does not match the array dimensionality.
    #[error("the number of dimension names {0} does not match array dimensionality {1}")]
    InvalidDimensionNames(usize, usize),
    /// Storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// An error deserializing the metadata.
    #[error(transparent)]
    MetadataDeserializationError(#[from] serde_json::Error),
    /// Missing metadata.
    #[error("array metadata is missing")]
    MissingMetadata,
}

/// Array errors.
#[derive(Debug, Error)]
pub enum ArrayError {
    /// A store error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// An invalid chunk key.
    #[error(transparent)]
    InvalidChunkKey(#[from] StoreKeyError),
    /// Incompatible dimensionality.
    #[error(transparent)]
    IncompatibleDimensionalityError(#[from] IncompatibleDimensionalityError),
    /// An invalid array subset.
    #[error(transparent)]
    ArraySubsetError(#[from] ArraySubsetError),
    /// Incompatible array subset.
    #[error("array subset {_0} is not compatible with array shape {_1:?}")]
    InvalidArraySubset(ArraySubset, ArrayShape),
    /// The element type does not match the array data type.
    #[error("array has data type {_0}, got elements of type {_1}")]
    IncompatibleElementType(DataType, DataType),
    /// The fill value is not valid for the data type.
    #[error("fill value {_0} is not valid for data type {_1}")]
    InvalidFillValue(serde_json::Value, DataType),
    /// An unexpected chunk decoded size.
    #[error("got chunk decoded size {_0:?}, expected {_1:?}")]
    UnexpectedChunkDecodedSize(usize, usize),
    /// An unexpected bytes input size.
    #[error("got bytes with size {_0:?}, expected {_1:?}")]
    InvalidBytesInputSize(usize, u64),
    /// An unexpected number of elements.
    #[error("got {_0} elements, expected {_1}")]
    InvalidElementsInputSize(usize, u64),
    /// A size exceeds the addressable range.
    #[error(transparent)]
    SizeOverflow(#[from] std::num::TryFromIntError),
    /// An ndarray shape error.
    #[error(transparent)]
    NdarrayShapeError(#[from] ndarray::ShapeError),
    /// An error serializing the metadata.
    #[error(transparent)]
    MetadataSerializationError(#[from] serde_json::Error),
}
