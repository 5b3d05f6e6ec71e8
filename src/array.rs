//! Arrays.
//!
//! An array is a named node of a dataset store holding an N-dimensional grid of elements, split into chunks of a
//! regular grid. Its metadata lives at `{path}/zarr.json` and the chunk at grid position `[i, j]` lives at
//! `{path}/c/i/j`. Chunks that were never written read as the fill value.
//!
//! Use [`Array::create`] to setup a new array, or [`Array::open`] for an existing array.

mod array_errors;
mod array_metadata;
mod data_type;

pub use self::{
    array_errors::{ArrayCreateError, ArrayError},
    array_metadata::{ArrayMetadata, MetadataConfiguration, NamedMetadata},
    data_type::{DataType, Element},
};

use rayon::prelude::{IntoParallelRefIterator, ParallelIterator};

use crate::{
    array_subset::{ravel_indices, ArraySubset},
    storage::{
        Bytes, ReadableWritableListableStorage, StorageError, StoreKey, StorePrefix,
    },
};

/// An ND index to an element in an array.
pub type ArrayIndices = Vec<u64>;

/// The shape of an array.
pub type ArrayShape = Vec<u64>;

/// The key of node metadata documents.
pub const METADATA_KEY: &str = "zarr.json";

/// An array.
#[derive(Clone)]
pub struct Array {
    storage: ReadableWritableListableStorage,
    prefix: StorePrefix,
    metadata: ArrayMetadata,
    chunk_shape: ArrayShape,
    separator: char,
}

impl std::fmt::Debug for Array {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Array")
            .field("prefix", &self.prefix)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

impl Array {
    /// Create an array at `path` of `storage` with `metadata`.
    ///
    /// The metadata is not written until [`store_metadata`](Array::store_metadata) is called.
    ///
    /// # Errors
    /// Returns [`ArrayCreateError`] if `path` is invalid or the metadata is not supported.
    pub fn create(
        storage: ReadableWritableListableStorage,
        path: &str,
        metadata: ArrayMetadata,
    ) -> Result<Self, ArrayCreateError> {
        metadata.validate()?;
        Ok(Self {
            storage,
            prefix: StorePrefix::from_path(path)?,
            chunk_shape: metadata.chunk_shape()?,
            separator: metadata.chunk_key_separator()?,
            metadata,
        })
    }

    /// Open the existing array at `path` of `storage`.
    ///
    /// # Errors
    /// Returns [`ArrayCreateError::MissingMetadata`] if there is no metadata at `path`, or another
    /// [`ArrayCreateError`] if the metadata is invalid or not supported.
    pub fn open(
        storage: ReadableWritableListableStorage,
        path: &str,
    ) -> Result<Self, ArrayCreateError> {
        let prefix = StorePrefix::from_path(path)?;
        let key = prefix
            .join(METADATA_KEY)
            .map_err(|err| ArrayCreateError::StorageError(err.into()))?;
        let metadata = storage
            .get(&key)?
            .ok_or(ArrayCreateError::MissingMetadata)?;
        let metadata: ArrayMetadata = serde_json::from_slice(&metadata)?;
        Self::create(storage, prefix.as_str(), metadata)
    }

    /// Return the node path of the array, with a trailing `/` unless it is the root.
    #[must_use]
    pub fn prefix(&self) -> &StorePrefix {
        &self.prefix
    }

    /// Return the array metadata.
    #[must_use]
    pub fn metadata(&self) -> &ArrayMetadata {
        &self.metadata
    }

    /// Return the shape of the array.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.metadata.shape
    }

    /// Return the dimensionality of the array.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.metadata.shape.len()
    }

    /// Return the shape of the chunks of the array.
    #[must_use]
    pub fn chunk_shape(&self) -> &[u64] {
        &self.chunk_shape
    }

    /// Return the data type of the array.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        self.metadata.data_type
    }

    /// Return the dimension names of the array, if set.
    #[must_use]
    pub fn dimension_names(&self) -> Option<&[String]> {
        self.metadata.dimension_names.as_deref()
    }

    /// Return the array attributes.
    #[must_use]
    pub fn attributes(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.metadata.attributes
    }

    /// Mutably borrow the array attributes.
    pub fn attributes_mut(&mut self) -> &mut serde_json::Map<String, serde_json::Value> {
        &mut self.metadata.attributes
    }

    /// Set the shape of the array.
    ///
    /// Chunks outside of the new shape are left in place. Call [`store_metadata`](Array::store_metadata) to persist.
    ///
    /// # Errors
    /// Returns [`ArrayError::IncompatibleDimensionalityError`] if the dimensionality of `shape` does not match.
    pub fn set_shape(&mut self, shape: ArrayShape) -> Result<(), ArrayError> {
        if shape.len() != self.dimensionality() {
            return Err(crate::array_subset::IncompatibleDimensionalityError::new(
                shape.len(),
                self.dimensionality(),
            )
            .into());
        }
        self.metadata.shape = shape;
        Ok(())
    }

    /// Store the array metadata.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] on failure to serialize or store the metadata.
    pub fn store_metadata(&self) -> Result<(), ArrayError> {
        let key = self.prefix.join(METADATA_KEY)?;
        let json = serde_json::to_vec_pretty(&self.metadata)?;
        self.storage.set(&key, Bytes::from(json))?;
        Ok(())
    }

    /// Erase the metadata and all chunks of the array.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying store error.
    pub fn erase(&self) -> Result<(), StorageError> {
        self.storage.erase_prefix(&self.prefix)
    }

    /// Return the key of the chunk at `chunk_indices`.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the key is invalid.
    pub fn chunk_key(&self, chunk_indices: &[u64]) -> Result<StoreKey, ArrayError> {
        let mut key = "c".to_string();
        for index in chunk_indices {
            key.push(self.separator);
            key.push_str(&index.to_string());
        }
        Ok(self.prefix.join(&key)?)
    }

    fn fill_value<T: Element>(&self) -> Result<T, ArrayError> {
        if T::DATA_TYPE != self.data_type() {
            return Err(ArrayError::IncompatibleElementType(
                self.data_type(),
                T::DATA_TYPE,
            ));
        }
        T::from_fill_value_metadata(&self.metadata.fill_value).ok_or_else(|| {
            ArrayError::InvalidFillValue(self.metadata.fill_value.clone(), self.data_type())
        })
    }

    fn chunk_num_elements(&self) -> Result<usize, ArrayError> {
        Ok(usize::try_from(self.chunk_shape.iter().product::<u64>())?)
    }

    /// Read and decode the chunk at `chunk_indices` into its elements.
    ///
    /// A chunk that does not exist is returned filled with the fill value.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if `T` does not match the data type, the chunk is malformed, or there is an underlying store error.
    pub fn retrieve_chunk_elements<T: Element>(
        &self,
        chunk_indices: &[u64],
    ) -> Result<Vec<T>, ArrayError> {
        let fill_value = self.fill_value::<T>()?;
        let num_elements = self.chunk_num_elements()?;
        match self.storage.get(&self.chunk_key(chunk_indices)?)? {
            Some(bytes) => {
                let elements = T::decode(&bytes)?;
                if elements.len() == num_elements {
                    Ok(elements)
                } else {
                    Err(ArrayError::UnexpectedChunkDecodedSize(
                        elements.len(),
                        num_elements,
                    ))
                }
            }
            None => Ok(vec![fill_value; num_elements]),
        }
    }

    /// Encode and store the elements of the chunk at `chunk_indices`.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if `T` does not match the data type, the number of elements is not the chunk size, or there is an underlying store error.
    pub fn store_chunk_elements<T: Element>(
        &self,
        chunk_indices: &[u64],
        elements: &[T],
    ) -> Result<(), ArrayError> {
        self.fill_value::<T>()?;
        let num_elements = self.chunk_num_elements()?;
        if elements.len() != num_elements {
            return Err(ArrayError::InvalidElementsInputSize(
                elements.len(),
                num_elements as u64,
            ));
        }
        self.storage
            .set(&self.chunk_key(chunk_indices)?, Bytes::from(T::encode(elements)))?;
        Ok(())
    }

    fn check_subset(&self, array_subset: &ArraySubset) -> Result<(), ArrayError> {
        if array_subset.inbounds(self.shape()) {
            Ok(())
        } else {
            Err(ArrayError::InvalidArraySubset(
                array_subset.clone(),
                self.shape().to_vec(),
            ))
        }
    }

    /// Read the elements in `array_subset`, in C order.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the subset is out of bounds, `T` does not match the data type, or a chunk cannot be read.
    pub fn retrieve_array_subset_elements<T: Element>(
        &self,
        array_subset: &ArraySubset,
    ) -> Result<Vec<T>, ArrayError> {
        self.check_subset(array_subset)?;
        let fill_value = self.fill_value::<T>()?;
        let mut elements = vec![fill_value; usize::try_from(array_subset.num_elements())?];

        let chunks = array_subset.chunks(&self.chunk_shape)?;
        let retrieved = chunks
            .par_iter()
            .map(|chunk_indices| {
                let chunk_subset = ArraySubset::chunk_subset(chunk_indices, &self.chunk_shape);
                let overlap = array_subset.overlap(&chunk_subset)?;
                let chunk_elements = self.retrieve_chunk_elements::<T>(chunk_indices)?;
                Ok((chunk_subset, overlap, chunk_elements))
            })
            .collect::<Result<Vec<_>, ArrayError>>()?;

        for (chunk_subset, overlap, chunk_elements) in retrieved {
            copy_runs(
                &overlap,
                (&chunk_subset, chunk_elements.as_slice()),
                (array_subset, elements.as_mut_slice()),
            )?;
        }
        Ok(elements)
    }

    /// Write `elements` (in C order) into `array_subset`.
    ///
    /// Chunks entirely covered by the subset are overwritten, and partially covered chunks are read, updated, and
    /// written back. Chunks are processed in parallel.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the subset is out of bounds, the number of elements does not match the subset,
    /// `T` does not match the data type, or a chunk cannot be read or written.
    pub fn store_array_subset_elements<T: Element>(
        &self,
        array_subset: &ArraySubset,
        elements: &[T],
    ) -> Result<(), ArrayError> {
        self.check_subset(array_subset)?;
        if elements.len() as u64 != array_subset.num_elements() {
            return Err(ArrayError::InvalidElementsInputSize(
                elements.len(),
                array_subset.num_elements(),
            ));
        }
        let fill_value = self.fill_value::<T>()?;
        let chunk_num_elements = self.chunk_num_elements()?;

        let chunks = array_subset.chunks(&self.chunk_shape)?;
        chunks.par_iter().try_for_each(|chunk_indices| {
            let chunk_subset = ArraySubset::chunk_subset(chunk_indices, &self.chunk_shape);
            let overlap = array_subset.overlap(&chunk_subset)?;
            let mut chunk_elements = if overlap == chunk_subset {
                vec![fill_value; chunk_num_elements]
            } else {
                self.retrieve_chunk_elements::<T>(chunk_indices)?
            };
            copy_runs(
                &overlap,
                (array_subset, elements),
                (&chunk_subset, chunk_elements.as_mut_slice()),
            )?;
            self.store_chunk_elements(chunk_indices, &chunk_elements)
        })
    }

    /// Read the elements in `array_subset` into an [`ndarray::ArrayD`].
    ///
    /// # Errors
    /// See [`retrieve_array_subset_elements`](Array::retrieve_array_subset_elements).
    pub fn retrieve_array_subset_ndarray<T: Element>(
        &self,
        array_subset: &ArraySubset,
    ) -> Result<ndarray::ArrayD<T>, ArrayError> {
        let elements = self.retrieve_array_subset_elements::<T>(array_subset)?;
        let shape = iter_u64_to_usize(array_subset.shape().iter())?;
        Ok(ndarray::ArrayD::from_shape_vec(shape, elements)?)
    }

    /// Write an [`ndarray`] array into the array starting at `subset_start`.
    ///
    /// # Errors
    /// See [`store_array_subset_elements`](Array::store_array_subset_elements).
    pub fn store_array_subset_ndarray<T: Element>(
        &self,
        subset_start: &[u64],
        subset_array: ndarray::ArrayViewD<T>,
    ) -> Result<(), ArrayError> {
        let shape = subset_array.shape().iter().map(|&size| size as u64).collect();
        let array_subset = ArraySubset::new_with_start_shape(subset_start.to_vec(), shape)?;
        let elements: Vec<T> = subset_array.iter().copied().collect();
        self.store_array_subset_elements(&array_subset, &elements)
    }
}

/// Copy the elements of `overlap` from a `source` region to a `target` region.
///
/// Each region is the subset it covers and its elements in C order.
fn copy_runs<T: Copy>(
    overlap: &ArraySubset,
    source: (&ArraySubset, &[T]),
    target: (&ArraySubset, &mut [T]),
) -> Result<(), ArrayError> {
    let (source_subset, source_elements) = source;
    let (target_subset, target_elements) = target;
    for (indices, length) in overlap.iter_contiguous_runs() {
        let length = usize::try_from(length)?;
        let source_start = relative_linear_index(&indices, source_subset)?;
        let target_start = relative_linear_index(&indices, target_subset)?;
        target_elements[target_start..target_start + length]
            .copy_from_slice(&source_elements[source_start..source_start + length]);
    }
    Ok(())
}

fn relative_linear_index(indices: &[u64], subset: &ArraySubset) -> Result<usize, ArrayError> {
    let relative: Vec<u64> = std::iter::zip(indices, subset.start())
        .map(|(index, start)| index - start)
        .collect();
    Ok(usize::try_from(ravel_indices(&relative, subset.shape()))?)
}

fn iter_u64_to_usize<'a, I: Iterator<Item = &'a u64>>(iter: I) -> Result<Vec<usize>, ArrayError> {
    Ok(iter
        .map(|v| usize::try_from(*v))
        .collect::<Result<Vec<_>, _>>()?)
}
