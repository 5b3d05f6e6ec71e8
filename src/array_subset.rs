//! Array subsets.
//!
//! An [`ArraySubset`] is a hyperrectangular region of an array, described by a start and a shape.
//! Subsets are used to address the region of an array a dataset edit writes into, and to map elements between
//! that region and the chunks it intersects.

use std::ops::Range;

use derive_more::Display;
use itertools::{izip, Either, Itertools};
use thiserror::Error;

use crate::array::{ArrayIndices, ArrayShape};

/// An array subset.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Default)]
#[display("start {start:?} shape {shape:?}")]
pub struct ArraySubset {
    /// The start of the array subset.
    start: ArrayIndices,
    /// The shape of the array subset.
    shape: ArrayShape,
}

impl ArraySubset {
    /// Create a new array subset with `shape` starting at the origin.
    #[must_use]
    pub fn new_with_shape(shape: ArrayShape) -> Self {
        Self {
            start: vec![0; shape.len()],
            shape,
        }
    }

    /// Create a new array subset.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if the length of `start` and `shape` do not match.
    pub fn new_with_start_shape(
        start: ArrayIndices,
        shape: ArrayShape,
    ) -> Result<Self, IncompatibleDimensionalityError> {
        if start.len() == shape.len() {
            Ok(Self { start, shape })
        } else {
            Err(IncompatibleDimensionalityError::new(start.len(), shape.len()))
        }
    }

    /// Create a new array subset from a list of [`Range`]s.
    ///
    /// Ranges with `end < start` are treated as empty.
    #[must_use]
    pub fn new_with_ranges(ranges: &[Range<u64>]) -> Self {
        let start = ranges.iter().map(|range| range.start).collect();
        let shape = ranges
            .iter()
            .map(|range| range.end.saturating_sub(range.start))
            .collect();
        Self { start, shape }
    }

    /// Return the start of the array subset.
    #[must_use]
    pub fn start(&self) -> &[u64] {
        &self.start
    }

    /// Return the shape of the array subset.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Return the dimensionality of the array subset.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.start.len()
    }

    /// Return the end (exclusive) of the array subset.
    #[must_use]
    pub fn end_exc(&self) -> ArrayIndices {
        std::iter::zip(&self.start, &self.shape)
            .map(|(start, size)| start + size)
            .collect()
    }

    /// Return the number of elements of the array subset.
    ///
    /// Equal to the product of the components of its shape.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        self.shape.iter().product()
    }

    /// Returns true if the subset contains no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_elements() == 0
    }

    /// Returns true if the array subset is within the bounds of `array_shape`.
    #[must_use]
    pub fn inbounds(&self, array_shape: &[u64]) -> bool {
        self.dimensionality() == array_shape.len()
            && izip!(self.start(), self.shape(), array_shape)
                .all(|(start, size, shape)| start + size <= *shape)
    }

    /// Return the intersection of this array subset and `other`.
    ///
    /// The intersection may be empty.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if the dimensionality of `other` does not match.
    pub fn overlap(&self, other: &Self) -> Result<Self, IncompatibleDimensionalityError> {
        if other.dimensionality() != self.dimensionality() {
            return Err(IncompatibleDimensionalityError::new(
                other.dimensionality(),
                self.dimensionality(),
            ));
        }
        let (start, shape) = izip!(&self.start, &self.shape, &other.start, &other.shape)
            .map(|(&start, &size, &other_start, &other_size)| {
                let overlap_start = std::cmp::max(start, other_start);
                let overlap_end = std::cmp::min(start + size, other_start + other_size);
                (overlap_start, overlap_end.saturating_sub(overlap_start))
            })
            .unzip();
        Ok(Self { start, shape })
    }

    /// Return this array subset with its start expressed relative to `origin`.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if the length of `origin` does not match, or
    /// [`InvalidArraySubsetError`] if `origin` lies after the start in any dimension.
    pub fn relative_to(&self, origin: &[u64]) -> Result<Self, ArraySubsetError> {
        if origin.len() != self.dimensionality() {
            return Err(
                IncompatibleDimensionalityError::new(origin.len(), self.dimensionality()).into(),
            );
        }
        let start = std::iter::zip(&self.start, origin)
            .map(|(start, origin)| start.checked_sub(*origin).ok_or(InvalidArraySubsetError))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            start,
            shape: self.shape.clone(),
        })
    }

    /// Returns an iterator over the indices of elements within the subset, in C order.
    pub fn iter_indices(&self) -> impl Iterator<Item = ArrayIndices> + '_ {
        if self.dimensionality() == 0 {
            Either::Left(std::iter::once(vec![]))
        } else {
            Either::Right(
                izip!(&self.start, &self.shape)
                    .map(|(&start, &size)| start..start + size)
                    .multi_cartesian_product(),
            )
        }
    }

    /// Returns an iterator over the contiguous runs of the subset along its innermost dimension.
    ///
    /// Each item is the indices of the first element of a run and the length of the run.
    pub fn iter_contiguous_runs(&self) -> impl Iterator<Item = (ArrayIndices, u64)> + '_ {
        let (outer, inner_length) = match self.shape.split_last() {
            Some((&inner, _)) => (
                Self {
                    start: self.start[..self.dimensionality() - 1].to_vec(),
                    shape: self.shape[..self.dimensionality() - 1].to_vec(),
                },
                inner,
            ),
            None => (Self::default(), 1),
        };
        let inner_start = self.start.last().copied();
        let indices: Vec<ArrayIndices> = if inner_length == 0 {
            vec![]
        } else {
            outer.iter_indices().collect()
        };
        indices.into_iter().map(move |mut indices| {
            if let Some(inner_start) = inner_start {
                indices.push(inner_start);
            }
            (indices, inner_length)
        })
    }

    /// Returns the indices of the chunks with shape `chunk_shape` that intersect the subset, in C order.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if the length of `chunk_shape` does not match.
    pub fn chunks(
        &self,
        chunk_shape: &[u64],
    ) -> Result<Vec<ArrayIndices>, IncompatibleDimensionalityError> {
        if chunk_shape.len() != self.dimensionality() {
            return Err(IncompatibleDimensionalityError::new(
                chunk_shape.len(),
                self.dimensionality(),
            ));
        }
        if self.is_empty() {
            return Ok(vec![]);
        }
        let ranges: Vec<Range<u64>> = izip!(&self.start, &self.shape, chunk_shape)
            .map(|(&start, &size, &chunk_size)| {
                let chunk_size = std::cmp::max(chunk_size, 1);
                start / chunk_size..(start + size - 1) / chunk_size + 1
            })
            .collect();
        Ok(Self::new_with_ranges(&ranges).iter_indices().collect())
    }

    /// Returns the subset of the chunk at `chunk_indices` in a regular grid of `chunk_shape`.
    #[must_use]
    pub fn chunk_subset(chunk_indices: &[u64], chunk_shape: &[u64]) -> Self {
        Self {
            start: std::iter::zip(chunk_indices, chunk_shape)
                .map(|(index, size)| index * size)
                .collect(),
            shape: chunk_shape.to_vec(),
        }
    }
}

/// Return the linearised (C order) index of `indices` in an array of `shape`.
#[must_use]
pub fn ravel_indices(indices: &[u64], shape: &[u64]) -> u64 {
    std::iter::zip(indices, shape).fold(0, |acc, (index, size)| acc * size + index)
}

/// An incompatible dimensionality error.
#[derive(Copy, Clone, Debug, Error)]
#[error("incompatible dimensionality {0}, expected {1}")]
pub struct IncompatibleDimensionalityError(usize, usize);

impl IncompatibleDimensionalityError {
    /// Create a new incompatible dimensionality error.
    #[must_use]
    pub const fn new(got: usize, expected: usize) -> Self {
        Self(got, expected)
    }
}

/// An invalid array subset error.
#[derive(Copy, Clone, Debug, Error)]
#[error("invalid array subset")]
pub struct InvalidArraySubsetError;

/// An array subset error.
#[derive(Copy, Clone, Debug, Error)]
pub enum ArraySubsetError {
    /// Incompatible dimensionality.
    #[error(transparent)]
    IncompatibleDimensionality(#[from] IncompatibleDimensionalityError),
    /// Invalid subset.
    #[error(transparent)]
    InvalidArraySubset(#[from] InvalidArraySubsetError),
}
