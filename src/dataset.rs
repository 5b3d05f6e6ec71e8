//! In-memory datasets.
//!
//! A [`Dataset`] is a set of named [`DataArray`]s sharing a time axis and named [`Coordinate`]s. Every data
//! variable spans the time dimension. All other dimensions of a variable must be coordinates of the dataset.

use std::{collections::BTreeMap, ops::Range};

use chrono::{DateTime, Utc};
use ndarray::{ArrayD, Axis, Slice};
use thiserror::Error;

use crate::{
    attributes::{move_post_parse_attrs_to_dict, Attributes},
    dims::StandardDims,
};

/// A non-time coordinate of a dataset.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Coordinate {
    /// The coordinate values.
    pub values: Vec<f64>,
    /// The coordinate attributes.
    pub attrs: Attributes,
}

impl Coordinate {
    /// Create a coordinate with `values` and no attributes.
    #[must_use]
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            values,
            attrs: Attributes::new(),
        }
    }
}

/// A data variable of a dataset.
#[derive(Clone, Debug, PartialEq)]
pub struct DataArray {
    /// The dimension names, one per axis of `data`.
    pub dims: Vec<String>,
    /// The values.
    pub data: ArrayD<f64>,
    /// The variable attributes.
    pub attrs: Attributes,
}

impl DataArray {
    /// Create a data variable with no attributes.
    #[must_use]
    pub fn new<S: Into<String>>(dims: impl IntoIterator<Item = S>, data: ArrayD<f64>) -> Self {
        Self {
            dims: dims.into_iter().map(Into::into).collect(),
            data,
            attrs: Attributes::new(),
        }
    }

    /// The axis of dimension `dim`.
    #[must_use]
    pub fn axis(&self, dim: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == dim)
    }
}

/// A dataset error.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// A dimension that is neither the time dimension nor a coordinate.
    #[error("variable {0} has unknown dimension {1}")]
    UnknownDimension(String, String),
    /// A data variable without the time dimension.
    #[error("variable {0} does not span the time dimension {1}")]
    MissingTimeDimension(String, String),
    /// The shape of a data variable does not match the dataset dimensions.
    #[error("variable {name} has shape {got:?}, expected {expected:?}")]
    ShapeMismatch {
        /// The variable name.
        name: String,
        /// The shape implied by the dataset dimensions.
        expected: Vec<usize>,
        /// The shape of the variable.
        got: Vec<usize>,
    },
    /// A time range outside of the time axis.
    #[error("time range {0:?} is out of bounds for a time axis of length {1}")]
    TimeRangeOutOfBounds(Range<usize>, usize),
    /// Datasets that cannot be concatenated.
    #[error("datasets are incompatible: {0}")]
    Incompatible(String),
}

/// A time-indexed dataset.
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    time_dim: String,
    times: Vec<DateTime<Utc>>,
    coords: BTreeMap<String, Coordinate>,
    data_vars: BTreeMap<String, DataArray>,
    attrs: Attributes,
}

impl Dataset {
    /// Create a dataset with time dimension `time_dim` and time axis `times`, and no coordinates or variables.
    #[must_use]
    pub fn new(time_dim: impl Into<String>, times: Vec<DateTime<Utc>>) -> Self {
        Self {
            time_dim: time_dim.into(),
            times,
            coords: BTreeMap::new(),
            data_vars: BTreeMap::new(),
            attrs: Attributes::new(),
        }
    }

    /// The name of the time dimension.
    #[must_use]
    pub fn time_dim(&self) -> &str {
        &self.time_dim
    }

    /// The time axis.
    #[must_use]
    pub fn times(&self) -> &[DateTime<Utc>] {
        &self.times
    }

    /// The non-time coordinates.
    #[must_use]
    pub fn coords(&self) -> &BTreeMap<String, Coordinate> {
        &self.coords
    }

    /// The coordinate `name`.
    #[must_use]
    pub fn coord(&self, name: &str) -> Option<&Coordinate> {
        self.coords.get(name)
    }

    /// The data variables.
    #[must_use]
    pub fn data_vars(&self) -> &BTreeMap<String, DataArray> {
        &self.data_vars
    }

    /// The data variable `name`.
    #[must_use]
    pub fn data_var(&self, name: &str) -> Option<&DataArray> {
        self.data_vars.get(name)
    }

    /// The dataset attributes.
    #[must_use]
    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    /// Mutably borrow the dataset attributes.
    pub fn attrs_mut(&mut self) -> &mut Attributes {
        &mut self.attrs
    }

    /// The length of dimension `dim`, if it is the time dimension or a coordinate.
    #[must_use]
    pub fn dim_len(&self, dim: &str) -> Option<usize> {
        if dim == self.time_dim {
            Some(self.times.len())
        } else {
            self.coords.get(dim).map(|coord| coord.values.len())
        }
    }

    /// Add or replace the coordinate `name`.
    pub fn insert_coord(&mut self, name: impl Into<String>, coord: Coordinate) {
        self.coords.insert(name.into(), coord);
    }

    /// Add or replace the data variable `name`.
    ///
    /// # Errors
    /// Returns a [`DatasetError`] if the variable does not span the time dimension, has an unknown dimension, or its
    /// shape does not match the dimension lengths.
    pub fn insert_data_var(
        &mut self,
        name: impl Into<String>,
        data_var: DataArray,
    ) -> Result<(), DatasetError> {
        let name = name.into();
        if data_var.axis(&self.time_dim).is_none() {
            return Err(DatasetError::MissingTimeDimension(
                name,
                self.time_dim.clone(),
            ));
        }
        let expected = data_var
            .dims
            .iter()
            .map(|dim| {
                self.dim_len(dim)
                    .ok_or_else(|| DatasetError::UnknownDimension(name.clone(), dim.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if expected != data_var.data.shape() {
            return Err(DatasetError::ShapeMismatch {
                name,
                expected,
                got: data_var.data.shape().to_vec(),
            });
        }
        self.data_vars.insert(name, data_var);
        Ok(())
    }

    /// Returns true if every data variable is indexed by exactly `dims`, in order.
    #[must_use]
    pub fn conforms_to(&self, dims: &StandardDims) -> bool {
        self.time_dim == dims.time_dim()
            && self
                .data_vars
                .values()
                .all(|data_var| dims.conforms(&data_var.dims))
    }

    /// Select the positions `range` of the time axis.
    ///
    /// # Errors
    /// Returns [`DatasetError::TimeRangeOutOfBounds`] if `range` is not within the time axis.
    pub fn isel_time(&self, range: Range<usize>) -> Result<Self, DatasetError> {
        if range.start > range.end || range.end > self.times.len() {
            return Err(DatasetError::TimeRangeOutOfBounds(range, self.times.len()));
        }
        let data_vars = self
            .data_vars
            .iter()
            .map(|(name, data_var)| {
                let axis = data_var
                    .axis(&self.time_dim)
                    .ok_or_else(|| DatasetError::MissingTimeDimension(name.clone(), self.time_dim.clone()))?;
                let data = data_var
                    .data
                    .slice_axis(Axis(axis), Slice::from(range.clone()))
                    .to_owned();
                Ok((
                    name.clone(),
                    DataArray {
                        dims: data_var.dims.clone(),
                        data,
                        attrs: data_var.attrs.clone(),
                    },
                ))
            })
            .collect::<Result<_, DatasetError>>()?;
        Ok(Self {
            time_dim: self.time_dim.clone(),
            times: self.times[range].to_vec(),
            coords: self.coords.clone(),
            data_vars,
            attrs: self.attrs.clone(),
        })
    }

    /// Concatenate `other` after this dataset along the time dimension.
    ///
    /// Coordinates and attributes are taken from this dataset.
    ///
    /// # Errors
    /// Returns [`DatasetError::Incompatible`] if the datasets differ in time dimension, variables, or the shape of a
    /// variable along non-time dimensions.
    pub fn concat_time(&self, other: &Self) -> Result<Self, DatasetError> {
        if self.time_dim != other.time_dim {
            return Err(DatasetError::Incompatible(format!(
                "time dimension {} != {}",
                self.time_dim, other.time_dim
            )));
        }
        if !self.data_vars.keys().eq(other.data_vars.keys()) {
            return Err(DatasetError::Incompatible(
                "data variables differ".to_string(),
            ));
        }
        let data_vars = std::iter::zip(&self.data_vars, other.data_vars.values())
            .map(|((name, lhs), rhs)| {
                if lhs.dims != rhs.dims {
                    return Err(DatasetError::Incompatible(format!(
                        "dimensions of {name} differ"
                    )));
                }
                let axis = lhs
                    .axis(&self.time_dim)
                    .ok_or_else(|| DatasetError::MissingTimeDimension(name.clone(), self.time_dim.clone()))?;
                let data = ndarray::concatenate(Axis(axis), &[lhs.data.view(), rhs.data.view()])
                    .map_err(|err| DatasetError::Incompatible(format!("{name}: {err}")))?;
                Ok((
                    name.clone(),
                    DataArray {
                        dims: lhs.dims.clone(),
                        data,
                        attrs: lhs.attrs.clone(),
                    },
                ))
            })
            .collect::<Result<_, DatasetError>>()?;
        Ok(Self {
            time_dim: self.time_dim.clone(),
            times: self.times.iter().chain(&other.times).copied().collect(),
            coords: self.coords.clone(),
            data_vars,
            attrs: self.attrs.clone(),
        })
    }

    /// Move the transient update attributes and `custom_keys` out of the dataset attributes.
    ///
    /// Returns the moved attributes. See [`move_post_parse_attrs_to_dict`].
    pub fn take_post_parse_attrs<S: AsRef<str>>(&mut self, custom_keys: &[S]) -> Attributes {
        let (remaining, moved) = move_post_parse_attrs_to_dict(&self.attrs, custom_keys);
        self.attrs = remaining;
        moved
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, TimeZone};
    use ndarray::{ArrayD, IxDyn};
    use serde_json::json;

    use super::*;
    use crate::dims::DatasetVariant;

    fn dataset(days: Range<i64>) -> Dataset {
        let start = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        let times: Vec<_> = days.clone().map(|d| start + TimeDelta::days(d)).collect();
        let mut dataset = Dataset::new("time", times);
        dataset.insert_coord("latitude", Coordinate::new(vec![10.0, 20.0]));
        dataset.insert_coord("longitude", Coordinate::new(vec![1.0, 2.0, 3.0]));
        let n = days.clone().count();
        let values: Vec<f64> = days.flat_map(|d| (0..6).map(move |i| (d * 10 + i) as f64)).collect();
        let data = ArrayD::from_shape_vec(IxDyn(&[n, 2, 3]), values).unwrap();
        dataset
            .insert_data_var(
                "precip",
                DataArray::new(["time", "latitude", "longitude"], data),
            )
            .unwrap();
        dataset
    }

    #[test]
    fn dataset_insert_data_var() {
        let mut ds = dataset(0..4);
        assert_eq!(ds.dim_len("time"), Some(4));
        assert_eq!(ds.dim_len("longitude"), Some(3));
        assert!(ds.conforms_to(&DatasetVariant::Regular.standard_dims()));
        assert!(!ds.conforms_to(&DatasetVariant::Forecast.standard_dims()));

        let wrong_shape = ArrayD::zeros(IxDyn(&[4, 3, 3]));
        assert!(matches!(
            ds.insert_data_var("bad", DataArray::new(["time", "latitude", "longitude"], wrong_shape)),
            Err(DatasetError::ShapeMismatch { .. })
        ));
        let unknown = ArrayD::zeros(IxDyn(&[4, 2]));
        assert!(matches!(
            ds.insert_data_var("bad", DataArray::new(["time", "step"], unknown)),
            Err(DatasetError::UnknownDimension(..))
        ));
        let timeless = ArrayD::zeros(IxDyn(&[2]));
        assert!(matches!(
            ds.insert_data_var("bad", DataArray::new(["latitude"], timeless)),
            Err(DatasetError::MissingTimeDimension(..))
        ));
    }

    #[test]
    fn dataset_isel_concat() {
        let ds = dataset(0..5);
        let head = ds.isel_time(0..2).unwrap();
        let tail = ds.isel_time(2..5).unwrap();
        assert_eq!(head.times().len(), 2);
        assert_eq!(tail.data_var("precip").unwrap().data[[0, 1, 2]], 25.0);
        assert_eq!(head.concat_time(&tail).unwrap(), ds);
        assert!(ds.isel_time(3..6).is_err());

        let mut other = tail.clone();
        other.data_vars.clear();
        assert!(matches!(
            head.concat_time(&other),
            Err(DatasetError::Incompatible(_))
        ));
    }

    #[test]
    fn dataset_take_post_parse_attrs() {
        let mut ds = dataset(0..1);
        ds.attrs_mut().insert("title".to_string(), json!("CHIRPS"));
        ds.attrs_mut().insert("update_in_progress".to_string(), json!(true));
        ds.attrs_mut().insert("bbox".to_string(), json!([0, 1]));
        let moved = ds.take_post_parse_attrs(&["bbox"]);
        assert_eq!(moved.len(), 2);
        assert_eq!(ds.attrs().len(), 1);
        assert_eq!(ds.attrs()["title"], "CHIRPS");
    }
}
