//! Reading and writing [`Dataset`]s as array stores.
//!
//! A dataset store holds a root group with the dataset attributes, one `int64` array of seconds since the Unix epoch
//! for the time dimension, one `float64` array per coordinate, and one `float64` array per data variable. Every array
//! is named after the variable it holds and carries the names of its dimensions.

use std::ops::Range;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::StoreError;
use crate::{
    array::{Array, ArrayMetadata, DataType, METADATA_KEY},
    array_subset::ArraySubset,
    config::DatasetConfig,
    dataset::{Coordinate, DataArray, Dataset, DatasetError},
    group::{Group, GroupMetadata},
    storage::{ReadableWritableListableStorage, StorePrefix},
};

/// The units of the time array.
const TIME_UNITS: &str = "seconds since 1970-01-01 00:00:00";

/// The calendar of the time array.
const TIME_CALENDAR: &str = "proleptic_gregorian";

fn epoch_seconds(times: &[DateTime<Utc>]) -> Vec<i64> {
    times.iter().map(DateTime::timestamp).collect()
}

fn chunk_shape(dims: &[String], shape: &[u64], time_dim: &str, config: &DatasetConfig) -> Vec<u64> {
    std::iter::zip(dims, shape)
        .map(|(dim, &len)| {
            let length = config.chunk_length(dim);
            if dim == time_dim {
                length
            } else {
                length.min(len.max(1))
            }
        })
        .collect()
}

fn create_array(
    storage: &ReadableWritableListableStorage,
    name: &str,
    data_type: DataType,
    dims: Vec<String>,
    shape: Vec<u64>,
    config: &DatasetConfig,
) -> Result<Array, StoreError> {
    let chunks = chunk_shape(&dims, &shape, config.time_dim(), config);
    let metadata = ArrayMetadata::new(shape, data_type, chunks, Some(dims));
    Ok(Array::create(storage.clone(), name, metadata)?)
}

/// The names of the arrays at the top level of a dataset store.
fn array_names(storage: &ReadableWritableListableStorage) -> Result<Vec<String>, StoreError> {
    let suffix = format!("/{METADATA_KEY}");
    Ok(storage
        .list()?
        .iter()
        .filter_map(|key| key.as_str().strip_suffix(suffix.as_str()))
        .filter(|name| !name.contains('/'))
        .map(str::to_string)
        .collect())
}

fn is_coordinate(name: &str, array: &Array) -> bool {
    matches!(array.dimension_names(), Some([dim]) if dim == name)
}

fn read_coordinate(array: &Array) -> Result<Coordinate, StoreError> {
    let values = array.retrieve_array_subset_elements::<f64>(&ArraySubset::new_with_shape(
        array.shape().to_vec(),
    ))?;
    Ok(Coordinate {
        values,
        attrs: array.attributes().clone(),
    })
}

fn read_times(array: &Array) -> Result<Vec<DateTime<Utc>>, StoreError> {
    array
        .retrieve_array_subset_elements::<i64>(&ArraySubset::new_with_shape(array.shape().to_vec()))?
        .into_iter()
        .map(|seconds| DateTime::from_timestamp(seconds, 0).ok_or(StoreError::InvalidTime(seconds)))
        .collect()
}

/// Read the dataset in `storage`, restricted to the data variables `variables` if set.
pub(super) fn read_dataset(
    storage: &ReadableWritableListableStorage,
    config: &DatasetConfig,
    variables: Option<&[String]>,
) -> Result<Dataset, StoreError> {
    let group = Group::open(storage.clone(), "")?;
    let time_dim = config.time_dim();
    let times = read_times(&Array::open(storage.clone(), time_dim)?)?;
    let mut dataset = Dataset::new(time_dim, times);
    dataset.attrs_mut().clone_from(group.attributes());

    let names = match variables {
        Some(variables) => variables.to_vec(),
        None => array_names(storage)?,
    };
    let mut data_arrays = Vec::new();
    for name in names.into_iter().filter(|name| name != time_dim) {
        let array = Array::open(storage.clone(), &name)?;
        if is_coordinate(&name, &array) {
            dataset.insert_coord(name, read_coordinate(&array)?);
        } else {
            data_arrays.push((name, array));
        }
    }

    for (name, array) in data_arrays {
        let dims = array
            .dimension_names()
            .ok_or_else(|| StoreError::IncompatibleVariable(name.clone()))?
            .to_vec();
        for dim in &dims {
            if dim != time_dim && dataset.coord(dim).is_none() {
                let coordinate = read_coordinate(&Array::open(storage.clone(), dim)?)?;
                dataset.insert_coord(dim.clone(), coordinate);
            }
        }
        let data = array
            .retrieve_array_subset_ndarray::<f64>(&ArraySubset::new_with_shape(array.shape().to_vec()))?;
        let mut data_var = DataArray::new(dims, data);
        data_var.attrs.clone_from(array.attributes());
        dataset.insert_data_var(name, data_var)?;
    }
    tracing::debug!(
        times = dataset.times().len(),
        variables = dataset.data_vars().len(),
        "read dataset"
    );
    Ok(dataset)
}

/// Replace the contents of `storage` with `dataset`.
pub(super) fn write_dataset(
    storage: &ReadableWritableListableStorage,
    dataset: &Dataset,
    config: &DatasetConfig,
) -> Result<(), StoreError> {
    storage.erase_prefix(&StorePrefix::root())?;
    Group::create(storage.clone(), "", GroupMetadata::new(dataset.attrs().clone()))?
        .store_metadata()?;

    let time_dim = dataset.time_dim();
    let times = epoch_seconds(dataset.times());
    let mut time_array = create_array(
        storage,
        time_dim,
        DataType::Int64,
        vec![time_dim.to_string()],
        vec![times.len() as u64],
        config,
    )?;
    let attributes = time_array.attributes_mut();
    attributes.insert("units".to_string(), Value::from(TIME_UNITS));
    attributes.insert("calendar".to_string(), Value::from(TIME_CALENDAR));
    time_array.store_metadata()?;
    if !times.is_empty() {
        time_array.store_array_subset_elements(
            &ArraySubset::new_with_shape(vec![times.len() as u64]),
            &times,
        )?;
    }

    for (name, coord) in dataset.coords() {
        let mut array = create_array(
            storage,
            name,
            DataType::Float64,
            vec![name.clone()],
            vec![coord.values.len() as u64],
            config,
        )?;
        array.attributes_mut().clone_from(&coord.attrs);
        array.store_metadata()?;
        if !coord.values.is_empty() {
            array.store_array_subset_elements(
                &ArraySubset::new_with_shape(array.shape().to_vec()),
                &coord.values,
            )?;
        }
    }

    for (name, data_var) in dataset.data_vars() {
        let shape: Vec<u64> = data_var.data.shape().iter().map(|&len| len as u64).collect();
        let mut array = create_array(
            storage,
            name,
            DataType::Float64,
            data_var.dims.clone(),
            shape,
            config,
        )?;
        array.attributes_mut().clone_from(&data_var.attrs);
        array.store_metadata()?;
        if !data_var.data.is_empty() {
            array.store_array_subset_ndarray(&vec![0; data_var.dims.len()], data_var.data.view())?;
        }
    }
    tracing::debug!(
        times = dataset.times().len(),
        variables = dataset.data_vars().len(),
        "wrote dataset"
    );
    Ok(())
}

/// The length of the time axis of the dataset in `storage` and its last timestamp, if any.
pub(super) fn existing_time_end(
    storage: &ReadableWritableListableStorage,
    time_dim: &str,
) -> Result<(u64, Option<DateTime<Utc>>), StoreError> {
    let array = Array::open(storage.clone(), time_dim)?;
    let len = array.shape().first().copied().unwrap_or_default();
    if len == 0 {
        return Ok((0, None));
    }
    let last = array
        .retrieve_array_subset_elements::<i64>(&ArraySubset::new_with_ranges(&[len - 1..len]))?
        .into_iter()
        .next()
        .map(|seconds| DateTime::from_timestamp(seconds, 0).ok_or(StoreError::InvalidTime(seconds)))
        .transpose()?;
    Ok((len, last))
}

fn grow(array: &mut Array, axis: usize, len: u64) -> Result<(), StoreError> {
    if array.shape()[axis] < len {
        let mut shape = array.shape().to_vec();
        shape[axis] = len;
        array.set_shape(shape)?;
        array.store_metadata()?;
    }
    Ok(())
}

/// Write `dataset` to the positions `region` of the time axis of the dataset in `storage`.
///
/// `region` may extend past the end of the time axis but must not start past it. Every array spanning the time
/// dimension grows to cover `region`.
pub(super) fn write_region(
    storage: &ReadableWritableListableStorage,
    dataset: &Dataset,
    region: Range<u64>,
) -> Result<(), StoreError> {
    let time_dim = dataset.time_dim();
    let mut time_array = Array::open(storage.clone(), time_dim)?;
    let existing_len = time_array.shape().first().copied().unwrap_or_default();
    let len = dataset.times().len();
    if region.end.checked_sub(region.start) != Some(len as u64) || region.start > existing_len {
        return Err(StoreError::RegionMismatch {
            region,
            len,
            existing_len,
        });
    }

    let mut arrays = Vec::with_capacity(dataset.data_vars().len());
    for (name, data_var) in dataset.data_vars() {
        let array = Array::open(storage.clone(), name)?;
        let axis = data_var
            .axis(time_dim)
            .ok_or_else(|| DatasetError::MissingTimeDimension(name.clone(), time_dim.to_string()))?;
        let matches_existing = array.dimension_names() == Some(data_var.dims.as_slice())
            && std::iter::zip(array.shape(), data_var.data.shape())
                .enumerate()
                .all(|(i, (&existing, &incoming))| i == axis || existing == incoming as u64);
        if !matches_existing {
            return Err(StoreError::IncompatibleVariable(name.clone()));
        }
        arrays.push((array, data_var, axis));
    }
    if len == 0 {
        return Ok(());
    }

    if region.end > existing_len {
        grow(&mut time_array, 0, region.end)?;
        for (array, _, axis) in &mut arrays {
            grow(array, *axis, region.end)?;
        }
        for name in array_names(storage)? {
            if name == time_dim || dataset.data_var(&name).is_some() {
                continue;
            }
            let mut array = Array::open(storage.clone(), &name)?;
            let axis = array
                .dimension_names()
                .and_then(|dims| dims.iter().position(|dim| dim == time_dim));
            if let Some(axis) = axis {
                grow(&mut array, axis, region.end)?;
            }
        }
    }

    time_array.store_array_subset_elements(
        &ArraySubset::new_with_ranges(&[region.clone()]),
        &epoch_seconds(dataset.times()),
    )?;
    for (array, data_var, axis) in arrays {
        let mut start = vec![0; data_var.dims.len()];
        start[axis] = region.start;
        array.store_array_subset_ndarray(&start, data_var.data.view())?;
    }
    tracing::debug!(region = ?region, "wrote region");
    Ok(())
}
