use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use chrono::{TimeDelta, TimeZone, Utc};
use ndarray::{ArrayD, IxDyn};
use serde_json::json;

use gridded_etl::{
    attributes::{update_attributes_for, Attributes, DATE_RANGE, UPDATE_IN_PROGRESS},
    config::{DatasetConfig, StacType},
    dataset::{Coordinate, DataArray, Dataset},
    storage::StorePrefix,
    store::{ArrayStore, Local, MetadataStore, OpenOptions, StoreError, WriteMode, S3},
    time_axis::TimeResolution,
};

fn config() -> DatasetConfig {
    DatasetConfig::new("chirps_final_05", TimeResolution::Daily)
}

fn dataset() -> Dataset {
    let start = Utc.with_ymd_and_hms(2023, 8, 1, 0, 0, 0).unwrap();
    let mut dataset = Dataset::new("time", (0..3).map(|d| start + TimeDelta::days(d)).collect());
    dataset.insert_coord("latitude", Coordinate::new(vec![0.0]));
    dataset.insert_coord("longitude", Coordinate::new(vec![0.0, 1.0]));
    let data = ArrayD::from_shape_vec(IxDyn(&[3, 1, 2]), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
    dataset
        .insert_data_var("precip", DataArray::new(["time", "latitude", "longitude"], data))
        .unwrap();
    let attrs = dataset.attrs_mut();
    attrs.insert("title".to_string(), json!("CHIRPS Final 0.05"));
    attrs.insert("provider".to_string(), json!("UCSB"));
    attrs.insert(UPDATE_IN_PROGRESS.to_string(), json!(true));
    dataset
}

#[test]
fn local_push_keeps_history() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::TempDir::new()?;
    let store = Local::new(config(), dir.path())?;
    let title = "Die Hard";

    assert!(!store.exists(title, StacType::Item)?);
    assert!(store.retrieve(title, StacType::Item)?.is_none());

    let first = json!({"title": title, "year": 1988});
    let location = store.push(title, &first, StacType::Item)?;
    assert_eq!(
        location.as_str(),
        dir.path().join("metadata/datasets/Die Hard.json").display().to_string()
    );
    assert!(store.exists(title, StacType::Item)?);
    assert!(!dir.path().join("history").exists());

    let live = dir.path().join("metadata/datasets/Die Hard.json");
    std::fs::File::options()
        .write(true)
        .open(&live)?
        .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(1_692_639_017))?;

    let second = json!({"title": title, "year": 1988, "sequels": 4});
    store.push(title, &second, StacType::Item)?;

    let history = dir
        .path()
        .join("history/Die Hard/Die Hard-2023-08-21T17:30:17.json");
    assert_eq!(std::fs::read(history)?, serde_json::to_vec_pretty(&first)?);
    assert_eq!(std::fs::read(&live)?, serde_json::to_vec_pretty(&second)?);

    let (content, location) = store.retrieve(title, StacType::Item)?.unwrap();
    assert_eq!(content, second);
    assert_eq!(location.as_str(), live.display().to_string());
    Ok(())
}

#[test]
fn local_catalog_path_has_no_type_segment() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::TempDir::new()?;
    let store = Local::new(config(), dir.path())?;
    let location = store.metadata_path("Arbol", StacType::Catalog)?;
    assert_eq!(location.key().as_str(), "metadata/Arbol.json");
    let location = store.metadata_path("CHIRPS", StacType::Collection)?;
    assert_eq!(location.key().as_str(), "metadata/collections/CHIRPS.json");
    Ok(())
}

#[test]
fn local_write_metadata_only_merges() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::TempDir::new()?;
    let store = Local::new(config(), dir.path())?;
    assert!(matches!(
        store.write_metadata_only(&Attributes::new()),
        Err(StoreError::NoExistingDataset(_))
    ));

    let mut dataset = dataset();
    let moved = dataset.take_post_parse_attrs::<&str>(&[]);
    assert_eq!(moved[UPDATE_IN_PROGRESS], json!(true));
    store.write(&dataset, WriteMode::Overwrite)?;

    let mut patch = update_attributes_for(&[], dataset.times());
    patch.insert("provider".to_string(), json!("Climate Hazards Center"));
    store.write_metadata_only(&patch)?;

    let updated = store.open(&OpenOptions::default())?.unwrap();
    let attrs = updated.attrs();
    assert_eq!(attrs["title"], "CHIRPS Final 0.05");
    assert_eq!(attrs["provider"], "Climate Hazards Center");
    assert_eq!(attrs[DATE_RANGE], json!(["2023080100", "2023080300"]));
    assert_eq!(attrs[UPDATE_IN_PROGRESS], json!(false));
    assert!(!dir.path().join("history").exists());
    Ok(())
}

#[test]
fn s3_metadata_and_dataset() -> Result<(), Box<dyn std::error::Error>> {
    let store = S3::with_object_store(
        config(),
        "zarr-dev",
        Arc::new(object_store::memory::InMemory::new()),
    )?;
    assert_eq!(store.to_string(), "S3");
    assert!(!store.has_existing()?);

    let location = store.push("chirps", &json!({"v": 1}), StacType::Item)?;
    assert_eq!(location.as_str(), "s3://zarr-dev/metadata/datasets/chirps.json");
    store.push("chirps", &json!({"v": 2}), StacType::Item)?;

    let root = store.filesystem_handle(false)?;
    let history = root.list_prefix(&StorePrefix::new("history/chirps/")?)?;
    assert_eq!(history.len(), 1);
    assert_eq!(root.get(&history[0])?.unwrap(), serde_json::to_vec_pretty(&json!({"v": 1}))?);
    let (content, _) = store.retrieve("chirps", StacType::Item)?.unwrap();
    assert_eq!(content, json!({"v": 2}));

    store.write(&dataset(), WriteMode::Overwrite)?;
    assert!(store.has_existing()?);
    assert!(root.exists(&"datasets/chirps_final_05-daily.zarr/zarr.json".try_into()?)?);
    let opened = store.open(&OpenOptions::default())?.unwrap();
    assert_eq!(opened.times(), dataset().times());
    assert_eq!(opened.data_var("precip"), dataset().data_var("precip"));
    Ok(())
}
