use std::ops::Range;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use ndarray::{ArrayD, IxDyn};

use gridded_etl::{
    config::DatasetConfig,
    dataset::{Coordinate, DataArray, Dataset},
    store::{ArrayStore, Local, OpenOptions, WriteMode},
    time_axis::TimeResolution,
    update_planner::{AxisRole, EditKind, PlanError, UpdatePlanner},
};

fn day(offset: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap() + TimeDelta::days(offset)
}

fn days(ranges: &[Range<i64>]) -> Vec<i64> {
    ranges.iter().cloned().flatten().collect()
}

/// A regular dataset on `days` with every value of day `d` equal to `offset + d`.
fn dataset(days: &[i64], offset: f64) -> Dataset {
    let mut dataset = Dataset::new("time", days.iter().copied().map(day).collect());
    dataset.insert_coord("latitude", Coordinate::new(vec![10.0, 10.5]));
    dataset.insert_coord("longitude", Coordinate::new(vec![-80.0, -79.5, -79.0]));
    let values = days
        .iter()
        .flat_map(|&d| std::iter::repeat(offset + d as f64).take(6))
        .collect();
    let data = ArrayD::from_shape_vec(IxDyn(&[days.len(), 2, 3]), values).unwrap();
    dataset
        .insert_data_var("precip", DataArray::new(["time", "latitude", "longitude"], data))
        .unwrap();
    dataset
}

const EXISTING: Range<i64> = 0..90;

fn complex_update() -> Vec<i64> {
    days(&[5..6, 10..18, 25..26, 30..31, 40..52, 60..61, 90..126])
}

fn config() -> DatasetConfig {
    let mut config = DatasetConfig::new("chirps_final_05", TimeResolution::Daily);
    config.requested_chunks.insert("time".to_string(), 16);
    config
}

#[test]
fn complex_update_plan() {
    let existing = dataset(&days(&[EXISTING]), 0.0);
    let incoming = dataset(&complex_update(), 1000.0);
    let plan = UpdatePlanner::from_config(&config())
        .calculate_update_time_ranges(&existing, &incoming)
        .unwrap();

    assert_eq!(plan.edits().len(), 7);
    let sizes: Vec<u64> = plan.edits().iter().map(|edit| edit.len()).collect();
    assert_eq!(sizes, vec![1, 8, 1, 1, 12, 1, 36]);
    assert_eq!(plan.inserts().count(), 6);
    assert_eq!(
        plan.index_ranges(),
        vec![5..6, 10..18, 25..26, 30..31, 40..52, 60..61, 90..126]
    );

    let append = plan.append().unwrap();
    assert_eq!(append.kind, EditKind::Append);
    assert_eq!(append.time_span(), TimeDelta::days(35));
    assert_eq!(plan.time_ranges()[1], (day(10), day(17)));

    // ranges are disjoint and ascending
    for pair in plan.index_ranges().windows(2) {
        assert!(pair[0].end <= pair[1].start);
    }
}

#[test]
fn complex_update_round_trip() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = Local::new(config(), dir.path()).unwrap();
    assert!(store.open(&OpenOptions::default()).unwrap().is_none());

    let existing = dataset(&days(&[EXISTING]), 0.0);
    store.write(&existing, WriteMode::Overwrite).unwrap();
    assert!(store.has_existing().unwrap());
    assert!(dir
        .path()
        .join("datasets/chirps_final_05-daily.zarr/precip/zarr.json")
        .is_file());

    let existing = store.open(&OpenOptions::default()).unwrap().unwrap();
    let incoming = dataset(&complex_update(), 1000.0);
    let plan = UpdatePlanner::from_config(store.config())
        .calculate_update_time_ranges(&existing, &incoming)
        .unwrap();
    plan.apply(&store, &incoming).unwrap();

    let updated = store.open(&OpenOptions::default()).unwrap().unwrap();
    let expected_times: Vec<_> = (0..126).map(day).collect();
    assert_eq!(updated.times(), expected_times.as_slice());

    let precip = &updated.data_var("precip").unwrap().data;
    assert_eq!(precip.shape(), &[126, 2, 3]);
    let incoming_days = complex_update();
    for d in 0..126 {
        let expected = if incoming_days.contains(&d) {
            1000.0 + d as f64
        } else {
            d as f64
        };
        assert_eq!(precip[[d as usize, 1, 2]], expected, "day {d}");
    }
    assert_eq!(
        updated.coord("longitude").unwrap().values,
        vec![-80.0, -79.5, -79.0]
    );
}

#[test]
fn append_gap_rejected_and_store_stays_plannable() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::TempDir::new()?;
    let store = Local::new(config(), dir.path())?;
    store.write(&dataset(&days(&[0..3]), 0.0), WriteMode::Overwrite)?;
    let planner = UpdatePlanner::from_config(store.config());

    let existing = store.open(&OpenOptions::default())?.unwrap();
    let gapped = dataset(&days(&[5..7]), 1000.0);
    assert!(matches!(
        planner.calculate_update_time_ranges(&existing, &gapped),
        Err(PlanError::OutOfOrder {
            role: AxisRole::Incoming,
            position: 0
        })
    ));

    // back-fill one day and append two more
    let incoming = dataset(&days(&[1..2, 3..5]), 1000.0);
    let plan = planner.calculate_update_time_ranges(&existing, &incoming)?;
    assert_eq!(plan.index_ranges(), vec![1..2, 3..5]);
    plan.apply(&store, &incoming)?;

    // the updated store is a valid existing axis for the next update
    let existing = store.open(&OpenOptions::default())?.unwrap();
    let expected: Vec<_> = (0..5).map(day).collect();
    assert_eq!(existing.times(), expected.as_slice());
    let next = dataset(&days(&[5..7]), 2000.0);
    let plan = planner.calculate_update_time_ranges(&existing, &next)?;
    assert_eq!(plan.index_ranges(), vec![5..7]);
    plan.apply(&store, &next)?;

    let updated = store.open(&OpenOptions::default())?.unwrap();
    let expected: Vec<_> = (0..7).map(day).collect();
    assert_eq!(updated.times(), expected.as_slice());
    let precip = &updated.data_var("precip").unwrap().data;
    let firsts: Vec<f64> = (0..7).map(|d| precip[[d, 0, 0]]).collect();
    assert_eq!(firsts, vec![0.0, 1001.0, 2.0, 1003.0, 1004.0, 2005.0, 2006.0]);
    Ok(())
}
