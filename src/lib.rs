//! Update planning and store synchronisation for time-indexed gridded datasets.
//!
//! Gridded climate datasets are published as chunked array stores with one dimension carrying chronological order.
//! Each update cycle parses newly available data into an incoming [`Dataset`](dataset::Dataset) and brings the
//! published store up to date with it, without rewriting the whole store.
//!
//! ## Overview
//!  - [`time_axis`]: the [`TimeAxisValidator`](time_axis::TimeAxisValidator) checks that a time axis steps by the
//!    nominal step of its [`TimeResolution`](time_axis::TimeResolution) or a declared
//!    [`IrregularCadence`](time_axis::IrregularCadence).
//!  - [`update_planner`]: the [`UpdatePlanner`](update_planner::UpdatePlanner) aligns an incoming time axis against the
//!    existing one and returns the ordered [`DatasetEdit`](update_planner::DatasetEdit)s (inserts, then a trailing
//!    append) that bring the existing dataset up to date.
//!  - [`store`]: the [`ArrayStore`](store::ArrayStore) and [`MetadataStore`](store::MetadataStore) traits, implemented
//!    by the [`Local`](store::Local) and `S3` backends, read datasets, apply region writes, and publish metadata
//!    documents with history snapshots.
//!  - [`dims`], [`config`] and [`attributes`]: standard dimensions, dataset configuration, and the transient update
//!    attributes.
//!  - [`array`], [`group`], [`array_subset`] and [`storage`]: the chunked array layout beneath dataset stores.
//!
//! ## Example
//! ```rust,ignore
//! # use gridded_etl::{config::DatasetConfig, store::{ArrayStore, Local, OpenOptions, WriteMode}};
//! # use gridded_etl::update_planner::UpdatePlanner;
//! let config = DatasetConfig::from_json_file("chirps_final_05.json")?;
//! let store = Local::new(config.clone(), "/data")?;
//! let incoming = parse_latest_files()?;
//! match store.open(&OpenOptions::default())? {
//!     Some(existing) => {
//!         let plan = UpdatePlanner::from_config(&config).calculate_update_time_ranges(&existing, &incoming)?;
//!         plan.apply(&store, &incoming)?;
//!     }
//!     None => store.write(&incoming, WriteMode::Overwrite)?,
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Crate Features
//! #### Default
//!  - `s3`: the `S3` store and [`ObjectStorage`](storage::store::ObjectStorage) over [`object_store`].
//!
//! ## Logging
//! Events are emitted with [`tracing`]. No subscriber is installed.

#![warn(unused_variables)]
#![warn(dead_code)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![deny(clippy::missing_panics_doc)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod array;
pub mod array_subset;
pub mod attributes;
pub mod config;
pub mod dataset;
pub mod dims;
pub mod group;
pub mod storage;
pub mod store;
pub mod time_axis;
pub mod update_planner;
