//! Dataset attributes.
//!
//! Some attributes describe an update cycle rather than the dataset itself. After parsing, these transient
//! attributes are moved out of the live attributes with [`move_post_parse_attrs_to_dict`], and the workflow records
//! them on the store with [`MetadataStore::write_metadata_only`](crate::store::MetadataStore::write_metadata_only).

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Key/value attributes of a dataset or array.
pub type Attributes = serde_json::Map<String, Value>;

/// The end of the time axis before the latest update, formatted as a [date range entry](format_date_range_entry).
pub const UPDATE_PREVIOUS_END_DATE: &str = "update_previous_end_date";

/// The first and last timestamps of the dataset, formatted as [date range entries](format_date_range_entry).
pub const DATE_RANGE: &str = "date range";

/// Set while an update is being written.
pub const UPDATE_IN_PROGRESS: &str = "update_in_progress";

/// Set when the dataset was created by the latest update.
pub const INITIAL_PARSE: &str = "initial_parse";

/// The transient attribute keys recognized for every dataset.
pub const POST_PARSE_ATTRIBUTES: [&str; 4] = [
    UPDATE_PREVIOUS_END_DATE,
    DATE_RANGE,
    UPDATE_IN_PROGRESS,
    INITIAL_PARSE,
];

/// Split `attrs` into the attributes that remain and the transient attributes moved out of them.
///
/// The transient attributes are the [recognized keys](POST_PARSE_ATTRIBUTES) and `custom_keys`. Only keys present
/// in `attrs` appear in the moved attributes, with their current values.
#[must_use]
pub fn move_post_parse_attrs_to_dict<S: AsRef<str>>(
    attrs: &Attributes,
    custom_keys: &[S],
) -> (Attributes, Attributes) {
    let is_transient = |key: &str| {
        POST_PARSE_ATTRIBUTES.contains(&key) || custom_keys.iter().any(|custom| custom.as_ref() == key)
    };
    attrs
        .iter()
        .map(|(key, value)| (key.clone(), value.clone()))
        .partition::<Attributes, _>(|(key, _)| !is_transient(key))
}

/// Format a timestamp as an entry of the [`DATE_RANGE`] attribute, e.g. `2021013100`.
#[must_use]
pub fn format_date_range_entry(time: &DateTime<Utc>) -> String {
    time.format("%Y%m%d%H").to_string()
}

/// The bookkeeping attributes of an update of a dataset with time axis `existing_times` by `incoming_times`.
///
/// Both axes must be sorted ascending. The [`DATE_RANGE`] spans both axes, [`UPDATE_PREVIOUS_END_DATE`] is the end of
/// the existing axis (absent for an initial parse), and [`UPDATE_IN_PROGRESS`] is cleared.
#[must_use]
pub fn update_attributes_for(
    existing_times: &[DateTime<Utc>],
    incoming_times: &[DateTime<Utc>],
) -> Attributes {
    let mut attributes = Attributes::new();
    let start = existing_times.first().into_iter().chain(incoming_times.first()).min();
    let end = existing_times.last().into_iter().chain(incoming_times.last()).max();
    if let (Some(start), Some(end)) = (start, end) {
        attributes.insert(
            DATE_RANGE.to_string(),
            Value::from(vec![format_date_range_entry(start), format_date_range_entry(end)]),
        );
    }
    if let Some(previous_end) = existing_times.last() {
        attributes.insert(
            UPDATE_PREVIOUS_END_DATE.to_string(),
            Value::from(format_date_range_entry(previous_end)),
        );
    }
    attributes.insert(UPDATE_IN_PROGRESS.to_string(), Value::Bool(false));
    attributes.insert(INITIAL_PARSE.to_string(), Value::Bool(existing_times.is_empty()));
    attributes
}

/// The attributes marking an update as in progress.
#[must_use]
pub fn update_in_progress_attributes() -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert(UPDATE_IN_PROGRESS.to_string(), Value::Bool(true));
    attributes
}
