//! Time axes.
//!
//! A time axis is the ordered sequence of timestamps along the time dimension of a dataset. An axis is well formed
//! if every step between consecutive timestamps equals the nominal step of the dataset's [`TimeResolution`], or is
//! one of the steps of the dataset's declared [`IrregularCadence`].

use std::collections::BTreeSet;

use chrono::{DateTime, TimeDelta, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The temporal resolution of a dataset.
#[derive(Serialize, Deserialize, Copy, Clone, Eq, PartialEq, Hash, Debug, Display)]
pub enum TimeResolution {
    /// One hour.
    #[serde(rename = "hourly")]
    #[display("hourly")]
    Hourly,
    /// Three hours.
    #[serde(rename = "3hourly")]
    #[display("3hourly")]
    ThreeHourly,
    /// Six hours.
    #[serde(rename = "6hourly")]
    #[display("6hourly")]
    SixHourly,
    /// One day.
    #[serde(rename = "daily")]
    #[display("daily")]
    Daily,
    /// One week.
    #[serde(rename = "weekly")]
    #[display("weekly")]
    Weekly,
}

impl TimeResolution {
    /// The nominal step between consecutive timestamps.
    #[must_use]
    pub fn nominal_delta(&self) -> TimeDelta {
        match self {
            Self::Hourly => TimeDelta::hours(1),
            Self::ThreeHourly => TimeDelta::hours(3),
            Self::SixHourly => TimeDelta::hours(6),
            Self::Daily => TimeDelta::days(1),
            Self::Weekly => TimeDelta::weeks(1),
        }
    }
}

/// A time axis error.
#[derive(Debug, Error)]
pub enum TimeAxisError {
    /// A duration string could not be parsed.
    #[error("invalid duration {0:?}, expected a positive integer followed by one of w, d, h, m, s")]
    InvalidDuration(String),
    /// A cadence step that is not positive.
    #[error("irregular cadence steps must be positive, got {0}")]
    NonPositiveStep(TimeDelta),
}

/// Parse a duration like `3d`, `12h`, `30m`, `45s` or `1w`.
///
/// # Errors
/// Returns [`TimeAxisError::InvalidDuration`] if `duration` is not of that form.
pub fn parse_duration(duration: &str) -> Result<TimeDelta, TimeAxisError> {
    let invalid = || TimeAxisError::InvalidDuration(duration.to_string());
    let trimmed = duration.trim();
    let unit_start = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(invalid)?;
    let (count, unit) = trimmed.split_at(unit_start);
    let count: i64 = count.parse().map_err(|_| invalid())?;
    let delta = match unit {
        "w" => TimeDelta::try_weeks(count),
        "d" => TimeDelta::try_days(count),
        "h" => TimeDelta::try_hours(count),
        "m" => TimeDelta::try_minutes(count),
        "s" => TimeDelta::try_seconds(count),
        _ => None,
    };
    delta.ok_or_else(invalid)
}

/// Format a duration in the largest of `w`, `d`, `h`, `m`, `s` that divides it.
#[must_use]
pub fn format_duration(delta: TimeDelta) -> String {
    let seconds = delta.num_seconds();
    [("w", 604_800), ("d", 86_400), ("h", 3_600), ("m", 60)]
        .into_iter()
        .find(|(_, unit)| seconds != 0 && seconds % unit == 0)
        .map_or_else(
            || format!("{seconds}s"),
            |(suffix, unit)| format!("{}{suffix}", seconds / unit),
        )
}

/// A declared finite set of acceptable steps between consecutive timestamps, beyond the nominal step.
///
/// Serialized as a list of durations, e.g. `["3d", "4d"]`.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug, Default)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct IrregularCadence(BTreeSet<TimeDelta>);

impl IrregularCadence {
    /// Create an irregular cadence from its steps.
    ///
    /// # Errors
    /// Returns [`TimeAxisError::NonPositiveStep`] if any step is zero or negative.
    pub fn new(steps: impl IntoIterator<Item = TimeDelta>) -> Result<Self, TimeAxisError> {
        steps
            .into_iter()
            .map(|step| {
                if step > TimeDelta::zero() {
                    Ok(step)
                } else {
                    Err(TimeAxisError::NonPositiveStep(step))
                }
            })
            .collect::<Result<BTreeSet<_>, _>>()
            .map(Self)
    }

    /// Returns true if `step` is one of the declared steps.
    #[must_use]
    pub fn contains(&self, step: &TimeDelta) -> bool {
        self.0.contains(step)
    }

    /// The declared steps, ascending.
    pub fn steps(&self) -> impl Iterator<Item = &TimeDelta> {
        self.0.iter()
    }

    /// Returns true if no steps are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<String>> for IrregularCadence {
    type Error = TimeAxisError;

    fn try_from(steps: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(
            steps
                .iter()
                .map(|step| parse_duration(step))
                .collect::<Result<Vec<_>, _>>()?,
        )
    }
}

impl From<IrregularCadence> for Vec<String> {
    fn from(cadence: IrregularCadence) -> Self {
        cadence.0.into_iter().map(format_duration).collect()
    }
}

/// Validates the ordering of time axes.
#[derive(Clone, Debug, Default)]
pub struct TimeAxisValidator {
    irregular_cadence: Option<IrregularCadence>,
}

impl TimeAxisValidator {
    /// Create a validator accepting the steps of `irregular_cadence` in addition to the expected step.
    #[must_use]
    pub fn new(irregular_cadence: Option<IrregularCadence>) -> Self {
        Self { irregular_cadence }
    }

    /// The declared irregular cadence, if any.
    #[must_use]
    pub fn irregular_cadence(&self) -> Option<&IrregularCadence> {
        self.irregular_cadence.as_ref()
    }

    /// Returns true if a step of `delta` between consecutive timestamps is acceptable.
    #[must_use]
    pub fn accepts_step(&self, delta: TimeDelta, expected_delta: TimeDelta) -> bool {
        delta == expected_delta
            || self
                .irregular_cadence
                .as_ref()
                .is_some_and(|cadence| cadence.contains(&delta))
    }

    /// Return the position of the first timestamp that is not an accepted step after its predecessor.
    ///
    /// Returns [`None`] if the whole axis is in expected order.
    #[must_use]
    pub fn first_unexpected_step(
        &self,
        times: &[DateTime<Utc>],
        expected_delta: TimeDelta,
    ) -> Option<usize> {
        times
            .windows(2)
            .position(|pair| !self.accepts_step(pair[1] - pair[0], expected_delta))
            .map(|position| position + 1)
    }

    /// Returns true if every step of `times` is the expected step or a declared irregular step.
    ///
    /// Empty and single timestamp axes are in expected order.
    #[must_use]
    pub fn are_times_in_expected_order(
        &self,
        times: &[DateTime<Utc>],
        expected_delta: TimeDelta,
    ) -> bool {
        self.first_unexpected_step(times, expected_delta).is_none()
    }
}

/// Returns true if every step of `times` is `expected_delta` or a step of `irregular_cadence`.
///
/// See [`TimeAxisValidator::are_times_in_expected_order`].
#[must_use]
pub fn are_times_in_expected_order(
    times: &[DateTime<Utc>],
    expected_delta: TimeDelta,
    irregular_cadence: Option<&IrregularCadence>,
) -> bool {
    TimeAxisValidator::new(irregular_cadence.cloned()).are_times_in_expected_order(times, expected_delta)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn day(offset: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 3, 1, 0, 0, 0).unwrap() + TimeDelta::days(offset)
    }

    #[test]
    fn duration_parsing() {
        assert_eq!(parse_duration("3d").unwrap(), TimeDelta::days(3));
        assert_eq!(parse_duration("12h").unwrap(), TimeDelta::hours(12));
        assert_eq!(parse_duration("1w").unwrap(), TimeDelta::weeks(1));
        assert!(parse_duration("d").is_err());
        assert!(parse_duration("3").is_err());
        assert!(parse_duration("3y").is_err());
        assert_eq!(format_duration(TimeDelta::days(3)), "3d");
        assert_eq!(format_duration(TimeDelta::hours(36)), "36h");
        assert_eq!(format_duration(TimeDelta::days(14)), "2w");
        assert_eq!(format_duration(TimeDelta::seconds(90)), "90s");
    }

    #[test]
    fn irregular_cadence_serde() {
        let cadence: IrregularCadence = serde_json::from_str(r#"["4d", "3d"]"#).unwrap();
        assert!(cadence.contains(&TimeDelta::days(3)));
        assert!(!cadence.contains(&TimeDelta::days(5)));
        assert_eq!(serde_json::to_string(&cadence).unwrap(), r#"["3d","4d"]"#);
        assert!(serde_json::from_str::<IrregularCadence>(r#"["0d"]"#).is_err());
        assert!(IrregularCadence::new([TimeDelta::days(-1)]).is_err());
    }

    #[test]
    fn contiguous_times() {
        let contig: Vec<_> = (0..15).map(day).collect();
        let validator = TimeAxisValidator::default();
        let daily = TimeDelta::days(1);
        assert!(validator.are_times_in_expected_order(&contig, daily));
        assert!(validator.are_times_in_expected_order(&[day(0), day(1)], daily));
        assert!(!validator.are_times_in_expected_order(&[day(0), day(2)], daily));
        assert!(validator.are_times_in_expected_order(&[day(0)], TimeDelta::hours(5)));
        assert!(validator.are_times_in_expected_order(&[], daily));
    }

    #[test]
    fn gaps_and_disorder() {
        let daily = TimeDelta::days(1);
        let validator = TimeAxisValidator::default();

        let mut week_gap: Vec<_> = (0..15).map(day).collect();
        week_gap.push(day(21));
        assert!(!validator.are_times_in_expected_order(&week_gap, daily));
        assert_eq!(validator.first_unexpected_step(&week_gap, daily), Some(15));

        let mut week_behind: Vec<_> = vec![day(-7)];
        week_behind.extend((0..15).map(day));
        assert!(!validator.are_times_in_expected_order(&week_behind, daily));

        let out_of_order = [day(1), day(2), day(0), day(12), day(3)];
        assert!(!validator.are_times_in_expected_order(&out_of_order, daily));
        assert_eq!(validator.first_unexpected_step(&out_of_order, daily), Some(2));
    }

    #[test]
    fn irregular_cadences() {
        let daily = TimeDelta::days(1);
        let cadence = IrregularCadence::new([TimeDelta::days(3), TimeDelta::days(4)]).unwrap();
        let validator = TimeAxisValidator::new(Some(cadence.clone()));

        let three_and_four_day_updates = [day(0), day(3), day(6), day(10)];
        assert!(validator.are_times_in_expected_order(&three_and_four_day_updates, daily));
        assert!(are_times_in_expected_order(
            &three_and_four_day_updates,
            daily,
            Some(&cadence)
        ));
        assert!(!are_times_in_expected_order(
            &three_and_four_day_updates,
            daily,
            None
        ));

        let five_day_updates = [day(0), day(3), day(6), day(11), day(14)];
        assert!(!validator.are_times_in_expected_order(&five_day_updates, daily));
    }

    #[test]
    fn time_resolution() {
        assert_eq!(TimeResolution::Daily.nominal_delta(), TimeDelta::days(1));
        assert_eq!(TimeResolution::ThreeHourly.to_string(), "3hourly");
        assert_eq!(
            serde_json::from_str::<TimeResolution>(r#""6hourly""#).unwrap(),
            TimeResolution::SixHourly
        );
    }
}
