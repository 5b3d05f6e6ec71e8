//! Update planning.
//!
//! An [`UpdatePlanner`] aligns the time axis of an incoming dataset against the time axis of an existing dataset and
//! returns an [`UpdatePlan`]: the ordered [`DatasetEdit`]s that bring the existing dataset up to date with region
//! writes alone.
//!
//! Incoming timestamps within the span of the existing axis back-fill existing positions. Each maximal run of
//! consecutive existing positions becomes an [insert](EditKind::Insert) edit. Incoming timestamps beyond the end of
//! the existing axis become a single trailing [append](EditKind::Append) edit.

use std::ops::Range;

use chrono::{DateTime, TimeDelta, Utc};
use derive_more::Display;
use thiserror::Error;

use crate::{
    config::DatasetConfig,
    dataset::Dataset,
    store::{ArrayStore, StoreError},
    time_axis::TimeAxisValidator,
};

/// The kind of a [`DatasetEdit`].
#[derive(Copy, Clone, Eq, PartialEq, Debug, Display)]
pub enum EditKind {
    /// Back-fills positions within the existing time axis.
    #[display("insert")]
    Insert,
    /// Extends the time axis past its existing end.
    #[display("append")]
    Append,
}

/// A contiguous block of the time dimension to write.
#[derive(Clone, Eq, PartialEq, Debug, Display)]
#[display("{kind} {} to {} at {index_range:?}", time_range.0, time_range.1)]
pub struct DatasetEdit {
    /// The kind of the edit.
    pub kind: EditKind,
    /// The first and last timestamps of the block.
    pub time_range: (DateTime<Utc>, DateTime<Utc>),
    /// The positions of the block on the time axis of the existing dataset.
    pub index_range: Range<u64>,
    /// The positions of the block on the time axis of the incoming dataset.
    pub incoming_range: Range<usize>,
}

impl DatasetEdit {
    /// The number of time positions written by the edit.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.index_range.end - self.index_range.start
    }

    /// Returns true if the edit writes no time positions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index_range.is_empty()
    }

    /// The span between the first and last timestamps of the edit.
    #[must_use]
    pub fn time_span(&self) -> TimeDelta {
        self.time_range.1 - self.time_range.0
    }
}

/// Which time axis an error refers to.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Display)]
pub enum AxisRole {
    /// The time axis of the existing dataset.
    #[display("existing")]
    Existing,
    /// The time axis of the incoming dataset.
    #[display("incoming")]
    Incoming,
}

/// An update planning error.
#[derive(Debug, Error)]
pub enum PlanError {
    /// A time axis that fails validation.
    #[error("{role} time axis is out of order at position {position}")]
    OutOfOrder {
        /// The offending axis.
        role: AxisRole,
        /// The position of the first timestamp out of order.
        position: usize,
    },
    /// An incoming timestamp within the existing span that is not on the existing time axis.
    #[error("incoming timestamp {0} is within the existing time axis but not on it")]
    UnalignedTimestamp(DateTime<Utc>),
    /// An incoming timestamp before the start of the existing time axis.
    #[error("incoming timestamp {0} is before the start of the existing time axis")]
    BeforeExistingStart(DateTime<Utc>),
    /// The existing time axis is empty.
    #[error("the existing time axis is empty")]
    EmptyExisting,
}

/// The ordered edits of an update, inserts before the trailing append.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct UpdatePlan {
    edits: Vec<DatasetEdit>,
}

impl UpdatePlan {
    /// The edits, in ascending time order.
    #[must_use]
    pub fn edits(&self) -> &[DatasetEdit] {
        &self.edits
    }

    /// Returns true if the plan has no edits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// The first and last timestamps of every edit.
    #[must_use]
    pub fn time_ranges(&self) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        self.edits.iter().map(|edit| edit.time_range).collect()
    }

    /// The existing time axis positions of every edit.
    #[must_use]
    pub fn index_ranges(&self) -> Vec<Range<u64>> {
        self.edits.iter().map(|edit| edit.index_range.clone()).collect()
    }

    /// The insert edits.
    pub fn inserts(&self) -> impl Iterator<Item = &DatasetEdit> {
        self.edits
            .iter()
            .filter(|edit| edit.kind == EditKind::Insert)
    }

    /// The append edit, if any.
    #[must_use]
    pub fn append(&self) -> Option<&DatasetEdit> {
        self.edits
            .last()
            .filter(|edit| edit.kind == EditKind::Append)
    }

    /// Write the block of `incoming` selected by each edit to its region of `store`, in order.
    ///
    /// # Errors
    /// Returns a [`StoreError`] if a block cannot be selected or written. Edits before the failing edit remain applied.
    pub fn apply<S: ArrayStore + ?Sized>(
        &self,
        store: &S,
        incoming: &Dataset,
    ) -> Result<(), StoreError> {
        for edit in &self.edits {
            let block = incoming.isel_time(edit.incoming_range.clone())?;
            store.write_region(&block, edit.index_range.clone())?;
        }
        Ok(())
    }
}

/// Plans updates of datasets with a given nominal time step.
#[derive(Clone, Debug)]
pub struct UpdatePlanner {
    expected_delta: TimeDelta,
    validator: TimeAxisValidator,
}

impl UpdatePlanner {
    /// Create a planner for time axes with nominal step `expected_delta`, validated by `validator`.
    #[must_use]
    pub fn new(expected_delta: TimeDelta, validator: TimeAxisValidator) -> Self {
        Self {
            expected_delta,
            validator,
        }
    }

    /// Create a planner for the dataset configured by `config`.
    #[must_use]
    pub fn from_config(config: &DatasetConfig) -> Self {
        Self::new(config.expected_delta(), config.validator())
    }

    /// The nominal time step.
    #[must_use]
    pub fn expected_delta(&self) -> TimeDelta {
        self.expected_delta
    }

    /// Plan the update of `existing` by `incoming`.
    ///
    /// # Errors
    /// See [`plan_time_axes`](UpdatePlanner::plan_time_axes).
    pub fn calculate_update_time_ranges(
        &self,
        existing: &Dataset,
        incoming: &Dataset,
    ) -> Result<UpdatePlan, PlanError> {
        self.plan_time_axes(existing.times(), incoming.times())
    }

    /// Plan the update of the time axis `existing` by the time axis `incoming`.
    ///
    /// The existing axis must validate as a whole. The incoming axis must be strictly increasing, and its timestamps
    /// past the existing end must continue the existing axis by accepted steps, so that the axis stays valid once the
    /// plan is applied.
    ///
    /// # Errors
    /// Returns a [`PlanError`] if
    ///  - `existing` is empty,
    ///  - either axis is out of order, or the appended timestamps do not continue the existing axis,
    ///  - an incoming timestamp is before the existing start, or
    ///  - an incoming timestamp within the existing span is not on the existing axis.
    pub fn plan_time_axes(
        &self,
        existing: &[DateTime<Utc>],
        incoming: &[DateTime<Utc>],
    ) -> Result<UpdatePlan, PlanError> {
        let (Some(&existing_start), Some(&existing_end)) = (existing.first(), existing.last())
        else {
            return Err(PlanError::EmptyExisting);
        };
        if let Some(position) = self
            .validator
            .first_unexpected_step(existing, self.expected_delta)
        {
            return Err(PlanError::OutOfOrder {
                role: AxisRole::Existing,
                position,
            });
        }
        if let Some(position) = incoming.windows(2).position(|pair| pair[1] <= pair[0]) {
            return Err(PlanError::OutOfOrder {
                role: AxisRole::Incoming,
                position: position + 1,
            });
        }

        let split = incoming.partition_point(|time| *time <= existing_end);
        let (within, beyond) = incoming.split_at(split);

        let mut edits = Vec::new();
        let mut run: Option<(usize, usize, usize)> = None;
        for (position, time) in within.iter().enumerate() {
            if *time < existing_start {
                return Err(PlanError::BeforeExistingStart(*time));
            }
            let index = existing
                .binary_search(time)
                .map_err(|_| PlanError::UnalignedTimestamp(*time))?;
            run = match run {
                Some((start, first_index, last_index)) if index == last_index + 1 => {
                    Some((start, first_index, index))
                }
                Some(complete) => {
                    edits.push(insert_edit(within, complete, position));
                    Some((position, index, index))
                }
                None => Some((position, index, index)),
            };
        }
        if let Some(complete) = run {
            edits.push(insert_edit(within, complete, within.len()));
        }

        if let (Some(&append_start), Some(&append_end)) = (beyond.first(), beyond.last()) {
            if !self
                .validator
                .accepts_step(append_start - existing_end, self.expected_delta)
            {
                tracing::warn!(
                    existing_end = %existing_end,
                    append_start = %append_start,
                    "append does not start one step after the existing time axis"
                );
                return Err(PlanError::OutOfOrder {
                    role: AxisRole::Incoming,
                    position: split,
                });
            }
            if let Some(position) = self
                .validator
                .first_unexpected_step(beyond, self.expected_delta)
            {
                return Err(PlanError::OutOfOrder {
                    role: AxisRole::Incoming,
                    position: split + position,
                });
            }
            let existing_len = existing.len() as u64;
            let edit = DatasetEdit {
                kind: EditKind::Append,
                time_range: (append_start, append_end),
                index_range: existing_len..existing_len + beyond.len() as u64,
                incoming_range: split..incoming.len(),
            };
            tracing::debug!(edit = %edit, "planned append");
            edits.push(edit);
        }

        let plan = UpdatePlan { edits };
        tracing::info!(
            inserts = plan.inserts().count(),
            appends = usize::from(plan.append().is_some()),
            "planned dataset update"
        );
        Ok(plan)
    }
}

/// The insert edit of the run of incoming positions `start..end` targeting existing positions `first..=last`.
fn insert_edit(
    within: &[DateTime<Utc>],
    (start, first_index, last_index): (usize, usize, usize),
    end: usize,
) -> DatasetEdit {
    let edit = DatasetEdit {
        kind: EditKind::Insert,
        time_range: (within[start], within[end - 1]),
        index_range: first_index as u64..last_index as u64 + 1,
        incoming_range: start..end,
    };
    tracing::debug!(edit = %edit, "planned insert");
    edit
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::time_axis::IrregularCadence;

    fn day(offset: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap() + TimeDelta::days(offset)
    }

    fn days(ranges: &[Range<i64>]) -> Vec<DateTime<Utc>> {
        ranges.iter().cloned().flatten().map(day).collect()
    }

    fn daily_planner() -> UpdatePlanner {
        UpdatePlanner::new(TimeDelta::days(1), TimeAxisValidator::default())
    }

    #[test]
    fn plan_inserts_and_append() {
        let existing = days(&[0..10]);
        let incoming = days(&[2..4, 6..7, 10..13]);
        let plan = daily_planner().plan_time_axes(&existing, &incoming).unwrap();
        assert_eq!(plan.index_ranges(), vec![2..4, 6..7, 10..13]);
        assert_eq!(
            plan.edits().iter().map(|edit| edit.kind).collect::<Vec<_>>(),
            vec![EditKind::Insert, EditKind::Insert, EditKind::Append]
        );
        assert_eq!(plan.edits()[1].incoming_range, 2..3);
        let append = plan.append().unwrap();
        assert_eq!(append.time_range, (day(10), day(12)));
        assert_eq!(append.incoming_range, 3..6);
        assert_eq!(append.time_span(), TimeDelta::days(2));
        assert_eq!(plan.time_ranges()[0], (day(2), day(3)));
    }

    #[test]
    fn plan_append_only() {
        let plan = daily_planner()
            .plan_time_axes(&days(&[0..3]), &days(&[3..5]))
            .unwrap();
        assert_eq!(plan.edits().len(), 1);
        assert_eq!(plan.append().unwrap().index_range, 3..5);
        assert_eq!(plan.inserts().count(), 0);

        let empty = daily_planner().plan_time_axes(&days(&[0..3]), &[]).unwrap();
        assert!(empty.is_empty());
        assert!(empty.append().is_none());
    }

    #[test]
    fn plan_append_with_gap_after_existing_end() {
        let planner = daily_planner();
        assert!(matches!(
            planner.plan_time_axes(&days(&[0..3]), &days(&[5..7])),
            Err(PlanError::OutOfOrder {
                role: AxisRole::Incoming,
                position: 0
            })
        ));
        // the boundary step is checked after back-fill positions
        assert!(matches!(
            planner.plan_time_axes(&days(&[0..3]), &days(&[1..2, 4..5])),
            Err(PlanError::OutOfOrder {
                role: AxisRole::Incoming,
                position: 1
            })
        ));
        // a planned append keeps the combined axis plannable
        let plan = planner.plan_time_axes(&days(&[0..3]), &days(&[3..5])).unwrap();
        assert_eq!(plan.append().unwrap().index_range, 3..5);
        assert!(planner.plan_time_axes(&days(&[0..5]), &days(&[5..6])).is_ok());
    }

    #[test]
    fn plan_errors() {
        let planner = daily_planner();
        assert!(matches!(
            planner.plan_time_axes(&[], &days(&[0..1])),
            Err(PlanError::EmptyExisting)
        ));
        assert!(matches!(
            planner.plan_time_axes(&days(&[0..3, 4..6]), &days(&[6..7])),
            Err(PlanError::OutOfOrder {
                role: AxisRole::Existing,
                position: 3
            })
        ));
        assert!(matches!(
            planner.plan_time_axes(&days(&[0..5]), &[day(3), day(2)]),
            Err(PlanError::OutOfOrder {
                role: AxisRole::Incoming,
                position: 1
            })
        ));
        assert!(matches!(
            planner.plan_time_axes(&days(&[0..5]), &days(&[5..6, 7..8])),
            Err(PlanError::OutOfOrder {
                role: AxisRole::Incoming,
                position: 1
            })
        ));
        assert!(matches!(
            planner.plan_time_axes(&days(&[0..5]), &days(&[-1..1])),
            Err(PlanError::BeforeExistingStart(_))
        ));
        assert!(matches!(
            planner.plan_time_axes(&days(&[0..5]), &[day(1) + TimeDelta::hours(12)]),
            Err(PlanError::UnalignedTimestamp(_))
        ));
    }

    #[test]
    fn plan_irregular_cadence() {
        let cadence = IrregularCadence::new([TimeDelta::days(3), TimeDelta::days(4)]).unwrap();
        let planner = UpdatePlanner::new(TimeDelta::days(1), TimeAxisValidator::new(Some(cadence)));
        let existing = vec![day(0), day(3), day(6), day(10)];
        let incoming = vec![day(6), day(10), day(13), day(17)];
        let plan = planner.plan_time_axes(&existing, &incoming).unwrap();
        assert_eq!(plan.index_ranges(), vec![2..4, 4..6]);

        // a cadence step missing from the incoming axis splits the back-fill
        let existing = vec![day(0), day(3), day(6), day(10), day(13), day(17)];
        let incoming = vec![day(3), day(6), day(13), day(17), day(20)];
        let plan = planner.plan_time_axes(&existing, &incoming).unwrap();
        assert_eq!(plan.index_ranges(), vec![1..3, 4..6, 6..7]);
        assert_eq!(plan.inserts().count(), 2);
        assert_eq!(plan.edits()[1].incoming_range, 2..4);
        assert_eq!(plan.edits()[1].time_range, (day(13), day(17)));

        // 22 - 17 is not a declared step
        assert!(planner.plan_time_axes(&existing, &[day(22)]).is_err());
    }
}
