//! As-of classification of work items into [`StateBucket`]s.
//!
//! Tracker statuses are resolved to buckets once per run, producing a
//! [`BucketTimeline`] per item. Classification for a date is then a lookup on
//! the timeline: a binary search for random access, or a forward-only
//! [`TimelineCursor`] when dates are visited in ascending order.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::config::ClassificationConfig;
use crate::error::MetricsError;
use crate::history::TransitionHistory;
use crate::model::{StateBucket, TrackedItem, WorkItem, normalize_status};

/// Tracker status → bucket lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateMapping {
    statuses: HashMap<String, StateBucket>,
    fallback: Option<StateBucket>,
}

impl StateMapping {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_status(mut self, status: &str, bucket: StateBucket) -> Self {
        self.statuses.insert(normalize_status(status), bucket);
        self
    }

    #[must_use]
    pub const fn with_fallback(mut self, bucket: StateBucket) -> Self {
        self.fallback = Some(bucket);
        self
    }

    /// Resolve a status: explicit entry, then a literal bucket name, then the
    /// fallback.
    #[must_use]
    pub fn bucket_for(&self, status: &str) -> Option<StateBucket> {
        let key = normalize_status(status);
        self.statuses
            .get(&key)
            .copied()
            .or_else(|| key.parse().ok())
            .or(self.fallback)
    }
}

impl From<&ClassificationConfig> for StateMapping {
    fn from(config: &ClassificationConfig) -> Self {
        let statuses = config
            .statuses
            .iter()
            .map(|(status, bucket)| (normalize_status(status), *bucket))
            .collect();
        Self {
            statuses,
            fallback: config.fallback,
        }
    }
}

/// One resolved step of an item's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineStep {
    pub at: DateTime<Utc>,
    pub bucket: StateBucket,
}

/// A transition history with every status resolved to its bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketTimeline {
    steps: Vec<TimelineStep>,
}

impl BucketTimeline {
    #[must_use]
    pub fn steps(&self) -> &[TimelineStep] {
        &self.steps
    }

    /// Bucket the item occupied at `as_of`.
    #[must_use]
    pub fn bucket_as_of(&self, as_of: DateTime<Utc>) -> StateBucket {
        let count = self.steps.partition_point(|step| step.at <= as_of);
        count
            .checked_sub(1)
            .map_or(StateBucket::NotCreated, |index| self.steps[index].bucket)
    }

    /// First step whose bucket satisfies `predicate`.
    #[must_use]
    pub fn first_where(&self, predicate: impl Fn(StateBucket) -> bool) -> Option<&TimelineStep> {
        self.steps.iter().find(|step| predicate(step.bucket))
    }

    #[must_use]
    pub const fn cursor(&self) -> TimelineCursor<'_> {
        TimelineCursor {
            steps: self.steps.as_slice(),
            consumed: 0,
            current: StateBucket::NotCreated,
        }
    }
}

/// Forward-only reader over a [`BucketTimeline`].
///
/// Successive `as_of` values must not decrease; each step is visited once, so
/// walking a whole date range costs O(days + steps) per item.
#[derive(Debug, Clone)]
pub struct TimelineCursor<'a> {
    steps: &'a [TimelineStep],
    consumed: usize,
    current: StateBucket,
}

impl TimelineCursor<'_> {
    pub fn advance_to(&mut self, as_of: DateTime<Utc>) -> StateBucket {
        while let Some(step) = self.steps.get(self.consumed) {
            if step.at > as_of {
                break;
            }
            self.current = step.bucket;
            self.consumed += 1;
        }
        self.current
    }
}

/// An input item paired with its resolved timeline, borrowed for one run.
#[derive(Debug, Clone)]
pub struct ResolvedItem<'a> {
    pub item: &'a WorkItem,
    pub timeline: BucketTimeline,
}

/// Maps transition histories to buckets.
#[derive(Debug, Clone, Default)]
pub struct StateClassifier {
    mapping: StateMapping,
}

impl StateClassifier {
    #[must_use]
    pub const fn new(mapping: StateMapping) -> Self {
        Self { mapping }
    }

    #[must_use]
    pub const fn mapping(&self) -> &StateMapping {
        &self.mapping
    }

    /// Bucket of an item at `as_of`, straight from its raw history.
    ///
    /// Only the greatest transition at or before `as_of` is consulted.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::UnmappedStatus`] when that transition's status
    /// has no bucket.
    pub fn classify(
        &self,
        item_id: &str,
        history: &TransitionHistory,
        as_of: DateTime<Utc>,
    ) -> Result<StateBucket, MetricsError> {
        let Some(record) = history.latest_as_of(as_of) else {
            return Ok(StateBucket::NotCreated);
        };
        self.mapping
            .bucket_for(&record.to)
            .ok_or_else(|| MetricsError::UnmappedStatus {
                item_id: item_id.to_string(),
                status: record.to.clone(),
            })
    }

    /// Resolve a whole history.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::UnmappedStatus`] for the first status without a
    /// bucket.
    pub fn timeline(
        &self,
        item_id: &str,
        history: &TransitionHistory,
    ) -> Result<BucketTimeline, MetricsError> {
        let steps = history
            .records()
            .iter()
            .map(|record| {
                self.mapping
                    .bucket_for(&record.to)
                    .map(|bucket| TimelineStep {
                        at: record.at,
                        bucket,
                    })
                    .ok_or_else(|| MetricsError::UnmappedStatus {
                        item_id: item_id.to_string(),
                        status: record.to.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(BucketTimeline { steps })
    }

    /// Validate and resolve every item of a run.
    ///
    /// # Errors
    ///
    /// Fails on the first invalid item or unmapped status.
    pub fn resolve_all<'a, I>(&self, items: I) -> Result<Vec<ResolvedItem<'a>>, MetricsError>
    where
        I: IntoIterator<Item = &'a TrackedItem>,
    {
        items
            .into_iter()
            .map(|tracked| {
                tracked.item.validate()?;
                Ok(ResolvedItem {
                    item: &tracked.item,
                    timeline: self.timeline(tracked.id(), &tracked.transitions)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::TransitionRecord;
    use chrono::{Duration, TimeZone};

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, day, 12, 0, 0).unwrap()
    }

    fn mapping() -> StateMapping {
        StateMapping::new()
            .with_status("New", StateBucket::InBacklog)
            .with_status("Planned", StateBucket::InSprint)
            .with_status("In progress", StateBucket::InProgress)
            .with_status("Ready for test", StateBucket::ReadyForTest)
            .with_status("Closed", StateBucket::Done)
    }

    fn history() -> TransitionHistory {
        TransitionHistory::new(vec![
            TransitionRecord::new(ts(1), "New"),
            TransitionRecord::new(ts(3), "In progress"),
            TransitionRecord::new(ts(6), "Closed"),
        ])
        .unwrap()
    }

    #[test]
    fn mapping_prefers_explicit_then_literal_then_fallback() {
        let mapping = mapping().with_status("done", StateBucket::ReadyForTest);
        assert_eq!(mapping.bucket_for("DONE"), Some(StateBucket::ReadyForTest));
        assert_eq!(mapping.bucket_for("in_sprint"), Some(StateBucket::InSprint));
        assert_eq!(mapping.bucket_for("Blocked"), None);

        let with_fallback = mapping.with_fallback(StateBucket::InBacklog);
        assert_eq!(with_fallback.bucket_for("Blocked"), Some(StateBucket::InBacklog));
    }

    #[test]
    fn empty_history_is_not_created() {
        let classifier = StateClassifier::new(mapping());
        let empty = TransitionHistory::empty();
        assert_eq!(
            classifier.classify("a", &empty, ts(20)).unwrap(),
            StateBucket::NotCreated
        );
    }

    #[test]
    fn before_first_transition_is_not_created() {
        let classifier = StateClassifier::new(mapping());
        assert_eq!(
            classifier
                .classify("a", &history(), ts(1) - Duration::seconds(1))
                .unwrap(),
            StateBucket::NotCreated
        );
    }

    #[test]
    fn classify_uses_greatest_lower_bound() {
        let classifier = StateClassifier::new(mapping());
        let history = history();
        assert_eq!(classifier.classify("a", &history, ts(1)).unwrap(), StateBucket::InBacklog);
        assert_eq!(classifier.classify("a", &history, ts(4)).unwrap(), StateBucket::InProgress);
        assert_eq!(classifier.classify("a", &history, ts(28)).unwrap(), StateBucket::Done);
    }

    #[test]
    fn unmapped_status_is_reported() {
        let classifier = StateClassifier::new(StateMapping::new());
        let err = classifier.classify("us-9", &history(), ts(2)).unwrap_err();
        assert_eq!(
            err,
            MetricsError::UnmappedStatus {
                item_id: "us-9".into(),
                status: "New".into(),
            }
        );
        assert!(classifier.timeline("us-9", &history()).is_err());
    }

    #[test]
    fn timeline_agrees_with_direct_classification() {
        let classifier = StateClassifier::new(mapping());
        let history = history();
        let timeline = classifier.timeline("a", &history).unwrap();
        for day in 1..=10 {
            assert_eq!(
                timeline.bucket_as_of(ts(day)),
                classifier.classify("a", &history, ts(day)).unwrap()
            );
        }
    }

    #[test]
    fn cursor_matches_binary_search() {
        let classifier = StateClassifier::new(mapping());
        let timeline = classifier.timeline("a", &history()).unwrap();
        let mut cursor = timeline.cursor();
        for day in 1..=10 {
            let as_of = ts(day) - Duration::hours(1);
            assert_eq!(cursor.advance_to(as_of), timeline.bucket_as_of(as_of));
        }
    }

    #[test]
    fn first_where_finds_first_matching_step() {
        let classifier = StateClassifier::new(mapping());
        let timeline = classifier.timeline("a", &history()).unwrap();
        let step = timeline
            .first_where(|bucket| bucket >= StateBucket::InProgress)
            .unwrap();
        assert_eq!(step.at, ts(3));
        assert!(timeline.first_where(|bucket| bucket == StateBucket::InSprint).is_none());
    }
}
