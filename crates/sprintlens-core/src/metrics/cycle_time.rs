//! Cycle/lead time between two lifecycle milestones.
//!
//! A milestone is the first timeline step whose bucket satisfies a
//! [`BucketPredicate`]. Missing milestones never raise errors: the entry is
//! returned with `valid = false` and zero elapsed days.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::metrics::classify::BucketTimeline;
use crate::model::StateBucket;

/// Bucket-membership test selecting a milestone transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketPredicate {
    /// Exactly this bucket.
    Entered(StateBucket),
    /// Any of the listed buckets.
    AnyOf(Vec<StateBucket>),
    /// This bucket or any later one in canonical order.
    Reached(StateBucket),
}

impl BucketPredicate {
    #[must_use]
    pub fn matches(&self, bucket: StateBucket) -> bool {
        match self {
            Self::Entered(target) => bucket == *target,
            Self::AnyOf(targets) => targets.contains(&bucket),
            Self::Reached(target) => bucket >= *target,
        }
    }
}

impl std::fmt::Display for BucketPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Entered(bucket) => write!(f, "entered {bucket}"),
            Self::AnyOf(buckets) => {
                let names: Vec<&str> = buckets.iter().map(|bucket| bucket.as_str()).collect();
                write!(f, "any of [{}]", names.join(", "))
            }
            Self::Reached(bucket) => write!(f, "reached {bucket}"),
        }
    }
}

/// Derived boundaries and elapsed time of one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleTimeEntry {
    pub item_id: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// Whole days between `start` and `end`, truncated; 0 when invalid.
    pub elapsed_days: i64,
    pub valid: bool,
}

impl CycleTimeEntry {
    /// Build an entry, deriving elapsed days and validity from the bounds.
    #[must_use]
    pub fn new(
        item_id: impl Into<String>,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        let elapsed = match (start, end) {
            (Some(start), Some(end)) if end >= start => Some((end - start).num_days()),
            _ => None,
        };

        Self {
            item_id: item_id.into(),
            start,
            end,
            elapsed_days: elapsed.unwrap_or(0),
            valid: elapsed.is_some(),
        }
    }

    /// Elapsed wall time; zero for invalid entries.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        match (self.valid, self.start, self.end) {
            (true, Some(start), Some(end)) => end - start,
            _ => Duration::zero(),
        }
    }
}

/// Computes [`CycleTimeEntry`]s from a pair of milestone predicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleTimeCalculator {
    start: BucketPredicate,
    end: BucketPredicate,
}

impl Default for CycleTimeCalculator {
    fn default() -> Self {
        Self::new(
            BucketPredicate::Reached(StateBucket::InProgress),
            BucketPredicate::Reached(StateBucket::Done),
        )
    }
}

impl CycleTimeCalculator {
    #[must_use]
    pub const fn new(start: BucketPredicate, end: BucketPredicate) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub const fn start_predicate(&self) -> &BucketPredicate {
        &self.start
    }

    #[must_use]
    pub const fn end_predicate(&self) -> &BucketPredicate {
        &self.end
    }

    /// First timestamp satisfying the start predicate.
    #[must_use]
    pub fn started_at(&self, timeline: &BucketTimeline) -> Option<DateTime<Utc>> {
        timeline
            .first_where(|bucket| self.start.matches(bucket))
            .map(|step| step.at)
    }

    /// First timestamp satisfying the end predicate (the completion).
    #[must_use]
    pub fn completed_at(&self, timeline: &BucketTimeline) -> Option<DateTime<Utc>> {
        timeline
            .first_where(|bucket| self.end.matches(bucket))
            .map(|step| step.at)
    }

    #[must_use]
    pub fn compute(&self, item_id: &str, timeline: &BucketTimeline) -> CycleTimeEntry {
        CycleTimeEntry::new(item_id, self.started_at(timeline), self.completed_at(timeline))
    }
}
