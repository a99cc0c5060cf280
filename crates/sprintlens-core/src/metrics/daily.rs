//! Per-date bucket tallies over a date range.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::cancel::CancelToken;
use crate::error::MetricsError;
use crate::metrics::calendar::{CalendarPolicy, DateRange};
use crate::metrics::classify::ResolvedItem;
use crate::metrics::cycle_time::{CycleTimeCalculator, CycleTimeEntry};
use crate::model::StateBucket;

/// Bucket membership of every item as of the end of one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateBucketStats {
    pub date: NaiveDate,
    /// Item ids per bucket. Every bucket is present, possibly empty.
    pub members: BTreeMap<StateBucket, Vec<String>>,
}

impl DateBucketStats {
    fn new(date: NaiveDate) -> Self {
        Self {
            date,
            members: StateBucket::ALL
                .iter()
                .map(|bucket| (*bucket, Vec::new()))
                .collect(),
        }
    }

    #[must_use]
    pub fn count(&self, bucket: StateBucket) -> usize {
        self.members.get(&bucket).map_or(0, Vec::len)
    }

    #[must_use]
    pub fn ids(&self, bucket: StateBucket) -> &[String] {
        self.members.get(&bucket).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.members.values().map(Vec::len).sum()
    }
}

/// Output of one aggregation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DailyReport {
    /// One entry per date of the range, ascending.
    pub days: Vec<DateBucketStats>,
    /// Entries for items whose completion falls inside the range, in input
    /// order.
    pub lead_times: Vec<CycleTimeEntry>,
}

/// Walks a date range once, classifying every item per date.
#[derive(Debug, Clone, Copy)]
pub struct DailyAggregator<'a> {
    calendar: &'a CalendarPolicy,
    cycle_time: &'a CycleTimeCalculator,
}

impl<'a> DailyAggregator<'a> {
    #[must_use]
    pub const fn new(calendar: &'a CalendarPolicy, cycle_time: &'a CycleTimeCalculator) -> Self {
        Self {
            calendar,
            cycle_time,
        }
    }

    /// Tally bucket members for every date of `range`.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Cancelled`] if `cancel` fires between dates.
    pub fn aggregate(
        &self,
        items: &[ResolvedItem<'_>],
        range: &DateRange,
        cancel: &CancelToken,
    ) -> Result<DailyReport, MetricsError> {
        let dates = range.dates();
        let mut cursors: Vec<_> = items.iter().map(|resolved| resolved.timeline.cursor()).collect();
        let mut days = Vec::with_capacity(dates.len());

        for date in dates {
            cancel.check()?;
            let as_of = self.calendar.end_of_day(date);
            let mut stats = DateBucketStats::new(date);
            for (resolved, cursor) in items.iter().zip(cursors.iter_mut()) {
                let bucket = cursor.advance_to(as_of);
                stats
                    .members
                    .entry(bucket)
                    .or_default()
                    .push(resolved.item.id.clone());
            }
            days.push(stats);
        }

        let lead_times = self.completed_in(items, range);
        debug!(
            days = days.len(),
            items = items.len(),
            completed = lead_times.len(),
            "daily aggregation finished"
        );

        Ok(DailyReport { days, lead_times })
    }

    /// Cycle-time entries for items completed on a date inside `range`.
    #[must_use]
    pub fn completed_in(&self, items: &[ResolvedItem<'_>], range: &DateRange) -> Vec<CycleTimeEntry> {
        items
            .iter()
            .filter(|resolved| {
                self.cycle_time
                    .completed_at(&resolved.timeline)
                    .is_some_and(|end| range.contains(self.calendar.date_of(end)))
            })
            .map(|resolved| self.cycle_time.compute(&resolved.item.id, &resolved.timeline))
            .collect()
    }
}
