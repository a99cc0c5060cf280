//! Calendar dates, inclusive date ranges, and the working-day policy.

use std::collections::BTreeSet;

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc, Weekday,
};
use serde::Serialize;

use crate::config::CalendarConfig;
use crate::error::MetricsError;

/// Inclusive range of calendar dates. May be empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    bounds: Option<(NaiveDate, NaiveDate)>,
}

impl DateRange {
    /// Range covering `start..=end`.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::InvalidRange`] when `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, MetricsError> {
        if start > end {
            return Err(MetricsError::InvalidRange { start, end });
        }
        Ok(Self {
            bounds: Some((start, end)),
        })
    }

    #[must_use]
    pub const fn empty() -> Self {
        Self { bounds: None }
    }

    #[must_use]
    pub fn start(&self) -> Option<NaiveDate> {
        self.bounds.map(|(start, _)| start)
    }

    #[must_use]
    pub fn end(&self) -> Option<NaiveDate> {
        self.bounds.map(|(_, end)| end)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bounds.is_none()
    }

    /// Number of dates in the range.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bounds.map_or(0, |(start, end)| {
            usize::try_from((end - start).num_days() + 1).unwrap_or(0)
        })
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.bounds
            .is_some_and(|(start, end)| start <= date && date <= end)
    }

    /// Every date in ascending order, both endpoints included.
    #[must_use]
    pub fn dates(&self) -> Vec<NaiveDate> {
        let Some((start, end)) = self.bounds else {
            return Vec::new();
        };
        start.iter_days().take_while(|date| *date <= end).collect()
    }
}

/// How calendar dates relate to timestamps and which days count as working
/// days for the ideal burndown line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarPolicy {
    exclude_weekends: bool,
    holidays: BTreeSet<NaiveDate>,
    offset: FixedOffset,
}

impl Default for CalendarPolicy {
    fn default() -> Self {
        Self {
            exclude_weekends: false,
            holidays: BTreeSet::new(),
            offset: Utc.fix(),
        }
    }
}

impl CalendarPolicy {
    /// Build the policy from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Config`] when the UTC offset is out of range.
    pub fn from_config(config: &CalendarConfig) -> Result<Self, MetricsError> {
        let offset = config
            .utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                MetricsError::Config(format!(
                    "calendar.utc_offset_minutes {} is outside -1439..=1439",
                    config.utc_offset_minutes
                ))
            })?;

        Ok(Self {
            exclude_weekends: config.exclude_weekends,
            holidays: config.holidays.iter().copied().collect(),
            offset,
        })
    }

    #[must_use]
    pub fn excludes_non_working_days(&self) -> bool {
        self.exclude_weekends || !self.holidays.is_empty()
    }

    /// Whether the ideal line burns on `date`.
    #[must_use]
    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        if self.holidays.contains(&date) {
            return false;
        }
        !(self.exclude_weekends && matches!(date.weekday(), Weekday::Sat | Weekday::Sun))
    }

    /// Calendar date of `at` in the policy's offset.
    #[must_use]
    pub fn date_of(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    /// Last instant of `date` in the policy's offset; the as-of point for
    /// that date's classification.
    #[must_use]
    pub fn end_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        let next_midnight = date.and_time(NaiveTime::MIN) + Duration::days(1);
        let utc_naive =
            next_midnight - Duration::seconds(i64::from(self.offset.local_minus_utc()));
        Utc.from_utc_datetime(&utc_naive) - Duration::nanoseconds(1)
    }
}
