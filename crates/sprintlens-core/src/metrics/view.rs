//! Chart-ready shapes handed to the presentation layer.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::metrics::burndown::{BurndownPoint, BurndownSeries};
use crate::metrics::calendar::{CalendarPolicy, DateRange};
use crate::metrics::cycle_time::CycleTimeEntry;
use crate::metrics::daily::DailyReport;
use crate::model::{StateBucket, WorkItem};

/// Category-axis label for a date, e.g. `Jan 05`.
#[must_use]
pub fn date_label(date: NaiveDate) -> String {
    date.format("%b %d").to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub label: String,
    pub value: f64,
}

impl From<&BurndownPoint> for ChartPoint {
    fn from(point: &BurndownPoint) -> Self {
        Self {
            label: date_label(point.date),
            value: point.value,
        }
    }
}

impl BurndownSeries {
    #[must_use]
    pub fn ideal_points(&self) -> Vec<ChartPoint> {
        self.ideal.iter().map(ChartPoint::from).collect()
    }

    #[must_use]
    pub fn actual_points(&self) -> Vec<ChartPoint> {
        self.actual.iter().map(ChartPoint::from).collect()
    }
}

impl DailyReport {
    /// Item counts in `bucket`, one point per date.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn series(&self, bucket: StateBucket) -> Vec<ChartPoint> {
        self.days
            .iter()
            .map(|day| ChartPoint {
                label: date_label(day.date),
                value: day.count(bucket) as f64,
            })
            .collect()
    }
}

/// One bar of the per-story lead-time chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeadTimePoint {
    pub label: String,
    pub date: NaiveDate,
    /// `None` for the per-date placeholders.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    pub elapsed_days: i64,
    pub valid: bool,
    /// Tooltip text; only present for valid entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Build the per-story lead-time view for `range`.
///
/// Every date of the range gets one invalid placeholder so the category axis
/// is continuous. Entries are ordered by completion date, placeholders first
/// within a date, then by completion instant; ties keep input order.
#[must_use]
pub fn lead_time_view<'a>(
    entries: &[CycleTimeEntry],
    items: impl IntoIterator<Item = &'a WorkItem>,
    range: &DateRange,
    calendar: &CalendarPolicy,
) -> Vec<LeadTimePoint> {
    let by_id: HashMap<&str, &WorkItem> = items
        .into_iter()
        .map(|item| (item.id.as_str(), item))
        .collect();

    let mut keyed: Vec<_> = range
        .dates()
        .into_iter()
        .map(|date| {
            let point = LeadTimePoint {
                label: date_label(date),
                date,
                item_id: None,
                elapsed_days: 0,
                valid: false,
                description: None,
            };
            ((date, false, None), point)
        })
        .collect();

    for entry in entries {
        let Some(end) = entry.end else {
            continue;
        };
        let date = calendar.date_of(end);
        let description = entry.valid.then(|| {
            describe(
                entry,
                by_id.get(entry.item_id.as_str()).copied(),
                calendar,
            )
        });
        let point = LeadTimePoint {
            label: date_label(date),
            date,
            item_id: Some(entry.item_id.clone()),
            elapsed_days: entry.elapsed_days,
            valid: entry.valid,
            description,
        };
        keyed.push(((date, true, Some(end)), point));
    }

    keyed.sort_by(|(left, _), (right, _)| left.cmp(right));
    keyed.into_iter().map(|(_, point)| point).collect()
}

fn describe(entry: &CycleTimeEntry, item: Option<&WorkItem>, calendar: &CalendarPolicy) -> String {
    let heading = item.map_or_else(
        || entry.item_id.clone(),
        |item| format!("{} (#{})", item.title, item.reference),
    );
    let on = |at: Option<chrono::DateTime<chrono::Utc>>| {
        at.map_or_else(|| "-".to_string(), |at| calendar.date_of(at).to_string())
    };
    format!(
        "{heading}\nStarted on: {}\nCompleted on: {}\nLead Time: {}",
        on(entry.start),
        on(entry.end),
        entry.elapsed_days
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn labels_use_short_month_and_day() {
        assert_eq!(date_label(d(5)), "Jan 05");
    }

    #[test]
    fn view_pads_every_date_and_sorts_by_end() {
        let items = vec![
            WorkItem::new("late", "Late story", 3.0).with_reference(12),
            WorkItem::new("early", "Early story", 1.0).with_reference(4),
        ];
        let entries = vec![
            CycleTimeEntry::new("late", Some(ts(1, 9)), Some(ts(3, 16))),
            CycleTimeEntry::new("early", Some(ts(1, 9)), Some(ts(2, 10))),
        ];
        let range = DateRange::new(d(1), d(3)).unwrap();
        let view = lead_time_view(&entries, &items, &range, &CalendarPolicy::default());

        let shape: Vec<_> = view
            .iter()
            .map(|point| (point.label.as_str(), point.item_id.as_deref()))
            .collect();
        assert_eq!(
            shape,
            vec![
                ("Jan 01", None),
                ("Jan 02", None),
                ("Jan 02", Some("early")),
                ("Jan 03", None),
                ("Jan 03", Some("late")),
            ]
        );

        let late = &view[4];
        assert!(late.valid);
        assert_eq!(late.elapsed_days, 2);
        assert_eq!(
            late.description.as_deref(),
            Some("Late story (#12)\nStarted on: 2024-01-01\nCompleted on: 2024-01-03\nLead Time: 2")
        );
        assert!(view[0].description.is_none());
    }

    #[test]
    fn invalid_completed_entries_have_no_description() {
        // Completed without ever starting.
        let entries = vec![CycleTimeEntry::new("x", None, Some(ts(2, 9)))];
        let range = DateRange::new(d(2), d(2)).unwrap();
        let view = lead_time_view(&entries, std::iter::empty(), &range, &CalendarPolicy::default());

        assert_eq!(view.len(), 2);
        assert_eq!(view[1].item_id.as_deref(), Some("x"));
        assert!(!view[1].valid);
        assert_eq!(view[1].elapsed_days, 0);
        assert!(view[1].description.is_none());
    }
}
