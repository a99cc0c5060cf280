//! Ideal and actual remaining-work lines for a sprint.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::error::MetricsError;
use crate::metrics::calendar::{CalendarPolicy, DateRange};
use crate::metrics::classify::ResolvedItem;
use crate::metrics::cycle_time::CycleTimeCalculator;
use crate::model::{SprintSpec, WorkItem};

/// Which item weight the burndown is measured in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BurndownMetric {
    /// Story points, burned when the whole item completes.
    #[default]
    StoryPoints,
    /// Story points split evenly over the item's tasks and burned task by
    /// task. Items without tasks burn on completion.
    TaskPoints,
    BusinessValue,
}

impl BurndownMetric {
    /// Every metric, in chart order.
    pub const ALL: [Self; 3] = [Self::TaskPoints, Self::StoryPoints, Self::BusinessValue];

    /// Weight of one item; a missing business value counts as zero.
    #[must_use]
    pub fn weight(self, item: &WorkItem) -> f64 {
        match self {
            Self::StoryPoints | Self::TaskPoints => item.points,
            Self::BusinessValue => item.business_value.unwrap_or(0.0),
        }
    }

    /// Whether a sprint's `total_points` budget applies to this metric.
    #[must_use]
    pub const fn counts_points(self) -> bool {
        matches!(self, Self::StoryPoints | Self::TaskPoints)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StoryPoints => "story_points",
            Self::TaskPoints => "task_points",
            Self::BusinessValue => "business_value",
        }
    }

    /// Chart title used by human output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::StoryPoints => "User Story",
            Self::TaskPoints => "Task",
            Self::BusinessValue => "Business Value",
        }
    }
}

impl std::fmt::Display for BurndownMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a burndown metric name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown burndown metric '{got}' (expected story_points, task_points or business_value)")]
pub struct ParseMetricError {
    pub got: String,
}

impl std::str::FromStr for BurndownMetric {
    type Err = ParseMetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match crate::model::normalize_status(s).as_str() {
            "story_points" | "points" | "user_story" => Ok(Self::StoryPoints),
            "task_points" | "tasks" | "task" => Ok(Self::TaskPoints),
            "business_value" | "value" => Ok(Self::BusinessValue),
            _ => Err(ParseMetricError { got: s.to_string() }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BurndownPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Ideal and actual lines over the same ascending dates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BurndownSeries {
    pub sprint: String,
    pub metric: BurndownMetric,
    pub total: f64,
    pub ideal: Vec<BurndownPoint>,
    pub actual: Vec<BurndownPoint>,
}

#[derive(Debug, Clone, Copy)]
pub struct BurndownCalculator<'a> {
    calendar: &'a CalendarPolicy,
    cycle_time: &'a CycleTimeCalculator,
    metric: BurndownMetric,
}

impl<'a> BurndownCalculator<'a> {
    #[must_use]
    pub const fn new(
        calendar: &'a CalendarPolicy,
        cycle_time: &'a CycleTimeCalculator,
        metric: BurndownMetric,
    ) -> Self {
        Self {
            calendar,
            cycle_time,
            metric,
        }
    }

    /// The same calculator measuring `metric` instead.
    #[must_use]
    pub const fn with_metric(self, metric: BurndownMetric) -> Self {
        Self { metric, ..self }
    }

    /// Sum of the metric's weight over `items`.
    #[must_use]
    pub fn committed_total(&self, items: &[ResolvedItem<'_>]) -> f64 {
        items
            .iter()
            .map(|resolved| self.metric.weight(resolved.item))
            .sum()
    }

    /// Linear decay from `total` at `start` to zero at `end`.
    ///
    /// Decay steps are calendar days, or working days when the calendar
    /// excludes weekends or holidays; the line holds flat across non-working
    /// days. A span with no decay steps falls back to calendar days, and a
    /// single-day sprint is one point at zero.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::InvalidRange`] when `start > end`.
    pub fn compute_ideal(
        &self,
        total: f64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<BurndownPoint>, MetricsError> {
        let dates = DateRange::new(start, end)?.dates();
        if dates.len() == 1 {
            return Ok(vec![BurndownPoint { date: start, value: 0.0 }]);
        }

        let mut steps = self.decay_steps(&dates, true);
        if steps.last().copied().unwrap_or(0) == 0 {
            warn!(
                %start,
                %end,
                "no working day after sprint start, falling back to calendar-day decay"
            );
            steps = self.decay_steps(&dates, false);
        }

        let span = f64::from(steps.last().copied().unwrap_or(1).max(1));
        Ok(dates
            .into_iter()
            .zip(steps)
            .map(|(date, step)| BurndownPoint {
                date,
                value: (total * (1.0 - f64::from(step) / span)).min(total).max(0.0),
            })
            .collect())
    }

    /// Remaining work per date: `total` minus the weight burned by the end of
    /// that date.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::InvalidRange`] when `start > end`.
    pub fn compute_actual(
        &self,
        items: &[ResolvedItem<'_>],
        total: f64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<BurndownPoint>, MetricsError> {
        self.actual_line(items, total, &DateRange::new(start, end)?, &CancelToken::new())
    }

    /// Full series for one sprint over its committed items.
    ///
    /// The sprint's `total_points` is the total for point-based metrics;
    /// otherwise the total is the committed items' summed weight.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::InvalidSprint`] for a negative or non-finite
    /// total, [`MetricsError::InvalidRange`] for inverted dates, and
    /// [`MetricsError::Cancelled`] if `cancel` fires.
    pub fn compute(
        &self,
        sprint: &SprintSpec,
        items: &[ResolvedItem<'_>],
        cancel: &CancelToken,
    ) -> Result<BurndownSeries, MetricsError> {
        let total = match sprint.total_points {
            Some(budget) if self.metric.counts_points() => budget,
            _ => self.committed_total(items),
        };
        if !total.is_finite() || total < 0.0 {
            return Err(MetricsError::InvalidSprint {
                name: sprint.name.clone(),
                reason: format!("total must be a non-negative number, got {total}"),
            });
        }

        let range = DateRange::new(sprint.start, sprint.end)?;
        let ideal = self.compute_ideal(total, sprint.start, sprint.end)?;
        let actual = self.actual_line(items, total, &range, cancel)?;
        debug!(
            sprint = %sprint.name,
            total,
            days = ideal.len(),
            metric = %self.metric,
            "burndown computed"
        );

        Ok(BurndownSeries {
            sprint: sprint.name.clone(),
            metric: self.metric,
            total,
            ideal,
            actual,
        })
    }

    /// One series per metric of [`BurndownMetric::ALL`], over the same items.
    ///
    /// # Errors
    ///
    /// Same as [`Self::compute`].
    pub fn compute_combined(
        &self,
        sprint: &SprintSpec,
        items: &[ResolvedItem<'_>],
        cancel: &CancelToken,
    ) -> Result<Vec<BurndownSeries>, MetricsError> {
        BurndownMetric::ALL
            .into_iter()
            .map(|metric| self.with_metric(metric).compute(sprint, items, cancel))
            .collect()
    }

    fn actual_line(
        &self,
        items: &[ResolvedItem<'_>],
        total: f64,
        range: &DateRange,
        cancel: &CancelToken,
    ) -> Result<Vec<BurndownPoint>, MetricsError> {
        let burns = self.burn_events(items);
        let mut burned = 0.0;
        let mut pending = burns.iter().peekable();
        let mut line = Vec::with_capacity(range.len());
        for date in range.dates() {
            cancel.check()?;
            let as_of = self.calendar.end_of_day(date);
            while let Some((_, weight)) = pending.next_if(|(at, _)| *at <= as_of) {
                burned += weight;
            }
            line.push(BurndownPoint {
                date,
                value: total - burned,
            });
        }
        Ok(line)
    }

    /// Instants at which weight leaves the remaining line, ascending.
    ///
    /// A task burns its share when it closes or when its item completes,
    /// whichever comes first.
    #[allow(clippy::cast_precision_loss)]
    fn burn_events(&self, items: &[ResolvedItem<'_>]) -> Vec<(DateTime<Utc>, f64)> {
        let mut burns = Vec::new();
        for resolved in items {
            let item = resolved.item;
            let weight = self.metric.weight(item);
            let completed = self.cycle_time.completed_at(&resolved.timeline);
            if self.metric == BurndownMetric::TaskPoints && !item.tasks.is_empty() {
                let share = weight / item.tasks.len() as f64;
                burns.extend(item.tasks.iter().filter_map(|task| {
                    [task.closed_at, completed]
                        .into_iter()
                        .flatten()
                        .min()
                        .map(|at| (at, share))
                }));
            } else if let Some(at) = completed {
                burns.push((at, weight));
            }
        }
        burns.sort_by_key(|(at, _)| *at);
        burns
    }

    /// Cumulative decay step reached on each date; the first date is 0.
    fn decay_steps(&self, dates: &[NaiveDate], working_days_only: bool) -> Vec<u32> {
        let skip_non_working = working_days_only && self.calendar.excludes_non_working_days();
        let mut step = 0_u32;
        dates
            .iter()
            .enumerate()
            .map(|(index, date)| {
                if index > 0 && (!skip_non_working || self.calendar.is_working_day(*date)) {
                    step += 1;
                }
                step
            })
            .collect()
    }
}
