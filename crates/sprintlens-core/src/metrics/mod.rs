//! Time-bucketed metrics derived from transition histories.

pub mod burndown;
pub mod calendar;
pub mod classify;
pub mod cycle_time;
pub mod daily;
pub mod engine;
pub mod summary;
pub mod view;

pub use burndown::{
    BurndownCalculator, BurndownMetric, BurndownPoint, BurndownSeries, ParseMetricError,
};
pub use calendar::{CalendarPolicy, DateRange};
pub use classify::{BucketTimeline, ResolvedItem, StateClassifier, StateMapping, TimelineCursor};
pub use cycle_time::{BucketPredicate, CycleTimeCalculator, CycleTimeEntry};
pub use daily::{DailyAggregator, DailyReport, DateBucketStats};
pub use engine::MetricsEngine;
pub use summary::LeadTimeSummary;
pub use view::{ChartPoint, LeadTimePoint, date_label, lead_time_view};
