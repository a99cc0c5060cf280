//! The configured set of calculators used by every run.

use crate::config::MetricsConfig;
use crate::error::MetricsError;
use crate::metrics::burndown::{BurndownCalculator, BurndownMetric};
use crate::metrics::calendar::CalendarPolicy;
use crate::metrics::classify::{StateClassifier, StateMapping};
use crate::metrics::cycle_time::CycleTimeCalculator;
use crate::metrics::daily::DailyAggregator;

/// Classifier, milestone predicates, calendar and burndown metric, fixed for
/// the lifetime of a service.
#[derive(Debug, Clone, Default)]
pub struct MetricsEngine {
    classifier: StateClassifier,
    cycle_time: CycleTimeCalculator,
    calendar: CalendarPolicy,
    metric: BurndownMetric,
}

impl MetricsEngine {
    #[must_use]
    pub const fn new(
        classifier: StateClassifier,
        cycle_time: CycleTimeCalculator,
        calendar: CalendarPolicy,
        metric: BurndownMetric,
    ) -> Self {
        Self {
            classifier,
            cycle_time,
            calendar,
            metric,
        }
    }

    /// # Errors
    ///
    /// Returns [`MetricsError::Config`] when the calendar section is invalid.
    pub fn from_config(config: &MetricsConfig) -> Result<Self, MetricsError> {
        Ok(Self {
            classifier: StateClassifier::new(StateMapping::from(&config.classification)),
            cycle_time: CycleTimeCalculator::new(
                config.cycle_time.start.clone(),
                config.cycle_time.end.clone(),
            ),
            calendar: CalendarPolicy::from_config(&config.calendar)?,
            metric: config.burndown.metric,
        })
    }

    #[must_use]
    pub const fn classifier(&self) -> &StateClassifier {
        &self.classifier
    }

    #[must_use]
    pub const fn cycle_time(&self) -> &CycleTimeCalculator {
        &self.cycle_time
    }

    #[must_use]
    pub const fn calendar(&self) -> &CalendarPolicy {
        &self.calendar
    }

    #[must_use]
    pub const fn metric(&self) -> BurndownMetric {
        self.metric
    }

    #[must_use]
    pub const fn aggregator(&self) -> DailyAggregator<'_> {
        DailyAggregator::new(&self.calendar, &self.cycle_time)
    }

    #[must_use]
    pub const fn burndown(&self) -> BurndownCalculator<'_> {
        BurndownCalculator::new(&self.calendar, &self.cycle_time, self.metric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::cycle_time::BucketPredicate;
    use crate::model::StateBucket;

    #[test]
    fn from_config_wires_every_section() {
        let mut config = MetricsConfig::default();
        config
            .classification
            .statuses
            .insert("Doing".into(), StateBucket::InProgress);
        config.cycle_time.start = BucketPredicate::Entered(StateBucket::InSprint);
        config.burndown.metric = BurndownMetric::BusinessValue;

        let engine = MetricsEngine::from_config(&config).unwrap();
        assert_eq!(
            engine.classifier().mapping().bucket_for("doing"),
            Some(StateBucket::InProgress)
        );
        assert_eq!(
            engine.cycle_time().start_predicate(),
            &BucketPredicate::Entered(StateBucket::InSprint)
        );
        assert_eq!(engine.metric(), BurndownMetric::BusinessValue);
    }

    #[test]
    fn bad_calendar_is_rejected() {
        let mut config = MetricsConfig::default();
        config.calendar.utc_offset_minutes = 24 * 60;
        assert!(matches!(
            MetricsEngine::from_config(&config),
            Err(MetricsError::Config(_))
        ));
    }
}
