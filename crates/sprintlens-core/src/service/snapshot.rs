//! The pure pipeline from a fetched snapshot to published metrics.

use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::error::MetricsError;
use crate::metrics::burndown::BurndownSeries;
use crate::metrics::calendar::DateRange;
use crate::metrics::classify::ResolvedItem;
use crate::metrics::daily::DailyReport;
use crate::metrics::engine::MetricsEngine;
use crate::metrics::summary::LeadTimeSummary;
use crate::metrics::view::{LeadTimePoint, lead_time_view};
use crate::model::ItemSnapshot;
use crate::timing;

/// What a run computes metrics for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Subject {
    /// A sprint of the snapshot: burndown plus daily and lead-time metrics
    /// over its dates.
    Sprint { name: String },
    /// An explicit inclusive date range: daily and lead-time metrics only.
    Range { start: NaiveDate, end: NaiveDate },
}

impl Subject {
    #[must_use]
    pub fn sprint(name: impl Into<String>) -> Self {
        Self::Sprint { name: name.into() }
    }

    #[must_use]
    pub const fn range(start: NaiveDate, end: NaiveDate) -> Self {
        Self::Range { start, end }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sprint { name } => write!(f, "sprint {name}"),
            Self::Range { start, end } => write!(f, "{start}..={end}"),
        }
    }
}

/// One completed run's results. Never mutated after publication.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub subject: Subject,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Burndown in the configured metric.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub burndown: Option<BurndownSeries>,
    /// Burndown in every metric, for sprint subjects.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub combined: Vec<BurndownSeries>,
    pub daily: DailyReport,
    pub lead_time_view: Vec<LeadTimePoint>,
    pub lead_time_summary: LeadTimeSummary,
    /// BLAKE3 hex digest of the subject and fetched snapshot.
    pub input_digest: String,
}

/// Compute every metric for `subject` from `snapshot`.
///
/// Daily tallies and lead times cover every item of the snapshot; the
/// burndown covers the sprint's committed items only.
///
/// # Errors
///
/// Fails with [`MetricsError::UnknownSprint`], [`MetricsError::InvalidRange`],
/// [`MetricsError::InvalidItem`], [`MetricsError::UnmappedStatus`] or
/// [`MetricsError::InvalidSprint`] on malformed input, and with
/// [`MetricsError::Cancelled`] when `cancel` fires.
pub fn compute_snapshot(
    engine: &MetricsEngine,
    subject: &Subject,
    snapshot: &ItemSnapshot,
    cancel: &CancelToken,
) -> Result<MetricsSnapshot, MetricsError> {
    let (range, sprint) = match subject {
        Subject::Sprint { name } => {
            let sprint = snapshot
                .sprint(name)
                .ok_or_else(|| MetricsError::UnknownSprint { name: name.clone() })?;
            (DateRange::new(sprint.start, sprint.end)?, Some(sprint))
        }
        Subject::Range { start, end } => (DateRange::new(*start, *end)?, None),
    };

    let resolved = timing::timed("metrics.resolve", || {
        engine.classifier().resolve_all(&snapshot.items)
    })?;
    debug!(%subject, items = resolved.len(), days = range.len(), "items resolved");

    let (burndown, combined) = match sprint {
        Some(sprint) => {
            let committed_ids: HashSet<&str> = snapshot
                .committed_to(&sprint.name)
                .into_iter()
                .map(|tracked| tracked.id())
                .collect();
            let committed: Vec<ResolvedItem<'_>> = resolved
                .iter()
                .filter(|resolved| committed_ids.contains(resolved.item.id.as_str()))
                .cloned()
                .collect();
            if committed.is_empty() {
                warn!(sprint = %sprint.name, "sprint has no committed items");
            }
            let calculator = engine.burndown();
            let primary = timing::timed("metrics.burndown", || {
                calculator.compute(sprint, &committed, cancel)
            })?;
            let combined = timing::timed("metrics.burndown_combined", || {
                calculator.compute_combined(sprint, &committed, cancel)
            })?;
            (Some(primary), combined)
        }
        None => (None, Vec::new()),
    };

    let daily = timing::timed("metrics.daily", || {
        engine.aggregator().aggregate(&resolved, &range, cancel)
    })?;

    let view = lead_time_view(
        &daily.lead_times,
        resolved.iter().map(|resolved| resolved.item),
        &range,
        engine.calendar(),
    );
    let lead_time_summary = LeadTimeSummary::from_entries(&daily.lead_times);
    if lead_time_summary.missing > 0 {
        warn!(
            %subject,
            missing = lead_time_summary.missing,
            "completed items without a usable start transition"
        );
    }

    let (Some(start), Some(end)) = (range.start(), range.end()) else {
        return Err(MetricsError::Internal(format!(
            "empty date range for {subject}"
        )));
    };

    Ok(MetricsSnapshot {
        subject: subject.clone(),
        start,
        end,
        burndown,
        combined,
        daily,
        lead_time_view: view,
        lead_time_summary,
        input_digest: input_digest(subject, snapshot)?,
    })
}

/// BLAKE3 over the canonical JSON of the subject and the fetched snapshot.
///
/// # Errors
///
/// Returns [`MetricsError::Internal`] if the input cannot be serialized.
pub fn input_digest(subject: &Subject, snapshot: &ItemSnapshot) -> Result<String, MetricsError> {
    let bytes = serde_json::to_vec(&(subject, snapshot))
        .map_err(|err| MetricsError::Internal(format!("failed to encode run input: {err}")))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}
