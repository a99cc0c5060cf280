//! Lead-time statistics over cycle-time entries.

use serde::Serialize;

use crate::metrics::cycle_time::CycleTimeEntry;

/// Distribution of elapsed days over valid entries.
///
/// Invalid entries (missing or inverted milestones) are only counted in
/// `missing`; they never move the averages.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LeadTimeSummary {
    pub count: usize,
    pub missing: usize,
    pub mean_days: Option<f64>,
    pub median_days: Option<i64>,
    pub p85_days: Option<i64>,
    pub max_days: Option<i64>,
}

impl LeadTimeSummary {
    #[must_use]
    pub fn from_entries(entries: &[CycleTimeEntry]) -> Self {
        let mut elapsed: Vec<i64> = entries
            .iter()
            .filter(|entry| entry.valid)
            .map(|entry| entry.elapsed_days)
            .collect();
        elapsed.sort_unstable();

        let missing = entries.len() - elapsed.len();
        #[allow(clippy::cast_precision_loss)]
        let mean_days = (!elapsed.is_empty())
            .then(|| elapsed.iter().sum::<i64>() as f64 / elapsed.len() as f64);

        Self {
            count: elapsed.len(),
            missing,
            mean_days,
            median_days: nearest_rank(&elapsed, 50),
            p85_days: nearest_rank(&elapsed, 85),
            max_days: elapsed.last().copied(),
        }
    }
}

/// Nearest-rank percentile of an ascending slice.
#[must_use]
pub fn nearest_rank<T: Copy>(sorted: &[T], pct: u32) -> Option<T> {
    if sorted.is_empty() {
        return None;
    }

    let pct_usize = usize::try_from(pct).unwrap_or(100).min(100);
    let rank = pct_usize.saturating_mul(sorted.len()).saturating_add(99) / 100;
    let index = rank.saturating_sub(1).min(sorted.len().saturating_sub(1));

    Some(sorted[index])
}
