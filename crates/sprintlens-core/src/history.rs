//! Append-only transition log of a single work item.
//!
//! A [`TransitionHistory`] is the raw substrate every metric is derived from.
//! Records are kept in insertion order, which must also be chronological
//! order: the constructor rejects a record stamped before its predecessor.
//! Equal timestamps are allowed and keep their insertion order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One status change of a work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// When the transition happened.
    pub at: DateTime<Utc>,
    /// Tracker status before the transition, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Tracker status after the transition.
    pub to: String,
}

impl TransitionRecord {
    #[must_use]
    pub fn new(at: DateTime<Utc>, to: impl Into<String>) -> Self {
        Self {
            at,
            from: None,
            to: to.into(),
        }
    }

    #[must_use]
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }
}

/// Errors raised while building a [`TransitionHistory`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    /// A record is stamped before the record preceding it.
    #[error("transition #{index} at {at} precedes the previous transition at {previous}")]
    OutOfOrder {
        index: usize,
        at: DateTime<Utc>,
        previous: DateTime<Utc>,
    },
}

/// Immutable, chronologically ordered transition log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<TransitionRecord>", into = "Vec<TransitionRecord>")]
pub struct TransitionHistory {
    records: Vec<TransitionRecord>,
}

impl TransitionHistory {
    /// Build a history, checking that timestamps never decrease.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::OutOfOrder`] for the first record stamped
    /// before its predecessor.
    pub fn new(records: Vec<TransitionRecord>) -> Result<Self, HistoryError> {
        if let Some(index) = records.windows(2).position(|pair| pair[1].at < pair[0].at) {
            let previous = records[index].at;
            let at = records[index + 1].at;
            return Err(HistoryError::OutOfOrder {
                index: index + 1,
                at,
                previous,
            });
        }
        Ok(Self { records })
    }

    /// A history with no transitions (the item never entered the tracker).
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    #[must_use]
    pub fn records(&self) -> &[TransitionRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn first(&self) -> Option<&TransitionRecord> {
        self.records.first()
    }

    /// Number of records stamped at or before `as_of`.
    ///
    /// Binary search; relies on the ordering invariant.
    #[must_use]
    pub fn count_as_of(&self, as_of: DateTime<Utc>) -> usize {
        self.records.partition_point(|record| record.at <= as_of)
    }

    /// The last record stamped at or before `as_of` (greatest lower bound).
    #[must_use]
    pub fn latest_as_of(&self, as_of: DateTime<Utc>) -> Option<&TransitionRecord> {
        self.count_as_of(as_of)
            .checked_sub(1)
            .map(|index| &self.records[index])
    }
}

impl TryFrom<Vec<TransitionRecord>> for TransitionHistory {
    type Error = HistoryError;

    fn try_from(records: Vec<TransitionRecord>) -> Result<Self, Self::Error> {
        Self::new(records)
    }
}

impl From<TransitionHistory> for Vec<TransitionRecord> {
    fn from(history: TransitionHistory) -> Self {
        history.records
    }
}
