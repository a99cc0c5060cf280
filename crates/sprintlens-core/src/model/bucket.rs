use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The six canonical lifecycle buckets, in canonical (chronological) order.
///
/// Tracker statuses are project-specific; they are mapped onto these buckets
/// through [`crate::metrics::classify::StateMapping`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateBucket {
    NotCreated,
    InBacklog,
    InSprint,
    InProgress,
    ReadyForTest,
    Done,
}

impl StateBucket {
    /// All buckets in canonical order.
    pub const ALL: [Self; 6] = [
        Self::NotCreated,
        Self::InBacklog,
        Self::InSprint,
        Self::InProgress,
        Self::ReadyForTest,
        Self::Done,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotCreated => "not_created",
            Self::InBacklog => "in_backlog",
            Self::InSprint => "in_sprint",
            Self::InProgress => "in_progress",
            Self::ReadyForTest => "ready_for_test",
            Self::Done => "done",
        }
    }

    /// Human label used for chart legends.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::NotCreated => "Not created",
            Self::InBacklog => "In backlog",
            Self::InSprint => "In sprint",
            Self::InProgress => "In progress",
            Self::ReadyForTest => "Ready for test",
            Self::Done => "Done",
        }
    }

    /// Position in canonical order (`NotCreated` = 0).
    #[must_use]
    pub const fn rank(self) -> u8 {
        self as u8
    }
}

/// Error returned when parsing a bucket name from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseBucketError {
    pub got: String,
}

impl fmt::Display for ParseBucketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid bucket: '{}' (expected one of not_created, in_backlog, in_sprint, \
             in_progress, ready_for_test, done)",
            self.got
        )
    }
}

impl std::error::Error for ParseBucketError {}

impl fmt::Display for StateBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize a tracker status or bucket name for lookup.
///
/// Trims, lowercases, and collapses runs of whitespace, `-` and `_` into a
/// single `_`, so `"In Progress"`, `"in-progress"` and `"IN_PROGRESS"` all
/// compare equal.
#[must_use]
pub fn normalize_status(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_sep = false;
    for ch in input.trim().chars() {
        if ch.is_whitespace() || ch == '-' || ch == '_' {
            pending_sep = true;
            continue;
        }
        if pending_sep && !out.is_empty() {
            out.push('_');
        }
        pending_sep = false;
        out.extend(ch.to_lowercase());
    }
    out
}

impl FromStr for StateBucket {
    type Err = ParseBucketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_status(s);
        Self::ALL
            .into_iter()
            .find(|bucket| bucket.as_str() == normalized)
            .ok_or_else(|| ParseBucketError { got: s.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::{StateBucket, normalize_status};
    use std::str::FromStr;

    #[test]
    fn canonical_order_matches_lifecycle() {
        let mut sorted = StateBucket::ALL;
        sorted.sort();
        assert_eq!(sorted, StateBucket::ALL);
        assert!(StateBucket::NotCreated < StateBucket::Done);
        assert_eq!(StateBucket::Done.rank(), 5);
    }

    #[test]
    fn json_uses_snake_case() {
        assert_eq!(
            serde_json::to_string(&StateBucket::ReadyForTest).unwrap(),
            "\"ready_for_test\""
        );
        assert_eq!(
            serde_json::from_str::<StateBucket>("\"in_sprint\"").unwrap(),
            StateBucket::InSprint
        );
    }

    #[test]
    fn display_parse_roundtrips() {
        for bucket in StateBucket::ALL {
            assert_eq!(StateBucket::from_str(&bucket.to_string()).unwrap(), bucket);
        }
    }

    #[test]
    fn parse_is_lenient_about_separators_and_case() {
        assert_eq!(
            StateBucket::from_str("In Progress").unwrap(),
            StateBucket::InProgress
        );
        assert_eq!(
            StateBucket::from_str(" ready-for-test ").unwrap(),
            StateBucket::ReadyForTest
        );
        assert!(StateBucket::from_str("blocked").is_err());
    }

    #[test]
    fn normalize_collapses_separators() {
        assert_eq!(normalize_status("  Ready  for -- QA "), "ready_for_qa");
        assert_eq!(normalize_status("__done__"), "done");
        assert_eq!(normalize_status(""), "");
    }
}
