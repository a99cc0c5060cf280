use chrono::NaiveDate;
use std::fmt;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    InvalidRange,
    UnmappedStatus,
    InvalidItem,
    InvalidSprint,
    UnknownSprint,
    FetchFailed,
    RunCancelled,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::InvalidRange => "E2001",
            Self::UnmappedStatus => "E2002",
            Self::InvalidItem => "E2003",
            Self::InvalidSprint => "E2004",
            Self::UnknownSprint => "E2005",
            Self::FetchFailed => "E3001",
            Self::RunCancelled => "E4001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Invalid configuration",
            Self::InvalidRange => "Invalid date range",
            Self::UnmappedStatus => "Status not mapped to a bucket",
            Self::InvalidItem => "Invalid work item",
            Self::InvalidSprint => "Invalid sprint",
            Self::UnknownSprint => "Sprint not found",
            Self::FetchFailed => "Snapshot fetch failed",
            Self::RunCancelled => "Run cancelled",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix .sprintlens/config.toml and retry."),
            Self::InvalidRange => Some("Pass a start date on or before the end date."),
            Self::UnmappedStatus => Some(
                "Map the status under [classification.statuses] or set classification.fallback.",
            ),
            Self::InvalidItem => Some("Re-export the snapshot; points must be non-negative numbers."),
            Self::InvalidSprint => Some("Check the sprint's dates and total_points in the snapshot."),
            Self::UnknownSprint => Some("List the sprints present in the snapshot and pick one."),
            Self::FetchFailed => Some("Re-fetch the snapshot from the tracking service."),
            Self::RunCancelled => None,
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// The upstream snapshot fetch could not deliver a consistent snapshot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("snapshot fetch from {origin} failed: {message}")]
pub struct FetchFailure {
    /// Where the snapshot was requested from (file path, URL, ...).
    pub origin: String,
    pub message: String,
}

impl FetchFailure {
    #[must_use]
    pub fn new(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            message: message.into(),
        }
    }
}

/// Errors produced by the metrics engine and its orchestration.
///
/// Data-quality gaps (missing transitions) are never reported here; they are
/// carried as `valid = false` on [`crate::metrics::cycle_time::CycleTimeEntry`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MetricsError {
    #[error("invalid date range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("item '{item_id}' has status '{status}' with no bucket mapping")]
    UnmappedStatus { item_id: String, status: String },

    #[error("item '{item_id}' is invalid: {reason}")]
    InvalidItem { item_id: String, reason: String },

    #[error("sprint '{name}' is invalid: {reason}")]
    InvalidSprint { name: String, reason: String },

    #[error("sprint '{name}' is not part of the snapshot")]
    UnknownSprint { name: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Fetch(#[from] FetchFailure),

    #[error("run was cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl MetricsError {
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::InvalidRange { .. } => ErrorCode::InvalidRange,
            Self::UnmappedStatus { .. } => ErrorCode::UnmappedStatus,
            Self::InvalidItem { .. } => ErrorCode::InvalidItem,
            Self::InvalidSprint { .. } => ErrorCode::InvalidSprint,
            Self::UnknownSprint { .. } => ErrorCode::UnknownSprint,
            Self::Config(_) => ErrorCode::ConfigParseError,
            Self::Fetch(_) => ErrorCode::FetchFailed,
            Self::Cancelled => ErrorCode::RunCancelled,
            Self::Internal(_) => ErrorCode::InternalUnexpected,
        }
    }

    /// Remediation text, falling back to the code's summary.
    #[must_use]
    pub fn suggestion(&self) -> String {
        let code = self.error_code();
        code.hint().unwrap_or_else(|| code.message()).to_string()
    }
}
