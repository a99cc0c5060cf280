use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MetricsError;
use crate::history::TransitionHistory;

/// A work item as fetched from the tracking service. Never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    /// Tracker reference number (`#123`).
    #[serde(default)]
    pub reference: u64,
    pub title: String,
    pub points: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Name of the sprint this item is committed to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sprint: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<WorkTask>,
}

/// A sub-task of a work item. Closing it burns an equal share of the item's
/// points on the task burndown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkTask {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
}

impl WorkTask {
    #[must_use]
    pub fn new(id: impl Into<String>, closed_at: Option<DateTime<Utc>>) -> Self {
        Self {
            id: id.into(),
            closed_at,
        }
    }
}

impl WorkItem {
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>, points: f64) -> Self {
        Self {
            id: id.into(),
            reference: 0,
            title: title.into(),
            points,
            business_value: None,
            owner: None,
            sprint: None,
            tasks: Vec::new(),
        }
    }

    #[must_use]
    pub const fn with_reference(mut self, reference: u64) -> Self {
        self.reference = reference;
        self
    }

    #[must_use]
    pub fn in_sprint(mut self, sprint: impl Into<String>) -> Self {
        self.sprint = Some(sprint.into());
        self
    }

    #[must_use]
    pub const fn with_business_value(mut self, value: f64) -> Self {
        self.business_value = Some(value);
        self
    }

    #[must_use]
    pub fn with_task(mut self, task: WorkTask) -> Self {
        self.tasks.push(task);
        self
    }

    /// Check the fields every metric relies on.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::InvalidItem`] for an empty id or a negative /
    /// non-finite weight.
    pub fn validate(&self) -> Result<(), MetricsError> {
        let invalid = |reason: String| MetricsError::InvalidItem {
            item_id: self.id.clone(),
            reason,
        };

        if self.id.trim().is_empty() {
            return Err(invalid("id must not be empty".to_string()));
        }
        if !self.points.is_finite() || self.points < 0.0 {
            return Err(invalid(format!(
                "points must be a non-negative number, got {}",
                self.points
            )));
        }
        if let Some(value) = self.business_value
            && (!value.is_finite() || value < 0.0)
        {
            return Err(invalid(format!(
                "business_value must be a non-negative number, got {value}"
            )));
        }
        if self.tasks.iter().any(|task| task.id.trim().is_empty()) {
            return Err(invalid("task ids must not be empty".to_string()));
        }
        Ok(())
    }
}

/// A work item together with its transition log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedItem {
    #[serde(flatten)]
    pub item: WorkItem,
    #[serde(default)]
    pub transitions: TransitionHistory,
}

impl TrackedItem {
    #[must_use]
    pub const fn new(item: WorkItem, transitions: TransitionHistory) -> Self {
        Self { item, transitions }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.item.id
    }
}

/// A sprint's calendar span and optional committed point budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SprintSpec {
    pub name: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Committed story-point budget for the point-based burndowns; defaults
    /// to the sum of the committed items' points. Business value is always
    /// summed from the items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_points: Option<f64>,
}

/// Everything fetched for one project, consistent within one fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub sprints: Vec<SprintSpec>,
    #[serde(default)]
    pub items: Vec<TrackedItem>,
}

impl ItemSnapshot {
    #[must_use]
    pub fn new(project: impl Into<String>, items: Vec<TrackedItem>) -> Self {
        Self {
            project: project.into(),
            sprints: Vec::new(),
            items,
        }
    }

    #[must_use]
    pub fn with_sprint(mut self, sprint: SprintSpec) -> Self {
        self.sprints.push(sprint);
        self
    }

    #[must_use]
    pub fn sprint(&self, name: &str) -> Option<&SprintSpec> {
        self.sprints.iter().find(|sprint| sprint.name == name)
    }

    /// Items committed to `sprint`.
    ///
    /// When no item carries sprint membership at all, the snapshot is treated
    /// as a single-sprint export and every item is committed.
    #[must_use]
    pub fn committed_to(&self, sprint: &str) -> Vec<&TrackedItem> {
        let any_membership = self.items.iter().any(|tracked| tracked.item.sprint.is_some());
        self.items
            .iter()
            .filter(|tracked| !any_membership || tracked.item.sprint.as_deref() == Some(sprint))
            .collect()
    }

    /// Validate every item.
    ///
    /// # Errors
    ///
    /// Returns the first [`MetricsError::InvalidItem`] found.
    pub fn validate(&self) -> Result<(), MetricsError> {
        self.items.iter().try_for_each(|tracked| tracked.item.validate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_json() -> &'static str {
        r#"{
            "project": "demo",
            "sprints": [{"name": "S1", "start": "2024-01-01", "end": "2024-01-10", "total_points": 20}],
            "items": [
                {"id": "us-1", "reference": 7, "title": "Login", "points": 5, "sprint": "S1",
                 "transitions": [{"at": "2024-01-02T09:00:00Z", "to": "New"}]},
                {"id": "us-2", "title": "Logout", "points": 3}
            ]
        }"#
    }

    #[test]
    fn snapshot_parses_with_flattened_items() {
        let snapshot: ItemSnapshot = serde_json::from_str(snapshot_json()).unwrap();
        assert_eq!(snapshot.project, "demo");
        assert_eq!(snapshot.items.len(), 2);
        assert_eq!(snapshot.items[0].item.reference, 7);
        assert_eq!(snapshot.items[0].transitions.len(), 1);
        assert!(snapshot.items[1].transitions.is_empty());
        assert_eq!(snapshot.sprint("S1").unwrap().total_points, Some(20.0));
        assert!(snapshot.sprint("S2").is_none());
    }

    #[test]
    fn tasks_parse_with_optional_close_time() {
        let json = r#"{"items": [{"id": "us-1", "title": "Login", "points": 4, "tasks": [
            {"id": "t1", "closed_at": "2024-01-03T10:00:00Z"},
            {"id": "t2"}
        ]}]}"#;
        let snapshot: ItemSnapshot = serde_json::from_str(json).unwrap();
        let tasks = &snapshot.items[0].item.tasks;
        assert_eq!(tasks.len(), 2);
        assert!(tasks[0].closed_at.is_some());
        assert_eq!(tasks[1], WorkTask::new("t2", None));

        // Items without tasks serialize exactly as before.
        let plain = serde_json::to_value(WorkItem::new("a", "A", 1.0)).unwrap();
        assert!(plain.get("tasks").is_none());
    }

    #[test]
    fn missing_points_is_a_parse_error() {
        let json = r#"{"items": [{"id": "x", "title": "no points"}]}"#;
        assert!(serde_json::from_str::<ItemSnapshot>(json).is_err());
    }

    #[test]
    fn committed_to_filters_by_membership() {
        let snapshot: ItemSnapshot = serde_json::from_str(snapshot_json()).unwrap();
        let committed = snapshot.committed_to("S1");
        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0].id(), "us-1");
    }

    #[test]
    fn committed_to_takes_everything_without_membership() {
        let snapshot = ItemSnapshot::new(
            "demo",
            vec![
                TrackedItem::new(WorkItem::new("a", "A", 1.0), TransitionHistory::empty()),
                TrackedItem::new(WorkItem::new("b", "B", 2.0), TransitionHistory::empty()),
            ],
        );
        assert_eq!(snapshot.committed_to("anything").len(), 2);
    }

    #[test]
    fn validate_rejects_bad_weights() {
        assert!(WorkItem::new("a", "A", 1.5).validate().is_ok());
        assert!(matches!(
            WorkItem::new("a", "A", -1.0).validate(),
            Err(MetricsError::InvalidItem { .. })
        ));
        assert!(WorkItem::new("a", "A", f64::NAN).validate().is_err());
        assert!(WorkItem::new("  ", "A", 1.0).validate().is_err());
        assert!(
            WorkItem::new("a", "A", 1.0)
                .with_business_value(f64::INFINITY)
                .validate()
                .is_err()
        );
        assert!(
            WorkItem::new("a", "A", 1.0)
                .with_task(WorkTask::new(" ", None))
                .validate()
                .is_err()
        );
    }
}
