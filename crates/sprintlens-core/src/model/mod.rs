//! Read-only input model: fetched work items, their sprints, and the bucket
//! taxonomy they are classified into.

pub mod bucket;
pub mod item;

pub use bucket::{ParseBucketError, StateBucket, normalize_status};
pub use item::{ItemSnapshot, SprintSpec, TrackedItem, WorkItem, WorkTask};
