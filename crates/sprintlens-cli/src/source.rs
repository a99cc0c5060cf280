//! Snapshot fetch from an exported JSON file.

use std::path::Path;
use std::sync::Arc;

use sprintlens_core::error::FetchFailure;
use sprintlens_core::model::ItemSnapshot;
use tracing::debug;

/// Read and parse an exported snapshot.
///
/// Any read or parse problem, including histories whose timestamps go
/// backwards, is reported as a [`FetchFailure`] so the run fails as a whole.
pub fn fetch_snapshot(path: &Path) -> Result<Arc<ItemSnapshot>, FetchFailure> {
    let origin = path.display().to_string();
    let content = std::fs::read_to_string(path)
        .map_err(|err| FetchFailure::new(&origin, format!("cannot read file: {err}")))?;
    let snapshot: ItemSnapshot = serde_json::from_str(&content)
        .map_err(|err| FetchFailure::new(&origin, format!("malformed snapshot: {err}")))?;

    debug!(
        origin = %origin,
        items = snapshot.items.len(),
        sprints = snapshot.sprints.len(),
        "snapshot loaded"
    );
    Ok(Arc::new(snapshot))
}
