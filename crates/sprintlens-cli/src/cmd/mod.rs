pub mod burndown;
pub mod completions;
pub mod config;
pub mod lead_time;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sprintlens_core::config::EffectiveConfig;
use sprintlens_core::error::MetricsError;
use sprintlens_core::metrics::MetricsEngine;
use sprintlens_core::service::{MetricsService, MetricsSnapshot, RunOutcome, Subject};
use tracing::debug;

use crate::output::{CliError, OutputMode, render_error};
use crate::source;

/// Everything a metrics command needs besides its own arguments.
#[derive(Debug)]
pub struct Context {
    pub project_root: PathBuf,
    pub config: EffectiveConfig,
    pub output: OutputMode,
}

/// Load the snapshot, run one recalculation for `subject` and wait for it.
///
/// Failures are rendered to stderr in the active output mode before being
/// returned.
pub fn run_metrics(
    ctx: &Context,
    subject: Subject,
    snapshot_path: &Path,
) -> anyhow::Result<Arc<MetricsSnapshot>> {
    let engine = MetricsEngine::from_config(&ctx.config.metrics)
        .map_err(|err| report(ctx.output, &err))?;
    let service = MetricsService::new(engine);

    let fetched = source::fetch_snapshot(snapshot_path);
    let handle = service
        .recalculate(subject, fetched)
        .map_err(|err| report(ctx.output, &err))?;
    debug!(run = handle.id(), "waiting for run");

    match handle.wait() {
        RunOutcome::Completed(snapshot) => Ok(snapshot),
        RunOutcome::Failed(err) => Err(report(ctx.output, &err)),
        RunOutcome::Cancelled => Err(report(ctx.output, &MetricsError::Cancelled)),
    }
}

fn report(output: OutputMode, err: &MetricsError) -> anyhow::Error {
    if let Err(render_err) = render_error(output, &CliError::from(err)) {
        return render_err;
    }
    anyhow::Error::new(err.clone())
}

/// Format an optional number for text and pretty output.
pub fn or_dash<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |value| value.to_string())
}

/// Two decimals at most, without trailing zeros (`12.5`, `20`).
pub fn format_value(value: f64) -> String {
    let fixed = format!("{value:.2}");
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_value_trims_zeros() {
        assert_eq!(format_value(20.0), "20");
        assert_eq!(format_value(12.5), "12.5");
        assert_eq!(format_value(2.0 / 3.0), "0.67");
        assert_eq!(format_value(-0.0001), "0");
    }

    #[test]
    fn or_dash_formats_missing_values() {
        assert_eq!(or_dash(Some(3)), "3");
        assert_eq!(or_dash::<i64>(None), "-");
    }
}
