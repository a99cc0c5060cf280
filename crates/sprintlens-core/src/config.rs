//! Project and user configuration.
//!
//! Project settings live in `<root>/.sprintlens/config.toml` and shape the
//! metrics themselves. User settings live under the platform config directory
//! and only carry presentation preferences. Every section is serde-defaulted,
//! so a missing file or table means defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::metrics::burndown::BurndownMetric;
use crate::metrics::cycle_time::BucketPredicate;
use crate::model::StateBucket;

/// Project-relative location of the metrics configuration.
pub const PROJECT_CONFIG_PATH: &str = ".sprintlens/config.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub classification: ClassificationConfig,
    #[serde(default)]
    pub cycle_time: CycleTimeConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub burndown: BurndownConfig,
}

/// Status → bucket mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationConfig {
    /// Tracker status name → bucket. Keys are matched after normalization.
    #[serde(default)]
    pub statuses: BTreeMap<String, StateBucket>,
    /// Bucket for statuses matched by nothing else.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<StateBucket>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleTimeConfig {
    #[serde(default = "default_cycle_start")]
    pub start: BucketPredicate,
    #[serde(default = "default_cycle_end")]
    pub end: BucketPredicate,
}

impl Default for CycleTimeConfig {
    fn default() -> Self {
        Self {
            start: default_cycle_start(),
            end: default_cycle_end(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Hold the ideal burndown flat on Saturdays and Sundays.
    #[serde(default)]
    pub exclude_weekends: bool,
    #[serde(default)]
    pub holidays: Vec<NaiveDate>,
    /// Fixed offset used to turn timestamps into calendar dates.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurndownConfig {
    #[serde(default)]
    pub metric: BurndownMetric,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub metrics: MetricsConfig,
    pub user: UserConfig,
    /// File the metrics config was read from, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
}

/// Load `<root>/.sprintlens/config.toml`, or defaults when absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<MetricsConfig> {
    let path = project_root.join(PROJECT_CONFIG_PATH);
    if !path.exists() {
        return Ok(MetricsConfig::default());
    }
    load_config_file(&path)
}

/// Load a metrics config from an explicit path. The file must exist.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_config_file(path: &Path) -> Result<MetricsConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<MetricsConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Path of the per-user config file, when the platform has a config dir.
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sprintlens/config.toml"))
}

/// Load the per-user config, or defaults when absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(path) = user_config_path() else {
        return Ok(UserConfig::default());
    };
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Combine project (or explicit) and user configuration.
///
/// # Errors
///
/// Returns an error if any present config file is unreadable or malformed.
pub fn resolve_config(project_root: &Path, explicit: Option<&Path>) -> Result<EffectiveConfig> {
    let (metrics, source) = match explicit {
        Some(path) => (load_config_file(path)?, Some(path.to_path_buf())),
        None => {
            let path = project_root.join(PROJECT_CONFIG_PATH);
            let source = path.exists().then_some(path);
            (load_project_config(project_root)?, source)
        }
    };
    let user = load_user_config()?;

    Ok(EffectiveConfig {
        metrics,
        user,
        source,
    })
}

/// Canonical output mode name for a user-supplied value.
#[must_use]
pub fn normalize_output_mode(raw: &str) -> Option<&'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "pretty" | "human" => Some("pretty"),
        "text" | "table" => Some("text"),
        "json" => Some("json"),
        _ => None,
    }
}

const fn default_cycle_start() -> BucketPredicate {
    BucketPredicate::Reached(StateBucket::InProgress)
}

const fn default_cycle_end() -> BucketPredicate {
    BucketPredicate::Reached(StateBucket::Done)
}
