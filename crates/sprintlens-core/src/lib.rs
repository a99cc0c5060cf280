//! sprintlens-core library.
//!
//! Turns fetched work-item transition logs into sprint burndown and
//! lead/cycle-time metrics.
//!
//! # Conventions
//!
//! - **Errors**: library operations return [`error::MetricsError`]; file and
//!   config loading uses `anyhow::Result` with context.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `debug!`) with
//!   structured fields.

#![forbid(unsafe_code)]

pub mod cancel;
pub mod config;
pub mod error;
pub mod history;
pub mod metrics;
pub mod model;
pub mod service;
pub mod timing;
