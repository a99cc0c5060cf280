//! `slens burndown`: ideal vs actual remaining work for one sprint.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

use anyhow::anyhow;
use chrono::NaiveDate;
use clap::Args;
use serde::Serialize;
use sprintlens_core::metrics::{BurndownMetric, BurndownSeries, date_label};
use sprintlens_core::model::StateBucket;
use sprintlens_core::service::{MetricsSnapshot, Subject};

use crate::cmd::{Context, format_value, run_metrics};
use crate::output::{OutputMode, pretty_kv, pretty_rule, pretty_section, render_mode};

const BAR_WIDTH: usize = 30;

/// Arguments for `slens burndown`.
#[derive(Args, Debug)]
pub struct BurndownArgs {
    /// Exported snapshot file (JSON).
    #[arg(long, short = 's', value_name = "PATH")]
    pub snapshot: PathBuf,

    /// Sprint name as it appears in the snapshot.
    #[arg(long)]
    pub sprint: String,

    /// Also print per-bucket item counts for every date.
    #[arg(long)]
    pub daily: bool,

    /// Also print the task, user story and business value burndowns together.
    #[arg(long)]
    pub combined: bool,
}

#[derive(Debug, Serialize)]
struct BurndownReport {
    sprint: String,
    metric: BurndownMetric,
    start: NaiveDate,
    end: NaiveDate,
    total: f64,
    remaining: f64,
    rows: Vec<BurndownRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    daily: Option<Vec<DailyRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    combined: Option<Vec<MetricRows>>,
    input_digest: String,
}

/// One metric's lines inside the combined view.
#[derive(Debug, Serialize)]
struct MetricRows {
    metric: BurndownMetric,
    title: &'static str,
    total: f64,
    remaining: f64,
    rows: Vec<BurndownRow>,
}

#[derive(Debug, Serialize)]
struct BurndownRow {
    date: NaiveDate,
    label: String,
    ideal: f64,
    actual: f64,
}

#[derive(Debug, Serialize)]
struct DailyRow {
    date: NaiveDate,
    label: String,
    counts: BTreeMap<StateBucket, usize>,
}

/// Execute `slens burndown`.
pub fn run_burndown(args: &BurndownArgs, ctx: &Context) -> anyhow::Result<()> {
    let snapshot = run_metrics(ctx, Subject::sprint(&args.sprint), &args.snapshot)?;
    let report = build_report(&snapshot, args.daily, args.combined)?;
    render(ctx.output, &report)
}

fn render(output: OutputMode, report: &BurndownReport) -> anyhow::Result<()> {
    render_mode(output, report, render_text, render_pretty)
}

fn build_report(
    snapshot: &MetricsSnapshot,
    with_daily: bool,
    with_combined: bool,
) -> anyhow::Result<BurndownReport> {
    let series = snapshot
        .burndown
        .as_ref()
        .ok_or_else(|| anyhow!("run for {} produced no burndown", snapshot.subject))?;

    let rows = rows_of(series);

    let daily = with_daily.then(|| {
        snapshot
            .daily
            .days
            .iter()
            .map(|day| DailyRow {
                date: day.date,
                label: date_label(day.date),
                counts: StateBucket::ALL
                    .iter()
                    .map(|bucket| (*bucket, day.count(*bucket)))
                    .collect(),
            })
            .collect()
    });

    let combined = with_combined.then(|| {
        snapshot
            .combined
            .iter()
            .map(|series| {
                let rows = rows_of(series);
                MetricRows {
                    metric: series.metric,
                    title: series.metric.label(),
                    total: series.total,
                    remaining: remaining(&rows, series.total),
                    rows,
                }
            })
            .collect()
    });

    Ok(BurndownReport {
        sprint: series.sprint.clone(),
        metric: series.metric,
        start: snapshot.start,
        end: snapshot.end,
        total: series.total,
        remaining: remaining(&rows, series.total),
        rows,
        daily,
        combined,
        input_digest: snapshot.input_digest.clone(),
    })
}

fn rows_of(series: &BurndownSeries) -> Vec<BurndownRow> {
    series
        .ideal
        .iter()
        .zip(&series.actual)
        .map(|(ideal, actual)| BurndownRow {
            date: ideal.date,
            label: date_label(ideal.date),
            ideal: ideal.value,
            actual: actual.value,
        })
        .collect()
}

fn remaining(rows: &[BurndownRow], total: f64) -> f64 {
    rows.last().map_or(total, |row| row.actual)
}

fn render_text(report: &BurndownReport, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(
        w,
        "sprint={}  metric={}  total={}  remaining={}",
        report.sprint,
        report.metric,
        format_value(report.total),
        format_value(report.remaining)
    )?;
    for row in &report.rows {
        writeln!(
            w,
            "{}  ideal={}  actual={}",
            row.date,
            format_value(row.ideal),
            format_value(row.actual)
        )?;
    }
    if let Some(daily) = &report.daily {
        for row in daily {
            let counts = row
                .counts
                .iter()
                .map(|(bucket, count)| format!("{bucket}={count}"))
                .collect::<Vec<_>>()
                .join("  ");
            writeln!(w, "{}  {counts}", row.date)?;
        }
    }
    if let Some(combined) = &report.combined {
        for series in combined {
            for row in &series.rows {
                writeln!(
                    w,
                    "{}  {}  ideal={}  actual={}",
                    series.metric,
                    row.date,
                    format_value(row.ideal),
                    format_value(row.actual)
                )?;
            }
        }
    }
    Ok(())
}

fn render_pretty(report: &BurndownReport, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, &format!("Burndown: {}", report.sprint))?;
    pretty_kv(w, "Dates", format!("{} to {}", report.start, report.end))?;
    pretty_kv(w, "Metric", report.metric.to_string())?;
    pretty_kv(w, "Total", format_value(report.total))?;
    pretty_kv(w, "Remaining", format_value(report.remaining))?;
    writeln!(w)?;

    writeln!(w, "{:<8}  {:>8}  {:>8}  ACTUAL", "DATE", "IDEAL", "ACTUAL")?;
    pretty_rule(w)?;
    for row in &report.rows {
        writeln!(
            w,
            "{:<8}  {:>8}  {:>8}  {}",
            row.label,
            format_value(row.ideal),
            format_value(row.actual),
            bar(row.actual, report.total)
        )?;
    }

    if let Some(daily) = &report.daily {
        writeln!(w)?;
        pretty_section(w, "Items per bucket")?;
        let header = StateBucket::ALL
            .iter()
            .map(|bucket| format!("{:>14}", bucket.label()))
            .collect::<String>();
        writeln!(w, "{:<8}{header}", "DATE")?;
        for row in daily {
            let cells = row
                .counts
                .values()
                .map(|count| format!("{count:>14}"))
                .collect::<String>();
            writeln!(w, "{:<8}{cells}", row.label)?;
        }
    }

    if let Some(combined) = &report.combined {
        writeln!(w)?;
        pretty_section(w, "Combined burndown")?;
        let header = combined
            .iter()
            .map(|series| format!("{:>16}", series.title))
            .collect::<String>();
        writeln!(w, "{:<8}{header}", "DATE")?;
        for (index, row) in report.rows.iter().enumerate() {
            let cells = combined
                .iter()
                .map(|series| {
                    let actual = series.rows.get(index).map_or(0.0, |row| row.actual);
                    let cell = format!("{} / {}", format_value(actual), format_value(series.total));
                    format!("{cell:>16}")
                })
                .collect::<String>();
            writeln!(w, "{:<8}{cells}", row.label)?;
        }
    }
    Ok(())
}

fn bar(value: f64, total: f64) -> String {
    if total <= 0.0 || value <= 0.0 {
        return String::new();
    }
    let ratio = (value / total).min(1.0);
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let filled = (ratio * BAR_WIDTH as f64).round() as usize;
    "#".repeat(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use sprintlens_core::cancel::CancelToken;
    use sprintlens_core::history::{TransitionHistory, TransitionRecord};
    use sprintlens_core::metrics::MetricsEngine;
    use sprintlens_core::model::{ItemSnapshot, SprintSpec, TrackedItem, WorkItem};
    use sprintlens_core::service::compute_snapshot;

    fn sprint_snapshot() -> MetricsSnapshot {
        let done = Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).unwrap();
        let snapshot = ItemSnapshot::new(
            "demo",
            vec![
                TrackedItem::new(
                    WorkItem::new("a", "A", 4.0),
                    TransitionHistory::new(vec![TransitionRecord::new(done, "done")]).unwrap(),
                ),
                TrackedItem::new(WorkItem::new("b", "B", 6.0), TransitionHistory::empty()),
            ],
        )
        .with_sprint(SprintSpec {
            name: "S1".into(),
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            total_points: None,
        });
        compute_snapshot(
            &MetricsEngine::default(),
            &Subject::sprint("S1"),
            &snapshot,
            &CancelToken::new(),
        )
        .unwrap()
    }

    #[test]
    fn report_pairs_ideal_and_actual_by_date() {
        let report = build_report(&sprint_snapshot(), false, false).unwrap();
        assert_eq!(report.rows.len(), 5);
        assert_eq!(report.rows[0].label, "Jan 01");
        assert!((report.rows[0].ideal - 10.0).abs() < 1e-9);
        assert!(report.rows[4].ideal.abs() < 1e-9);
        assert!((report.remaining - 6.0).abs() < 1e-9);
        assert!(report.daily.is_none());
    }

    #[test]
    fn daily_rows_count_every_item() {
        let report = build_report(&sprint_snapshot(), true, false).unwrap();
        let daily = report.daily.unwrap();
        assert_eq!(daily.len(), 5);
        assert!(daily.iter().all(|row| row.counts.values().sum::<usize>() == 2));
        assert_eq!(daily[4].counts[&StateBucket::Done], 1);
        assert_eq!(daily[4].counts[&StateBucket::NotCreated], 1);
    }

    #[test]
    fn text_output_is_one_line_per_date() {
        let report = build_report(&sprint_snapshot(), false, false).unwrap();
        let mut buf = Vec::new();
        render_text(&report, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "sprint=S1  metric=story_points  total=10  remaining=6");
        assert_eq!(lines[1], "2024-01-01  ideal=10  actual=10");
        assert_eq!(lines[5], "2024-01-05  ideal=0  actual=6");
    }

    #[test]
    fn combined_rows_cover_every_metric() {
        let report = build_report(&sprint_snapshot(), false, true).unwrap();
        let combined = report.combined.unwrap();
        let metrics: Vec<_> = combined.iter().map(|series| series.metric).collect();
        assert_eq!(metrics, BurndownMetric::ALL);
        assert!(combined.iter().all(|series| series.rows.len() == 5));

        let stories = &combined[1];
        assert_eq!(stories.title, "User Story");
        assert!((stories.remaining - 6.0).abs() < 1e-9);
        // No business values: the value burndown stays at zero.
        assert!(combined[2].total.abs() < 1e-9);
    }

    #[test]
    fn combined_text_prefixes_rows_with_metric() {
        let report = build_report(&sprint_snapshot(), false, true).unwrap();
        let mut buf = Vec::new();
        render_text(&report, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("\ntask_points  2024-01-03  ideal=5  actual=6\n"));
        assert!(text.contains("\nbusiness_value  2024-01-05  ideal=0  actual=0\n"));
        assert_eq!(text.lines().count(), 6 + 3 * 5);
    }

    #[test]
    fn bar_scales_to_total() {
        assert_eq!(bar(10.0, 10.0).len(), BAR_WIDTH);
        assert_eq!(bar(5.0, 10.0).len(), BAR_WIDTH / 2);
        assert!(bar(0.0, 10.0).is_empty());
        assert!(bar(3.0, 0.0).is_empty());
    }
}
