//! `slens lead-time`: per-story cycle times for a sprint or a date range.

use std::io::Write;
use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Args;
use serde::Serialize;
use sprintlens_core::metrics::{ChartPoint, LeadTimePoint, LeadTimeSummary};
use sprintlens_core::model::StateBucket;
use sprintlens_core::service::{MetricsSnapshot, Subject};

use crate::cmd::{Context, format_value, or_dash, run_metrics};
use crate::output::{pretty_kv, pretty_rule, pretty_section, render_mode};

/// Arguments for `slens lead-time`.
#[derive(Args, Debug)]
pub struct LeadTimeArgs {
    /// Exported snapshot file (JSON).
    #[arg(long, short = 's', value_name = "PATH")]
    pub snapshot: PathBuf,

    /// Use the dates of this sprint.
    #[arg(long, conflicts_with_all = ["from", "to"], required_unless_present = "from")]
    pub sprint: Option<String>,

    /// First date of the range (YYYY-MM-DD).
    #[arg(long, requires = "to")]
    pub from: Option<NaiveDate>,

    /// Last date of the range (YYYY-MM-DD), inclusive.
    #[arg(long, requires = "from")]
    pub to: Option<NaiveDate>,

    /// Keep the per-date placeholder bars in the output.
    #[arg(long)]
    pub all: bool,

    /// Also print one item-count series per bucket over the dates.
    #[arg(long)]
    pub daily: bool,
}

impl LeadTimeArgs {
    fn subject(&self) -> anyhow::Result<Subject> {
        match (&self.sprint, self.from, self.to) {
            (Some(name), _, _) => Ok(Subject::sprint(name)),
            (None, Some(start), Some(end)) => Ok(Subject::range(start, end)),
            _ => anyhow::bail!("pass --sprint or both --from and --to"),
        }
    }
}

#[derive(Debug, Serialize)]
struct LeadTimeReport {
    subject: Subject,
    start: NaiveDate,
    end: NaiveDate,
    summary: LeadTimeSummary,
    entries: Vec<LeadTimePoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    daily: Option<Vec<BucketSeries>>,
    input_digest: String,
}

/// Items in one bucket on each date of the range.
#[derive(Debug, Serialize)]
struct BucketSeries {
    bucket: StateBucket,
    title: &'static str,
    points: Vec<ChartPoint>,
}

/// Execute `slens lead-time`.
pub fn run_lead_time(args: &LeadTimeArgs, ctx: &Context) -> anyhow::Result<()> {
    let snapshot = run_metrics(ctx, args.subject()?, &args.snapshot)?;
    let report = build_report(&snapshot, args.all, args.daily);
    render_mode(ctx.output, &report, render_text, render_pretty)
}

fn build_report(
    snapshot: &MetricsSnapshot,
    keep_placeholders: bool,
    with_daily: bool,
) -> LeadTimeReport {
    let entries = snapshot
        .lead_time_view
        .iter()
        .filter(|point| keep_placeholders || point.item_id.is_some())
        .cloned()
        .collect();

    let daily = with_daily.then(|| {
        StateBucket::ALL
            .into_iter()
            .map(|bucket| BucketSeries {
                bucket,
                title: bucket.label(),
                points: snapshot.daily.series(bucket),
            })
            .collect()
    });

    LeadTimeReport {
        subject: snapshot.subject.clone(),
        start: snapshot.start,
        end: snapshot.end,
        summary: snapshot.lead_time_summary.clone(),
        entries,
        daily,
        input_digest: snapshot.input_digest.clone(),
    }
}

fn render_text(report: &LeadTimeReport, w: &mut dyn Write) -> std::io::Result<()> {
    let summary = &report.summary;
    writeln!(
        w,
        "count={}  missing={}  mean_days={}  median_days={}  p85_days={}  max_days={}",
        summary.count,
        summary.missing,
        or_dash(summary.mean_days.map(format_value)),
        or_dash(summary.median_days),
        or_dash(summary.p85_days),
        or_dash(summary.max_days),
    )?;
    for entry in &report.entries {
        writeln!(
            w,
            "{}  {}  days={}  valid={}",
            entry.date,
            entry.item_id.as_deref().unwrap_or("-"),
            entry.elapsed_days,
            entry.valid
        )?;
    }
    if let Some(daily) = &report.daily {
        for series in daily {
            let counts = series
                .points
                .iter()
                .map(|point| format_value(point.value))
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(w, "{}  {counts}", series.bucket)?;
        }
    }
    Ok(())
}

fn render_pretty(report: &LeadTimeReport, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, &format!("Lead time: {}", report.subject))?;
    pretty_kv(w, "Dates", format!("{} to {}", report.start, report.end))?;
    let summary = &report.summary;
    pretty_kv(w, "Completed", summary.count.to_string())?;
    pretty_kv(w, "Incomplete", summary.missing.to_string())?;
    pretty_kv(
        w,
        "Mean",
        or_dash(summary.mean_days.map(|days| format!("{} d", format_value(days)))),
    )?;
    pretty_kv(w, "Median", or_dash(summary.median_days.map(|days| format!("{days} d"))))?;
    pretty_kv(w, "p85", or_dash(summary.p85_days.map(|days| format!("{days} d"))))?;
    pretty_kv(w, "Max", or_dash(summary.max_days.map(|days| format!("{days} d"))))?;

    writeln!(w)?;
    if report.entries.is_empty() {
        writeln!(w, "No items completed in this range.")?;
    } else {
        render_entries(&report.entries, w)?;
    }

    if let Some(daily) = &report.daily {
        writeln!(w)?;
        pretty_section(w, "Items per bucket")?;
        let header = daily
            .iter()
            .map(|series| format!("{:>14}", series.title))
            .collect::<String>();
        writeln!(w, "{:<8}{header}", "DATE")?;
        let labels = daily.first().map(|series| series.points.as_slice()).unwrap_or_default();
        for (index, point) in labels.iter().enumerate() {
            let label = point.label.as_str();
            let cells = daily
                .iter()
                .map(|series| {
                    let count = series.points.get(index).map_or(0.0, |point| point.value);
                    format!("{:>14}", format_value(count))
                })
                .collect::<String>();
            writeln!(w, "{label:<8}{cells}")?;
        }
    }
    Ok(())
}

fn render_entries(entries: &[LeadTimePoint], w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "{:<8}  {:<16}  {:>5}  STORY", "DONE", "ID", "DAYS")?;
    pretty_rule(w)?;
    for entry in entries {
        let story = entry
            .description
            .as_deref()
            .and_then(|text| text.lines().next())
            .unwrap_or(if entry.item_id.is_some() {
                "(no start transition)"
            } else {
                ""
            });
        let days = if entry.valid {
            entry.elapsed_days.to_string()
        } else {
            "-".to_string()
        };
        writeln!(
            w,
            "{:<8}  {:<16}  {:>5}  {story}",
            entry.label,
            entry.item_id.as_deref().unwrap_or(""),
            days
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use clap::Parser;
    use sprintlens_core::cancel::CancelToken;
    use sprintlens_core::history::{TransitionHistory, TransitionRecord};
    use sprintlens_core::metrics::MetricsEngine;
    use sprintlens_core::model::{ItemSnapshot, TrackedItem, WorkItem};
    use sprintlens_core::service::compute_snapshot;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: LeadTimeArgs,
    }

    fn range_snapshot() -> MetricsSnapshot {
        let at = |day, hour| Utc.with_ymd_and_hms(2024, 2, day, hour, 0, 0).unwrap();
        let snapshot = ItemSnapshot::new(
            "demo",
            vec![
                TrackedItem::new(
                    WorkItem::new("story", "Checkout", 5.0).with_reference(12),
                    TransitionHistory::new(vec![
                        TransitionRecord::new(at(1, 0), "in_progress"),
                        TransitionRecord::new(at(4, 0), "done"),
                    ])
                    .unwrap(),
                ),
                TrackedItem::new(
                    WorkItem::new("hotfix", "Hotfix", 1.0),
                    TransitionHistory::new(vec![TransitionRecord::new(at(2, 9), "done")])
                        .unwrap(),
                ),
            ],
        );
        compute_snapshot(
            &MetricsEngine::default(),
            &Subject::range(
                NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 2, 5).unwrap(),
            ),
            &snapshot,
            &CancelToken::new(),
        )
        .unwrap()
    }

    #[test]
    fn sprint_and_range_are_exclusive() {
        let parsed = Harness::try_parse_from(["t", "-s", "x.json", "--sprint", "S1"]).unwrap();
        assert_eq!(parsed.args.subject().unwrap(), Subject::sprint("S1"));

        let parsed = Harness::try_parse_from([
            "t", "-s", "x.json", "--from", "2024-02-01", "--to", "2024-02-05",
        ])
        .unwrap();
        assert!(matches!(parsed.args.subject().unwrap(), Subject::Range { .. }));

        assert!(
            Harness::try_parse_from(["t", "-s", "x.json", "--sprint", "S1", "--from", "2024-02-01"])
                .is_err()
        );
        assert!(Harness::try_parse_from(["t", "-s", "x.json", "--from", "2024-02-01"]).is_err());
        assert!(Harness::try_parse_from(["t", "-s", "x.json"]).is_err());
    }

    #[test]
    fn placeholders_are_dropped_by_default() {
        let snapshot = range_snapshot();
        let report = build_report(&snapshot, false, false);
        assert_eq!(report.entries.len(), 2);
        assert_eq!(report.entries[0].item_id.as_deref(), Some("hotfix"));
        assert_eq!(report.entries[0].elapsed_days, 0);
        assert_eq!(report.entries[1].item_id.as_deref(), Some("story"));
        assert_eq!(report.entries[1].elapsed_days, 3);

        let all = build_report(&snapshot, true, false);
        assert_eq!(all.entries.len(), 2 + 5);
    }

    #[test]
    fn text_summary_leads_the_output() {
        let report = build_report(&range_snapshot(), false, false);
        let mut buf = Vec::new();
        render_text(&report, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("count=2  missing=0  mean_days=1.5  median_days=0  p85_days=3  max_days=3")
        );
        assert_eq!(lines.next(), Some("2024-02-02  hotfix  days=0  valid=true"));
        assert_eq!(lines.next(), Some("2024-02-04  story  days=3  valid=true"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn daily_series_has_one_point_per_date_for_every_bucket() {
        let report = build_report(&range_snapshot(), false, true);
        let daily = report.daily.as_ref().unwrap();
        let buckets: Vec<_> = daily.iter().map(|series| series.bucket).collect();
        assert_eq!(buckets, StateBucket::ALL);
        assert!(daily.iter().all(|series| series.points.len() == 5));

        let done = &daily[5];
        assert_eq!(done.title, StateBucket::Done.label());
        let counts: Vec<_> = done.points.iter().map(|point| point.value).collect();
        assert_eq!(counts, vec![0.0, 1.0, 1.0, 2.0, 2.0]);
        assert_eq!(done.points[3].label, "Feb 04");

        let mut buf = Vec::new();
        render_text(&report, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.ends_with("done  0 1 1 2 2\n"));
        assert!(text.contains("\nin_progress  1 1 1 0 0\n"));
    }
}
