use chrono::{Duration, NaiveDate, TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use sprintlens_core::cancel::CancelToken;
use sprintlens_core::history::{TransitionHistory, TransitionRecord};
use sprintlens_core::metrics::{DateRange, MetricsEngine};
use sprintlens_core::model::{StateBucket, TrackedItem, WorkItem};

const TIERS: [(&str, usize, i64); 3] = [("small", 200, 14), ("medium", 2_000, 30), ("large", 10_000, 90)];

/// Deterministic synthetic items walking forward through the buckets.
fn synthetic_items(count: usize) -> Vec<TrackedItem> {
    let origin = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
    (0..count)
        .map(|index| {
            let seed = index as i64;
            let steps = 1 + index % (StateBucket::ALL.len() - 1);
            let records = (1..=steps)
                .map(|rank| {
                    let at = origin + Duration::hours(seed % 48 + (rank as i64) * (11 + seed % 37));
                    TransitionRecord::new(at, StateBucket::ALL[rank].as_str())
                })
                .collect();
            TrackedItem::new(
                WorkItem::new(format!("item-{index}"), format!("Story {index}"), (index % 8) as f64),
                TransitionHistory::new(records).unwrap(),
            )
        })
        .collect()
}

fn bench_aggregate(c: &mut Criterion) {
    let engine = MetricsEngine::default();
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let mut group = c.benchmark_group("metrics.aggregate");

    for (name, count, days) in TIERS {
        let items = synthetic_items(count);
        let resolved = engine.classifier().resolve_all(&items).unwrap();
        let range = DateRange::new(start, start + Duration::days(days - 1)).unwrap();
        group.throughput(Throughput::Elements((count as u64) * (days as u64)));

        group.bench_with_input(BenchmarkId::new("daily", name), &resolved, |b, resolved| {
            b.iter(|| {
                black_box(
                    engine
                        .aggregator()
                        .aggregate(resolved, &range, &CancelToken::new())
                        .unwrap(),
                )
            });
        });

        group.bench_with_input(BenchmarkId::new("burndown_actual", name), &resolved, |b, resolved| {
            b.iter(|| {
                black_box(
                    engine
                        .burndown()
                        .compute_actual(resolved, 1_000.0, start, start + Duration::days(days - 1))
                        .unwrap(),
                )
            });
        });

        group.bench_with_input(BenchmarkId::new("resolve", name), &items, |b, items| {
            b.iter(|| black_box(engine.classifier().resolve_all(items).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_aggregate);
criterion_main!(benches);
