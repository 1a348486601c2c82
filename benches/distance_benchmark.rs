use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use hike_tracker::models::{HikeRecord, HikeSummary, Position};
use hike_tracker::services::distance::cumulative_km;
use hike_tracker::services::map;

/// A looping route of `n` samples, roughly one every 10 m.
fn route(n: usize) -> Vec<Position> {
    (0..n)
        .map(|i| {
            let t = i as f64 / n as f64 * std::f64::consts::TAU;
            Position {
                lat: 37.38 + 0.02 * t.sin(),
                lng: -122.2 + 0.03 * t.cos(),
                alt: Some(150.0 + 50.0 * t.sin()),
            }
        })
        .collect()
}

fn benchmark_distance(c: &mut Criterion) {
    // A long day hike sampled once a second
    let long_hike = route(20_000);

    let mut group = c.benchmark_group("distance");

    group.bench_function("cumulative_km_20k", |b| {
        b.iter(|| cumulative_km(black_box(&long_hike)))
    });

    group.bench_function("encode_route_20k", |b| {
        b.iter(|| map::encode_route(black_box(&long_hike)))
    });

    group.finish();
}

fn benchmark_history(c: &mut Criterion) {
    let hikes: Vec<HikeRecord> = (0..200)
        .map(|i| {
            let positions = route(2_000);
            HikeRecord {
                id: i,
                date: "2026-05-01 09:00:00 UTC".to_string(),
                duration_display: "01:00:00".to_string(),
                distance_km: cumulative_km(&positions),
                positions,
                photos: Vec::new(),
            }
        })
        .collect();

    let mut group = c.benchmark_group("history");

    group.bench_function("summary_200_hikes", |b| {
        b.iter(|| HikeSummary::from_hikes(black_box(&hikes)))
    });

    group.bench_function("history_collection_200_hikes", |b| {
        b.iter(|| map::history_collection(black_box(&hikes)))
    });

    group.finish();
}

criterion_group!(benches, benchmark_distance, benchmark_history);
criterion_main!(benches);
