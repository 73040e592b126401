//! Hot paths of a monitor poll: projection, utility assessment and the
//! shared-state round trip.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use metacontrol::domain::models::{ControlConfig, ProjectionConfig, ProjectionPolicy};
use metacontrol::services::{keys, log_linear, SharedState, StopRule};

fn history(len: usize) -> Vec<f64> {
    (0..len).map(|i| (i as f64 * 0.1).exp() - 1.0).collect()
}

fn bench_log_linear(c: &mut Criterion) {
    let mut group = c.benchmark_group("log_linear");

    for len in [8usize, 64, 512, 4096] {
        let samples = history(len);
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::new("history", len), &samples, |b, samples| {
            b.iter(|| log_linear(black_box(samples), 1));
        });
    }

    group.finish();
}

fn bench_assess(c: &mut Criterion) {
    let mut group = c.benchmark_group("assess");
    let samples = history(600);

    for policy in [ProjectionPolicy::Constant, ProjectionPolicy::Regression] {
        let rule = StopRule::from_config(&ControlConfig {
            projection: ProjectionConfig {
                policy,
                ..ProjectionConfig::default()
            },
            ..ControlConfig::default()
        });
        group.bench_function(policy.as_str(), |b| {
            b.iter(|| rule.assess(black_box(600), black_box(36.0), black_box(403.4), &samples));
        });
    }

    group.finish();
}

fn bench_shared_state(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let state = SharedState::for_run();
    let samples = history(600);

    c.bench_function("shared_state/publish_and_read_history", |b| {
        b.to_async(&runtime).iter(|| async {
            state.set(keys::QUALITY_HISTORY, &samples).await.unwrap();
            let read: Option<Vec<f64>> = state.get(keys::QUALITY_HISTORY).await.unwrap();
            black_box(read)
        });
    });
}

criterion_group!(benches, bench_log_linear, bench_assess, bench_shared_state);
criterion_main!(benches);
