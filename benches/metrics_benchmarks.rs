use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use request_metrics_api::infra::metrics::{DEFAULT_BUCKETS, MetricRegistry};

fn bench_counter_increment(c: &mut Criterion) {
    let registry = MetricRegistry::new();
    let counter = registry
        .register_counter(
            "http_requests_total",
            "Total number of requests",
            &["method", "endpoint", "status"],
        )
        .unwrap();
    let labels = [
        ("method", "GET"),
        ("endpoint", "health_check"),
        ("status", "200"),
    ];

    c.bench_function("counter_increment", |b| {
        b.iter(|| counter.increment(black_box(&labels)).unwrap())
    });
}

fn bench_histogram_observe(c: &mut Criterion) {
    let registry = MetricRegistry::new();
    let histogram = registry
        .register_histogram(
            "http_request_duration_seconds",
            "Request duration in seconds",
            &["method", "endpoint"],
            &DEFAULT_BUCKETS,
        )
        .unwrap();
    let labels = [("method", "GET"), ("endpoint", "health_check")];

    c.bench_function("histogram_observe", |b| {
        b.iter(|| histogram.observe(black_box(&labels), black_box(0.042)).unwrap())
    });
}

fn bench_render(c: &mut Criterion) {
    let registry = MetricRegistry::new();
    let counter = registry
        .register_counter("requests_total", "Requests", &["endpoint", "status"])
        .unwrap();
    let histogram = registry
        .register_histogram("latency_seconds", "Latency", &["endpoint"], &DEFAULT_BUCKETS)
        .unwrap();
    for i in 0..50 {
        let endpoint = format!("handler_{i}");
        counter
            .increment(&[("endpoint", endpoint.as_str()), ("status", "200")])
            .unwrap();
        histogram
            .observe(&[("endpoint", endpoint.as_str())], f64::from(i) / 100.0)
            .unwrap();
    }

    c.bench_function("render_50_series", |b| b.iter(|| black_box(registry.render())));
}

criterion_group!(
    benches,
    bench_counter_increment,
    bench_histogram_observe,
    bench_render
);
criterion_main!(benches);
