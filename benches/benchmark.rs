use criterion::{Criterion, black_box, criterion_group, criterion_main};

use routeflow_store::record::{IdGenerator, compare_routes};
use routeflow_store::sanitise::sanitise_withdrawn_collection;
use serde_json::json;

fn candidate_routes(count: usize) -> Vec<serde_json::Value> {
    (0..count)
        .map(|i| {
            let suffix = if i % 7 == 0 { "X" } else { "" };
            json!({
                "route": format!(" {}{} ", i % 700, suffix),
                "operator": "Benchmark Buses",
                "withdrawn": "2019-06-01"
            })
        })
        .collect()
}

fn bench_sanitise_collection(c: &mut Criterion) {
    let ids = IdGenerator::new();
    let candidates = candidate_routes(1000);
    c.bench_function("sanitise 1000 withdrawn candidates", |b| {
        b.iter(|| sanitise_withdrawn_collection(black_box(&candidates), &ids))
    });
}

fn bench_natural_compare(c: &mut Criterion) {
    let names: Vec<String> = (0..1000)
        .map(|i| format!("{}{}", i % 700, if i % 3 == 0 { "A" } else { "" }))
        .collect();
    c.bench_function("natural sort of 1000 route names", |b| {
        b.iter(|| {
            let mut sorted: Vec<&str> = names.iter().map(String::as_str).collect();
            sorted.sort_by(|a, b| compare_routes(a, b));
            black_box(sorted.len())
        })
    });
}

criterion_group!(benches, bench_sanitise_collection, bench_natural_compare);
criterion_main!(benches);
