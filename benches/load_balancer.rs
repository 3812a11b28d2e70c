//! Benchmarks the load balancer's weighted-random selection over a
//! realistic candidate set (mixed priorities and weights).

use std::collections::HashMap;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use model_gateway::core::health::HealthStore;
use model_gateway::core::router::{LoadBalancer, ModelBinding};

fn bindings(count: usize) -> HashMap<String, Vec<ModelBinding>> {
    let mut m = HashMap::new();
    let list = (0..count)
        .map(|i| ModelBinding {
            provider_id: format!("p{i}"),
            priority: (i % 3) as u32,
            weight: (i % 10) as u32 + 1,
        })
        .collect();
    m.insert("gpt-4o".to_string(), list);
    m
}

fn bench_select(c: &mut Criterion) {
    let lb = LoadBalancer::new(bindings(50), HealthStore::new(5));
    c.bench_function("load_balancer_select_50_candidates", |b| {
        b.iter(|| black_box(lb.select("gpt-4o")));
    });
}

criterion_group!(benches, bench_select);
criterion_main!(benches);
