//! Benchmarks for route schema learning and whitelist generation.
//!
//! Run with: cargo bench -p route-schema
//!
//! - learning: cost of `add` while accumulators are still counting
//! - frozen: cost of `add` once every key has frozen (should be near zero)
//! - crystallised: cost of `get_whitelist` on a crystallised route
//! - generate: ranking + filtering a wide frozen tree

use std::sync::Arc;

use criterion::{
    BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main,
};
use route_schema::{
    CountingTree, FilterRule, FreezePredicate, MinInstances, ObservedEvent, RouteId,
    RouteSchemaConfig, RouteSchemaRegistry, SchemaAccumulator, SchemaKey, WhitelistGenerator,
};
use serde_json::{Value, json};

fn make_event(i: u64) -> ObservedEvent {
    ObservedEvent::new()
        .with_query(json!({"page": i % 10, "size": 50, "sort": "created"}))
        .with_body(json!({
            "id": i,
            "user": {"name": "n", "email": "e", "roles": ["admin"]},
            "items": [{"sku": "a", "qty": 1}, {"sku": "b", "qty": 2, "note": "x"}]
        }))
        .with_reaction(json!({
            "ok": true,
            "order": {"id": i, "total": i as f64 * 1.5, "lines": i % 3}
        }))
}

/// Object with `width` distinct properties, each nested one level deep.
fn make_wide(width: u64) -> Value {
    let mut obj = serde_json::Map::new();
    for i in 0..width {
        obj.insert(format!("field_{i:04}"), json!({"value": i, "unit": "ms"}));
    }
    Value::Object(obj)
}

fn create_registry(freeze_after: u64) -> RouteSchemaRegistry {
    RouteSchemaRegistry::builder(RouteSchemaConfig::uncached())
        .freeze_strategy([Arc::new(MinInstances(freeze_after)) as Arc<dyn FreezePredicate>])
        .build()
}

fn bench_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("add");
    group.throughput(Throughput::Elements(1000));
    let route = RouteId::new("POST", "/orders/:orderId");

    for (label, freeze_after) in [("learning", u64::MAX), ("frozen", 1)] {
        group.bench_with_input(BenchmarkId::new(label, 1000), &freeze_after, |b, &n| {
            b.iter_batched(
                || {
                    let mut registry = create_registry(n);
                    registry.add(&route, &make_event(0));
                    let events: Vec<_> = (1..=1000).map(make_event).collect();
                    (registry, events)
                },
                |(mut registry, events)| {
                    for event in &events {
                        registry.add(&route, black_box(event));
                    }
                    registry
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_crystallised(c: &mut Criterion) {
    let route = RouteId::new("GET", "/users/:userId");
    let mut registry = create_registry(1);
    registry.add(&route, &make_event(0));
    registry.get_whitelist(&route);

    c.bench_function("crystallised/get_whitelist", |b| {
        b.iter(|| black_box(registry.get_whitelist(&route)))
    });
}

fn bench_generate(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate");

    for width in [50u64, 500, 5000] {
        let mut tree = CountingTree::new();
        for i in 0..10 {
            let mut sample = make_wide(width);
            sample["tick"] = json!(i);
            tree.record(&sample);
        }
        let exported = tree.export_tree();

        let plain = WhitelistGenerator::new();
        let filtered = WhitelistGenerator::from_rules(&[
            FilterRule::Exclude {
                patterns: vec!["*.unit".into()],
            },
            FilterRule::MinCount { at_least: 2 },
        ]);

        group.throughput(Throughput::Elements(width * 2));
        group.bench_with_input(BenchmarkId::new("plain", width), &exported, |b, t| {
            b.iter(|| black_box(plain.generate(SchemaKey::Reaction, t, 120)))
        });
        group.bench_with_input(BenchmarkId::new("filtered", width), &exported, |b, t| {
            b.iter(|| black_box(filtered.generate(SchemaKey::Reaction, t, 120)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_add, bench_crystallised, bench_generate);
criterion_main!(benches);
