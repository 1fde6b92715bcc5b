//! # Graph Benchmarks
//!
//! Performance benchmarks for carbonflow-core store operations.
//!
//! Run with: `cargo bench -p carbonflow-core`

use carbonflow_core::credibility::assess;
use carbonflow_core::{
    CompletionStatus, GraphStore, ImportPayload, ImportTarget, NodeAttributes, NodeId, Position,
    PropagationPolicy, Stage, StoreSettings, WorkflowSummary,
};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn leaf(weight: f64, factor: f64) -> NodeAttributes {
    NodeAttributes {
        stage: Stage::RawMaterial,
        weight,
        carbon_factor: factor,
        completion_status: CompletionStatus::Completed,
        ..NodeAttributes::default()
    }
}

/// A chain `n0 -> n1 -> ... -> n(size-1)`.
fn create_chain(size: usize, policy: PropagationPolicy) -> (GraphStore, Vec<NodeId>) {
    let settings = StoreSettings {
        propagation: policy,
        ..StoreSettings::default()
    };
    let mut store = GraphStore::new(settings);
    let mut ids = Vec::with_capacity(size);
    for i in 0..size {
        let id = store.add_node(format!("n{}", i), Position::default(), leaf(1.0, 2.0));
        if let Some(prev) = ids.last() {
            store.add_edge(prev, &id).expect("edge");
        }
        ids.push(id);
    }
    (store, ids)
}

/// Fan-in: `size - 1` leaves into one hub.
fn create_star(size: usize) -> GraphStore {
    let mut store = GraphStore::default();
    let hub = store.add_node("hub", Position::default(), leaf(0.0, 0.0));
    for i in 1..size {
        let spoke = store.add_node(format!("s{}", i), Position::default(), leaf(1.0, 1.5));
        store.add_edge(&spoke, &hub).expect("edge");
    }
    store
}

fn bom_text(rows: usize) -> String {
    let mut text = String::from("组件ID,组件名称,材料,重量(g),碳排放因子\n");
    for i in 0..rows {
        text.push_str(&format!("C{},零件{},材料{},{},{}\n", i, i, i % 7, 100 + i, 2.5));
    }
    text
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_node_insertion(c: &mut Criterion) {
    let mut group = c.benchmark_group("node_insertion");

    for size in [100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut store = GraphStore::default();
                for i in 0..size {
                    store.add_node(format!("n{}", i), Position::default(), leaf(1.0, 1.0));
                }
                black_box(store)
            });
        });
    }

    group.finish();
}

fn bench_fan_in(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_in_aggregation");

    for size in [100, 500].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| black_box(create_star(size)));
        });
    }

    group.finish();
}

fn bench_propagation(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_update");

    for size in [50, 200].iter() {
        for policy in [PropagationPolicy::OneHop, PropagationPolicy::Descendants] {
            let (store, ids) = create_chain(*size, policy);
            group.bench_with_input(
                BenchmarkId::new(policy.to_string(), size),
                &ids[0],
                |b, head| {
                    b.iter_batched(
                        || store.snapshot(),
                        |graph| {
                            let mut store = GraphStore::with_graph(graph, StoreSettings {
                                propagation: policy,
                                ..StoreSettings::default()
                            });
                            let update = carbonflow_core::NodeUpdate {
                                weight: Some(3.0),
                                ..carbonflow_core::NodeUpdate::default()
                            };
                            black_box(store.update_node_data(head, update))
                        },
                        criterion::BatchSize::SmallInput,
                    );
                },
            );
        }
    }

    group.finish();
}

fn bench_bom_import(c: &mut Criterion) {
    let mut group = c.benchmark_group("bom_import");

    for rows in [50, 500].iter() {
        let payload = ImportPayload::new(bom_text(*rows), ImportTarget::Bom);
        group.bench_with_input(BenchmarkId::from_parameter(rows), &payload, |b, payload| {
            b.iter(|| {
                let mut store = GraphStore::default();
                black_box(store.import_table(payload, Position::default()))
            });
        });
    }

    group.finish();
}

fn bench_scoring(c: &mut Criterion) {
    let mut group = c.benchmark_group("scoring");

    for size in [100, 1000].iter() {
        let store = create_star(*size);
        group.bench_with_input(BenchmarkId::new("credibility", size), store.graph(), |b, g| {
            b.iter(|| black_box(assess(g.nodes())));
        });
        group.bench_with_input(BenchmarkId::new("summary", size), store.graph(), |b, g| {
            b.iter(|| black_box(WorkflowSummary::from_graph(g)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_node_insertion,
    bench_fan_in,
    bench_propagation,
    bench_bom_import,
    bench_scoring
);
criterion_main!(benches);
