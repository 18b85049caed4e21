use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use uuid::Uuid;

use graph_anything::chart::chart_series;
use graph_anything::memory::MemoryGraphStore;
use graph_anything::models::{GraphDefinition, GraphId, UserId};
use graph_anything::store::GraphStore;

fn lcg_next(state: &mut u64) -> u64 {
    *state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
    *state
}

fn definition(idx: usize) -> GraphDefinition {
    GraphDefinition {
        title: format!("Tracker {idx}"),
        x_label: "Day".to_string(),
        y_label: "Count".to_string(),
        emoji: None,
    }
}

/// A user with `graphs` graphs of `points` points each.
fn seeded_store(
    runtime: &tokio::runtime::Runtime,
    graphs: usize,
    points: usize,
) -> (MemoryGraphStore, UserId, Vec<GraphId>) {
    let store = MemoryGraphStore::new();
    let user = UserId(Uuid::from_u128(1));
    let mut state = 0x1234_5678_9abc_def0u64;
    let ids = runtime.block_on(async {
        store
            .upsert_user_document(user, "bench@example.local", "bench")
            .await
            .expect("user document");
        let mut ids = Vec::with_capacity(graphs);
        for idx in 0..graphs {
            let graph = store
                .create_graph(user, definition(idx))
                .await
                .expect("create");
            for _ in 0..points {
                let value = (lcg_next(&mut state) % 100) as f64;
                store
                    .append_point(user, &graph.graph_id, value)
                    .await
                    .expect("append");
            }
            ids.push(graph.graph_id);
        }
        ids
    });
    (store, user, ids)
}

fn bench_append_point(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    let mut group = c.benchmark_group("append_point");
    for (graphs, points) in [(10usize, 100usize), (100usize, 1_000usize)] {
        let (store, user, ids) = seeded_store(&runtime, graphs, points);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::new("memory", format!("{graphs}g_{points}p")),
            &(store, user, ids),
            |b, (store, user, ids)| {
                let mut seed = 42u64;
                b.iter(|| {
                    let graph_id = &ids[(lcg_next(&mut seed) as usize) % ids.len()];
                    black_box(
                        runtime
                            .block_on(store.append_point(*user, graph_id, 1.0))
                            .expect("append"),
                    );
                });
            },
        );
    }
    group.finish();
}

fn bench_fetch_and_chart(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    let mut group = c.benchmark_group("fetch_and_chart");
    for points in [100usize, 10_000usize] {
        let (store, user, ids) = seeded_store(&runtime, 1, points);

        group.throughput(Throughput::Elements(points as u64));
        group.bench_with_input(
            BenchmarkId::new("memory", format!("{points}p")),
            &(store, user, ids),
            |b, (store, user, ids)| {
                b.iter(|| {
                    let graph = runtime
                        .block_on(store.fetch_graph(*user, &ids[0]))
                        .expect("fetch");
                    black_box(chart_series(&graph));
                });
            },
        );
    }
    group.finish();
}

criterion_group!(store_paths, bench_append_point, bench_fetch_and_chart);
criterion_main!(store_paths);
