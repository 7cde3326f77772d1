//! Benchmark: ensemble scatter into the analysis matrix across worker counts.

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use ensnode_node::config::{GenKwConfig, KindConfig, ScalarConfig, ScalarElement};
use ensnode_node::transform::OutputTransform;
use ensnode_node::{Node, NodeConfig, NodeRegistry};
use ensnode_types::ActiveList;
use ensnode_update::UpdatePlan;
use rand::SeedableRng;
use rand::rngs::StdRng;

const ENSEMBLE_SIZE: usize = 100;
const ELEMENTS: usize = 2_000;

fn ensemble() -> (UpdatePlan, Vec<Vec<Node>>) {
    let elements = (0..ELEMENTS)
        .map(|i| ScalarElement {
            name: format!("X{i}"),
            transform: OutputTransform::None,
        })
        .collect();
    let detail = KindConfig::GenKw(GenKwConfig {
        scalars: ScalarConfig::new(elements).unwrap(),
        template: None,
    });
    let config = Arc::new(NodeConfig::new("BENCH", detail).unwrap());
    let registry = NodeRegistry::with_builtin_kinds();
    let mut rng = StdRng::seed_from_u64(0xE45);

    let members = (0..ENSEMBLE_SIZE)
        .map(|_| {
            let mut node = Node::alloc(&registry, Arc::clone(&config)).unwrap();
            node.sample(&mut rng).unwrap();
            vec![node]
        })
        .collect();
    let mut plan = UpdatePlan::new();
    plan.push_config(&config, ActiveList::from_indices((0..ELEMENTS).step_by(3)))
        .unwrap();
    (plan, members)
}

fn bench_scatter(c: &mut Criterion) {
    let (plan, members) = ensemble();
    let mut group = c.benchmark_group("ensemble_scatter");
    let bytes = (plan.total_rows() * ENSEMBLE_SIZE * std::mem::size_of::<f64>()) as u64;
    group.throughput(Throughput::Bytes(bytes));
    for workers in [1usize, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &workers| {
            let mut matrix = plan.alloc_matrix(ENSEMBLE_SIZE).unwrap();
            b.iter(|| {
                plan.scatter(&members, &mut matrix, workers).unwrap();
                criterion::black_box(matrix.get(0, 0));
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_scatter);
criterion_main!(benches);
