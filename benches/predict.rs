//! Batched prediction benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use flat_forest::core::types::{Activation, RoutingMode};
use flat_forest::model::{CategoricalSpec, Column, Condition, DataSpec, ForestModel, Node, Tree};
use flat_forest::{compile, ConfigBuilder, FeatureBatch};
use rand::prelude::*;

const NUM_NUMERICAL: usize = 8;
const VOCABULARY_SIZE: usize = 16;

fn data_spec() -> DataSpec {
    let mut columns: Vec<Column> = (0..NUM_NUMERICAL)
        .map(|i| Column::numerical(format!("x{}", i)))
        .collect();
    columns.push(Column::categorical("c", CategoricalSpec::integerized(VOCABULARY_SIZE)));
    DataSpec::new(columns)
}

fn node(rng: &mut StdRng, depth: usize) -> Node {
    if depth == 0 {
        return Node::leaf(rng.gen_range(-0.1..0.1));
    }
    let condition = if rng.gen_bool(0.8) {
        Condition::NumericalGreaterEqual {
            attribute: rng.gen_range(0..NUM_NUMERICAL),
            threshold: rng.gen_range(-1.0..1.0),
        }
    } else {
        Condition::CategoricalIsIn {
            attribute: NUM_NUMERICAL,
            mask: (0..VOCABULARY_SIZE as i64).filter(|_| rng.gen_bool(0.5)).collect(),
        }
    };
    Node::non_leaf(condition, node(rng, depth - 1), node(rng, depth - 1))
}

fn model(num_trees: usize, depth: usize) -> ForestModel {
    let mut rng = StdRng::seed_from_u64(42);
    let trees = (0..num_trees).map(|_| Tree::new(node(&mut rng, depth))).collect();
    ForestModel::gradient_boosted(data_spec(), trees, vec![0.0], Activation::Sigmoid)
}

fn batch(num_examples: usize) -> FeatureBatch {
    let mut rng = StdRng::seed_from_u64(7);
    let mut batch = FeatureBatch::new();
    for i in 0..NUM_NUMERICAL {
        let values: Vec<f32> = (0..num_examples).map(|_| rng.gen_range(-1.5..1.5)).collect();
        batch.insert(format!("x{}", i), values);
    }
    let codes: Vec<i32> = (0..num_examples)
        .map(|_| rng.gen_range(0..VOCABULARY_SIZE as i32))
        .collect();
    batch.insert("c", codes);
    batch
}

fn bench_predict(c: &mut Criterion) {
    let model = model(100, 6);
    let mut group = c.benchmark_group("predict");

    for num_examples in [64usize, 4096] {
        let batch = batch(num_examples);
        for (name, routing, parallel) in [
            ("branching", RoutingMode::Branching, false),
            ("unified", RoutingMode::Unified, false),
            ("branching_parallel", RoutingMode::Branching, true),
        ] {
            let config = ConfigBuilder::new()
                .routing(routing)
                .parallel(parallel)
                .build()
                .unwrap();
            let compiled = compile(&model, &config).unwrap();
            group.bench_with_input(BenchmarkId::new(name, num_examples), &batch, |b, batch| {
                b.iter(|| compiled.predict(black_box(batch)).unwrap())
            });
        }
    }
    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    let model = model(100, 6);
    let config = ConfigBuilder::new().build().unwrap();
    c.bench_function("compile_100_trees", |b| {
        b.iter(|| compile(black_box(&model), &config).unwrap())
    });
}

criterion_group!(benches, bench_predict, bench_compile);
criterion_main!(benches);
