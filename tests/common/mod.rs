//! Common test utilities for flat-forest integration tests.

#![allow(dead_code)]

use flat_forest::core::types::Activation;
use flat_forest::model::{
    CategoricalSpec, Column, Condition, DataSpec, ForestModel, Node, Tree,
};
use flat_forest::{FeatureBatch, FeatureColumn};
use rand::prelude::*;

/// Number of numerical columns of [`mixed_data_spec`].
pub const NUM_NUMERICAL: usize = 3;

/// Number of categorical columns of [`mixed_data_spec`].
pub const NUM_CATEGORICAL: usize = 2;

/// Vocabulary size of every categorical column of [`mixed_data_spec`].
pub const VOCABULARY_SIZE: usize = 5;

/// Columns `x0..x2` (numerical) followed by `c0..c1` (integerized categorical).
pub fn mixed_data_spec() -> DataSpec {
    let mut columns: Vec<Column> = (0..NUM_NUMERICAL)
        .map(|i| Column::numerical(format!("x{}", i)))
        .collect();
    columns.extend((0..NUM_CATEGORICAL).map(|i| {
        Column::categorical(
            format!("c{}", i),
            CategoricalSpec::integerized(VOCABULARY_SIZE),
        )
    }));
    DataSpec::new(columns)
}

/// Single numerical column `x`.
pub fn numerical_data_spec() -> DataSpec {
    DataSpec::new(vec![Column::numerical("x")])
}

/// `x >= threshold ? high : low`
pub fn stump(threshold: f32, low: f32, high: f32) -> Tree {
    Tree::new(Node::non_leaf(
        Condition::NumericalGreaterEqual {
            attribute: 0,
            threshold,
        },
        Node::leaf(low),
        Node::leaf(high),
    ))
}

fn random_condition(rng: &mut StdRng, numerical_only: bool) -> Condition {
    if numerical_only || rng.gen_bool(0.5) {
        Condition::NumericalGreaterEqual {
            attribute: rng.gen_range(0..NUM_NUMERICAL),
            threshold: rng.gen_range(-2.0..2.0),
        }
    } else {
        let mask = (0..VOCABULARY_SIZE as i64)
            .filter(|_| rng.gen_bool(0.4))
            .collect();
        Condition::CategoricalIsIn {
            attribute: NUM_NUMERICAL + rng.gen_range(0..NUM_CATEGORICAL),
            mask,
        }
    }
}

fn random_node(rng: &mut StdRng, depth: usize, max_depth: usize, numerical_only: bool) -> Node {
    // The root is always a split so that every tree has a non-leaf.
    if depth == max_depth || (depth > 0 && rng.gen_bool(0.25)) {
        return Node::leaf(rng.gen_range(-1.0..1.0));
    }
    Node::non_leaf(
        random_condition(rng, numerical_only),
        random_node(rng, depth + 1, max_depth, numerical_only),
        random_node(rng, depth + 1, max_depth, numerical_only),
    )
}

/// Random tree over [`mixed_data_spec`] with leaves no deeper than `max_depth`.
pub fn random_tree(rng: &mut StdRng, max_depth: usize) -> Tree {
    Tree::new(random_node(rng, 0, max_depth.max(1), false))
}

/// Full binary tree of depth `depth` over numerical columns.
pub fn full_tree(rng: &mut StdRng, depth: usize) -> Tree {
    fn build(rng: &mut StdRng, remaining: usize) -> Node {
        if remaining == 0 {
            return Node::leaf(rng.gen_range(-1.0..1.0));
        }
        Node::non_leaf(
            random_condition(rng, true),
            build(rng, remaining - 1),
            build(rng, remaining - 1),
        )
    }
    Tree::new(build(rng, depth))
}

/// Seeded random gradient boosted model over [`mixed_data_spec`].
pub fn random_model(
    seed: u64,
    num_trees: usize,
    max_depth: usize,
    initial_predictions: Vec<f32>,
    activation: Activation,
) -> ForestModel {
    let mut rng = StdRng::seed_from_u64(seed);
    let trees = (0..num_trees)
        .map(|_| random_tree(&mut rng, max_depth))
        .collect();
    ForestModel::gradient_boosted(mixed_data_spec(), trees, initial_predictions, activation)
}

/// Seeded random batch for [`mixed_data_spec`].
///
/// Numerical values include NaN; categorical codes include values outside
/// the vocabulary.
pub fn random_batch(seed: u64, num_examples: usize) -> FeatureBatch {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut batch = FeatureBatch::new();
    for i in 0..NUM_NUMERICAL {
        let values: Vec<f32> = (0..num_examples)
            .map(|_| {
                if rng.gen_bool(0.05) {
                    f32::NAN
                } else {
                    rng.gen_range(-2.5..2.5)
                }
            })
            .collect();
        batch.insert(format!("x{}", i), values);
    }
    for i in 0..NUM_CATEGORICAL {
        let values: Vec<i32> = (0..num_examples)
            .map(|_| rng.gen_range(-1..VOCABULARY_SIZE as i32 + 2))
            .collect();
        batch.insert(format!("c{}", i), values);
    }
    batch
}

fn column_value(batch: &FeatureBatch, data_spec: &DataSpec, column: usize, row: usize) -> f64 {
    let name = &data_spec.columns[column].name;
    match batch.get(name) {
        Some(FeatureColumn::Float(values)) => values[row] as f64,
        Some(FeatureColumn::Int(values)) => values[row] as f64,
        Some(FeatureColumn::Bool(values)) => f64::from(u8::from(values[row])),
        other => panic!("unexpected column {} = {:?}", name, other),
    }
}

/// Leaf output reached by walking the owned tree.
pub fn reference_leaf(tree: &Tree, data_spec: &DataSpec, batch: &FeatureBatch, row: usize) -> f32 {
    let mut node = &tree.root;
    loop {
        match node {
            Node::Leaf { value } => match value {
                flat_forest::model::LeafValue::Regression(v) => return *v,
                other => panic!("unexpected leaf {:?}", other),
            },
            Node::NonLeaf {
                condition,
                negative_child,
                positive_child,
            } => {
                let positive = match condition {
                    Condition::NumericalGreaterEqual {
                        attribute,
                        threshold,
                    } => column_value(batch, data_spec, *attribute, row) as f32 >= *threshold,
                    Condition::CategoricalIsIn { attribute, mask } => {
                        let code = column_value(batch, data_spec, *attribute, row) as i64;
                        mask.contains(&code)
                    }
                    other => panic!("unexpected condition {:?}", other),
                };
                node = if positive { positive_child } else { negative_child };
            }
        }
    }
}

/// Raw (pre-activation) outputs computed by walking the owned trees.
pub fn reference_raw_predictions(model: &ForestModel, batch: &FeatureBatch) -> Vec<Vec<f32>> {
    let initial = model.initial_predictions();
    let k = initial.len();
    let rows = batch.batch_size().unwrap_or(0);
    (0..rows)
        .map(|row| {
            let mut outputs = initial.clone();
            for (t, tree) in model.trees.iter().enumerate() {
                outputs[t % k] += reference_leaf(tree, &model.data_spec, batch, row);
            }
            outputs
        })
        .collect()
}
