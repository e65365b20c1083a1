//! Property tests of the flat layout and of the router.

use flat_forest::core::types::{Activation, ConditionType, RoutingMode};
use flat_forest::flatten::mask::categorical_list_to_bitmap;
use flat_forest::flatten::offset::{leaf_index, BeginNodeIdx, NodeIdx};
use flat_forest::inference::router::{next_offset, route_lanes, route_tree, ExampleRef};
use flat_forest::model::{CategoricalSpec, Column, Condition, DataSpec, ForestModel, Node, Tree};
use flat_forest::*;
use proptest::prelude::*;
use rand::{rngs::StdRng, SeedableRng};

mod common;
use common::*;

fn compiled(model: &ForestModel) -> CompiledForest {
    compile(model, &ConverterConfig::default()).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_offset_bijection(leaf in 0usize..10_000, non_leaf in 0usize..10_000, local in 0usize..10_000) {
        let begin = BeginNodeIdx { leaf, non_leaf };
        for node in [NodeIdx::Leaf(leaf + local), NodeIdx::NonLeaf(non_leaf + local)] {
            let offset = node.offset(begin);
            prop_assert_eq!(offset < 0, node.is_leaf());
            prop_assert_eq!(NodeIdx::from_offset(offset, begin), node);
            prop_assert_eq!(NodeIdx::from_offset(offset, begin).offset(begin), offset);
        }
    }

    #[test]
    fn prop_stored_offsets_stay_in_their_tree(seed in any::<u64>()) {
        let model = random_model(seed, 6, 6, vec![0.0], Activation::Identity);
        let forest = flatten(&model, &ConverterConfig::default()).unwrap();

        for (tree_idx, tree) in model.trees.iter().enumerate() {
            let begin = forest.begin(tree_idx);
            let leaves = begin.leaf..begin.leaf + tree.num_leaves();
            let non_leaves = begin.non_leaf..begin.non_leaf + tree.num_non_leaves();
            let mut offsets = vec![forest.root_offset(tree_idx)];
            for node in non_leaves.clone() {
                offsets.push(forest.negative_children().get(node));
                offsets.push(forest.positive_children().get(node));
            }
            for offset in offsets {
                match NodeIdx::from_offset(offset as i64, begin) {
                    NodeIdx::Leaf(idx) => prop_assert!(leaves.contains(&idx)),
                    NodeIdx::NonLeaf(idx) => prop_assert!(non_leaves.contains(&idx)),
                }
            }
        }
    }

    #[test]
    fn prop_leaves_absorb(seed in any::<u64>(), offset in -64i32..0) {
        let model = random_model(seed, 3, 5, vec![0.0], Activation::Identity);
        let compiled = compiled(&model);
        let forest = compiled.forest();
        let values = compiled.feature_spec().convert_features(&random_batch(seed, 4)).unwrap();
        for row in 0..values.num_examples() {
            let example = ExampleRef::new(&values, row);
            for tree in 0..forest.num_trees() {
                let begin = forest.begin(tree);
                prop_assert_eq!(next_offset(forest, begin.non_leaf, offset, &example), offset);
            }
        }
    }

    #[test]
    fn prop_mask_round_trip(members in proptest::collection::btree_set(0i64..32, 0..32), extra in 0usize..8) {
        let vocabulary_size = 32 + extra;
        let items: Vec<i64> = members.iter().copied().collect();
        let bitmap = categorical_list_to_bitmap(&items, vocabulary_size, "c").unwrap();
        prop_assert_eq!(bitmap.len(), vocabulary_size);
        for code in 0..vocabulary_size as i64 {
            prop_assert_eq!(bitmap[code as usize], members.contains(&code));
        }
    }

    #[test]
    fn prop_routing_modes_agree(seed in any::<u64>(), rows in 1usize..150) {
        let model = random_model(seed, 5, 6, vec![0.0], Activation::Identity);
        let batch = random_batch(seed ^ 0x5eed, rows);
        let branching = ConfigBuilder::new().routing(RoutingMode::Branching).parallel(false).build().unwrap();
        let unified = ConfigBuilder::new().routing(RoutingMode::Unified).parallel(false).build().unwrap();

        let a = compile(&model, &branching).unwrap().predict(&batch).unwrap();
        let b = compile(&model, &unified).unwrap().predict(&batch).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_densifier_is_transparent(seed in any::<u64>()) {
        let model = random_model(seed, 5, 5, vec![0.1], Activation::Sigmoid);
        let batch = random_batch(seed.wrapping_add(1), 40);
        let raw = ConfigBuilder::new().densify_conditions(false).build().unwrap();

        let dense = compile(&model, &ConverterConfig::default()).unwrap();
        let sparse = compile(&model, &raw).unwrap();
        prop_assert_eq!(dense.predict(&batch).unwrap(), sparse.predict(&batch).unwrap());
    }
}

#[test]
fn test_mask_offsets_point_at_their_slice() {
    let data_spec = DataSpec::new(vec![
        Column::categorical("a", CategoricalSpec::integerized(3)),
        Column::categorical("b", CategoricalSpec::integerized(6)),
    ]);
    let sets: Vec<(usize, Vec<i64>)> = vec![(0, vec![2]), (1, vec![0, 5]), (0, vec![]), (1, vec![1, 2, 3])];
    let mut node = Node::leaf(0.0);
    for (attribute, mask) in sets.iter().rev() {
        node = Node::non_leaf(
            Condition::CategoricalIsIn {
                attribute: *attribute,
                mask: mask.clone(),
            },
            node,
            Node::leaf(1.0),
        );
    }
    let model = ForestModel::gradient_boosted(data_spec.clone(), vec![Tree::new(node)], vec![0.0], Activation::Identity);
    let forest = flatten(&model, &ConverterConfig::default()).unwrap();

    assert!(forest.condition_codes().is_none());
    assert_eq!(forest.condition_table().single(), Some(ConditionType::IsIn));
    for (node, (attribute, members)) in sets.iter().enumerate() {
        let vocabulary_size = data_spec.columns[*attribute].vocabulary_size();
        let start = forest.split_parameters()[node].to_bits() as usize;
        let slice = &forest.categorical_mask()[start..start + vocabulary_size];
        for code in 0..vocabulary_size {
            assert_eq!(slice[code], members.contains(&(code as i64)), "node {} code {}", node, code);
        }
    }
}

#[test]
fn test_depth_bound() {
    let mut rng = StdRng::seed_from_u64(5);
    let depth = 6;
    // A full tree and a stump: shallow paths must wait in their leaf.
    let trees = vec![full_tree(&mut rng, depth), full_tree(&mut rng, 1)];
    let model = ForestModel::gradient_boosted(mixed_data_spec(), trees, vec![0.0], Activation::Identity);
    let compiled = compiled(&model);
    let forest = compiled.forest();
    assert_eq!(forest.max_depth(), depth);

    let batch = random_batch(6, 100);
    let values = compiled.feature_spec().convert_features(&batch).unwrap();
    for row in 0..values.num_examples() {
        let example = ExampleRef::new(&values, row);
        for (tree_idx, tree) in model.trees.iter().enumerate() {
            let begin = forest.begin(tree_idx);
            let mut offset = forest.root_offset(tree_idx);
            for step in 0..depth {
                offset = next_offset(forest, begin.non_leaf, offset, &example);
                if tree_idx == 0 {
                    // Every path of a full tree needs all the steps.
                    assert_eq!(offset < 0, step + 1 == depth);
                }
            }
            assert!(offset < 0);
            let leaf = leaf_index(begin.leaf, offset);
            assert_eq!(leaf, route_tree(forest, tree_idx, &example));
            assert_eq!(
                forest.leaf_outputs()[leaf],
                reference_leaf(tree, &model.data_spec, &batch, row)
            );
        }
    }
}

#[test]
fn test_lanes_reach_the_same_leaves() {
    let model = random_model(77, 10, 8, vec![0.0], Activation::Identity);
    let compiled = compiled(&model);
    let forest = compiled.forest();
    let values = compiled
        .feature_spec()
        .convert_features(&random_batch(78, 97))
        .unwrap();
    let examples: Vec<_> = (0..values.num_examples())
        .map(|row| ExampleRef::new(&values, row))
        .collect();
    let leaves = compiled.predict_leaf_indices(&values).unwrap();

    let mut offsets = vec![0; examples.len()];
    for tree in 0..forest.num_trees() {
        route_lanes(forest, tree, &examples, &mut offsets);
        let begin_leaf = forest.begin(tree).leaf;
        for (row, &offset) in offsets.iter().enumerate() {
            assert_eq!(leaf_index(begin_leaf, offset), leaves[[row, tree]]);
        }
    }
}
