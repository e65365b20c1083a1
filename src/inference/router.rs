//! Fixed-iteration tree routing.
//!
//! A tree is walked by repeatedly applying one transition to a node offset,
//! exactly `max_depth` times. A negative offset designates a leaf and is a
//! fixed point of the transition, so an example reaching a leaf early stays
//! there for the remaining iterations.
//!
//! Two evaluation forms are provided and always agree:
//!
//! - [`route_tree`]: scalar, branches on the condition kind and stops as soon
//!   as a leaf is reached.
//! - [`route_lanes`]: walks many examples in lock-step. Every iteration reads
//!   a node for every lane, clamped in bounds, evaluates every condition kind
//!   and only then selects the result of the active ones.

use crate::core::types::{ConditionType, NodeOffset};
use crate::features::InternalFeatureValues;
use crate::flatten::offset::leaf_index;
use crate::flatten::FlattenedForest;

use ndarray::ArrayView1;

/// Feature values of one example, in the internal layout.
#[derive(Debug, Clone, Copy)]
pub struct ExampleRef<'a> {
    /// Numerical features
    pub numerical: ArrayView1<'a, f32>,
    /// Categorical codes
    pub categorical: ArrayView1<'a, i32>,
    /// Boolean features
    pub boolean: ArrayView1<'a, bool>,
}

impl<'a> ExampleRef<'a> {
    /// Row `row` of `values`.
    pub fn new(values: &'a InternalFeatureValues, row: usize) -> Self {
        ExampleRef {
            numerical: values.numerical.row(row),
            categorical: values.categorical.row(row),
            boolean: values.boolean.row(row),
        }
    }
}

/// Evaluates the condition of non-leaf `node`.
///
/// A NaN numerical value compares false. A categorical code outside the
/// feature's vocabulary is never in the set.
#[inline]
pub fn evaluate_condition(forest: &FlattenedForest, node: usize, example: &ExampleRef<'_>) -> bool {
    let feature = forest.split_features.get(node) as usize;
    let parameter = forest.split_parameters[node];
    match forest.condition_kind(node) {
        Some(ConditionType::GreaterEqual) => example
            .numerical
            .get(feature)
            .map_or(false, |&value| value >= parameter),
        Some(ConditionType::IsIn) => {
            let code = match example.categorical.get(feature) {
                Some(&code) if code >= 0 => code as usize,
                _ => return false,
            };
            let vocabulary_size = forest
                .categorical_vocabulary_sizes
                .get(feature)
                .copied()
                .unwrap_or(0);
            if code >= vocabulary_size {
                return false;
            }
            let mask_offset = parameter.to_bits() as usize;
            forest
                .categorical_mask
                .get(mask_offset + code)
                .copied()
                .unwrap_or(false)
        }
        None => false,
    }
}

/// Lane form of [`evaluate_condition`]: every condition kind is evaluated
/// with clamped reads and the one matching the node kind is selected.
#[inline]
pub fn evaluate_condition_unified(
    forest: &FlattenedForest,
    node: usize,
    example: &ExampleRef<'_>,
) -> bool {
    let feature = forest.split_features.get(node).max(0) as usize;
    let parameter = forest.split_parameters[node];

    let greater_equal = example
        .numerical
        .get(feature)
        .map_or(false, |&value| value >= parameter);

    let code = example.categorical.get(feature).copied().unwrap_or(-1);
    let vocabulary_size = forest
        .categorical_vocabulary_sizes
        .get(feature)
        .copied()
        .unwrap_or(0);
    let in_vocabulary = code >= 0 && (code as usize) < vocabulary_size;
    let mask_index = (parameter.to_bits() as usize)
        .saturating_add(code.max(0) as usize)
        .min(forest.categorical_mask.len() - 1);
    let is_in = in_vocabulary & forest.categorical_mask[mask_index];

    match forest.condition_kind(node) {
        Some(ConditionType::GreaterEqual) => greater_equal,
        Some(ConditionType::IsIn) => is_in,
        None => false,
    }
}

/// One routing step from `offset` within the tree starting at non-leaf
/// `begin_non_leaf`. Leaves are returned unchanged.
#[inline]
pub fn next_offset(
    forest: &FlattenedForest,
    begin_non_leaf: usize,
    offset: NodeOffset,
    example: &ExampleRef<'_>,
) -> NodeOffset {
    if offset < 0 {
        return offset;
    }
    let node = begin_non_leaf + offset as usize;
    if evaluate_condition(forest, node, example) {
        forest.positive_children.get(node)
    } else {
        forest.negative_children.get(node)
    }
}

/// Routes one example through `tree` and returns the forest-wide index of
/// the reached leaf.
#[inline]
pub fn route_tree(forest: &FlattenedForest, tree: usize, example: &ExampleRef<'_>) -> usize {
    let begin = forest.begin(tree);
    let mut offset = forest.root_offset(tree);
    for _ in 0..forest.max_depth {
        if offset < 0 {
            break;
        }
        offset = next_offset(forest, begin.non_leaf, offset, example);
    }
    leaf_index(begin.leaf, offset)
}

/// Routes every example of `examples` through `tree` in lock-step.
///
/// On return `offsets[i]` is the (negative) leaf offset reached by
/// `examples[i]`.
pub fn route_lanes(
    forest: &FlattenedForest,
    tree: usize,
    examples: &[ExampleRef<'_>],
    offsets: &mut [NodeOffset],
) {
    debug_assert_eq!(examples.len(), offsets.len());
    let begin = forest.begin(tree);
    let last_node = forest.num_non_leaf_nodes() - 1;
    offsets.fill(forest.root_offset(tree));

    for _ in 0..forest.max_depth {
        for (offset, example) in offsets.iter_mut().zip(examples) {
            let node = (begin.non_leaf + (*offset).max(0) as usize).min(last_node);
            let condition = evaluate_condition_unified(forest, node, example);
            let positive = forest.positive_children.get(node);
            let negative = forest.negative_children.get(node);
            let child = if condition { positive } else { negative };
            *offset = if *offset >= 0 { child } else { *offset };
        }
    }
}
