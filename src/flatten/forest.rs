//! Forest flattening.
//!
//! [`InternalForest::build`] walks every tree in pre-order, negative child
//! first, and appends each node to the flat arrays. A non-leaf receives its
//! index when it is visited; its two child slots hold
//! [`UNRESOLVED_CHILD`] until the children are flattened, at which point the
//! child offsets are written back into the parent.

use crate::core::constants::UNRESOLVED_CHILD;
use crate::core::error::{ForestError, Result};
use crate::core::types::{Activation, ConditionType};
use crate::features::FeatureSpec;
use crate::flatten::mask::categorical_list_to_bitmap;
use crate::flatten::offset::{BeginNodeIdx, NodeIdx};
use crate::model::{Condition, DataSpec, ForestModel, LeafValue, Node, Tree};

/// Parent slot receiving the offset of a flattened node.
#[derive(Debug, Clone, Copy)]
enum ChildSlot {
    Root,
    Negative(usize),
    Positive(usize),
}

/// Growable flat arrays of a forest.
///
/// Index arrays are kept as `i64` until the forest is frozen, where they are
/// narrowed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InternalForest {
    /// Output value of every leaf
    pub leaf_outputs: Vec<f32>,
    /// Internal feature index tested by every non-leaf
    pub split_features: Vec<i64>,
    /// Threshold, or bit-cast mask offset for `IsIn`, of every non-leaf
    pub split_parameters: Vec<f32>,
    /// Offset of the negative child of every non-leaf
    pub negative_children: Vec<i64>,
    /// Offset of the positive child of every non-leaf
    pub positive_children: Vec<i64>,
    /// Raw condition kind of every non-leaf
    pub condition_types: Vec<ConditionType>,
    /// Root offset of every tree
    pub root_nodes: Vec<i64>,
    /// First non-leaf of every tree
    pub begin_non_leaf_nodes: Vec<i64>,
    /// First leaf of every tree
    pub begin_leaf_nodes: Vec<i64>,
    /// Concatenated bitmaps of all `IsIn` conditions
    pub categorical_mask: Vec<bool>,
    /// Vocabulary size of every internal categorical feature
    pub categorical_vocabulary_sizes: Vec<usize>,
    /// Base prediction
    pub initial_predictions: Vec<f32>,
    /// Deepest leaf depth across all trees
    pub max_depth: usize,
    /// Output activation
    pub activation: Activation,
}

impl InternalForest {
    /// Flattens every tree of `model`.
    ///
    /// Either the whole forest is flattened or an error is returned; no
    /// partial forest escapes.
    pub fn build(model: &ForestModel, feature_spec: &FeatureSpec) -> Result<Self> {
        let categorical_vocabulary_sizes = categorical_vocabulary_sizes(model, feature_spec)?;

        let mut forest = InternalForest {
            categorical_vocabulary_sizes,
            initial_predictions: model.initial_predictions(),
            activation: model.activation(),
            ..InternalForest::default()
        };

        for tree in &model.trees {
            forest.add_tree(tree, feature_spec, &model.data_spec)?;
        }

        log::info!(
            "Flattened {} tree(s): {} non-leaf node(s), {} leaf node(s), max depth {}",
            forest.num_trees(),
            forest.num_non_leaf_nodes(),
            forest.num_leaf_nodes(),
            forest.max_depth
        );
        Ok(forest)
    }

    /// Number of flattened trees.
    pub fn num_trees(&self) -> usize {
        self.root_nodes.len()
    }

    /// Number of flattened non-leaf nodes.
    pub fn num_non_leaf_nodes(&self) -> usize {
        self.split_features.len()
    }

    /// Number of flattened leaves.
    pub fn num_leaf_nodes(&self) -> usize {
        self.leaf_outputs.len()
    }

    fn begin(&self) -> BeginNodeIdx {
        BeginNodeIdx {
            leaf: self.num_leaf_nodes(),
            non_leaf: self.num_non_leaf_nodes(),
        }
    }

    /// Appends one tree.
    ///
    /// On error the nodes already appended for `tree` are removed and the
    /// forest is left as it was before the call.
    pub fn add_tree(
        &mut self,
        tree: &Tree,
        feature_spec: &FeatureSpec,
        data_spec: &DataSpec,
    ) -> Result<()> {
        let begin = self.begin();
        let mask_len = self.categorical_mask.len();
        let max_depth = self.max_depth;

        let result = self.push_tree(tree, feature_spec, data_spec, begin);
        if result.is_err() {
            self.split_features.truncate(begin.non_leaf);
            self.split_parameters.truncate(begin.non_leaf);
            self.condition_types.truncate(begin.non_leaf);
            self.negative_children.truncate(begin.non_leaf);
            self.positive_children.truncate(begin.non_leaf);
            self.leaf_outputs.truncate(begin.leaf);
            self.categorical_mask.truncate(mask_len);
            self.max_depth = max_depth;
        }
        result
    }

    fn push_tree(
        &mut self,
        tree: &Tree,
        feature_spec: &FeatureSpec,
        data_spec: &DataSpec,
        begin: BeginNodeIdx,
    ) -> Result<()> {
        let mut root = None;
        let mut stack = vec![(&tree.root, 0usize, ChildSlot::Root)];

        while let Some((node, depth, slot)) = stack.pop() {
            let idx = match node {
                Node::Leaf { value } => {
                    self.max_depth = self.max_depth.max(depth);
                    self.push_leaf(value)?
                }
                Node::NonLeaf {
                    condition,
                    negative_child,
                    positive_child,
                } => {
                    let idx = self.push_non_leaf(condition, feature_spec, data_spec)?;
                    stack.push((positive_child.as_ref(), depth + 1, ChildSlot::Positive(idx)));
                    stack.push((negative_child.as_ref(), depth + 1, ChildSlot::Negative(idx)));
                    NodeIdx::NonLeaf(idx)
                }
            };

            let offset = idx.offset(begin);
            match slot {
                ChildSlot::Root => root = Some(offset),
                ChildSlot::Negative(parent) => self.negative_children[parent] = offset,
                ChildSlot::Positive(parent) => self.positive_children[parent] = offset,
            }
        }

        debug_assert!(!self.negative_children[begin.non_leaf..]
            .iter()
            .chain(&self.positive_children[begin.non_leaf..])
            .any(|&child| child == UNRESOLVED_CHILD));

        self.root_nodes.push(root.unwrap_or(0));
        self.begin_non_leaf_nodes.push(begin.non_leaf as i64);
        self.begin_leaf_nodes.push(begin.leaf as i64);
        Ok(())
    }

    fn push_leaf(&mut self, value: &LeafValue) -> Result<NodeIdx> {
        let output = match value {
            LeafValue::Regression(output) => *output,
            other => return Err(ForestError::unsupported_leaf(other.to_string())),
        };
        self.leaf_outputs.push(output);
        Ok(NodeIdx::Leaf(self.leaf_outputs.len() - 1))
    }

    fn push_non_leaf(
        &mut self,
        condition: &Condition,
        feature_spec: &FeatureSpec,
        data_spec: &DataSpec,
    ) -> Result<usize> {
        let (feature, parameter, kind, bitmap) = match condition {
            Condition::NumericalGreaterEqual {
                attribute,
                threshold,
            } => {
                let feature = feature_spec
                    .numerical_index(*attribute)
                    .ok_or(ForestError::UnknownFeature { column: *attribute })?;
                (feature, *threshold, ConditionType::GreaterEqual, None)
            }
            Condition::CategoricalIsIn { attribute, mask } => {
                let feature = feature_spec
                    .categorical_index(*attribute)
                    .ok_or(ForestError::UnknownFeature { column: *attribute })?;
                let column = data_spec
                    .column(*attribute)
                    .ok_or(ForestError::UnknownFeature { column: *attribute })?;
                let bitmap = categorical_list_to_bitmap(mask, column.vocabulary_size(), &column.name)?;
                let mask_offset = u32::try_from(self.categorical_mask.len()).map_err(|_| {
                    ForestError::ArrayWidthOverflow {
                        min: 0,
                        max: self.categorical_mask.len() as i64,
                    }
                })?;
                // Stored bit-for-bit in the float slot; decoded with `to_bits`.
                let parameter = f32::from_bits(mask_offset);
                (feature, parameter, ConditionType::IsIn, Some(bitmap))
            }
            other => return Err(ForestError::unsupported_condition(other.to_string())),
        };

        if let Some(bitmap) = bitmap {
            self.categorical_mask.extend(bitmap);
        }
        self.split_features.push(feature as i64);
        self.split_parameters.push(parameter);
        self.condition_types.push(kind);
        self.negative_children.push(UNRESOLVED_CHILD);
        self.positive_children.push(UNRESOLVED_CHILD);
        Ok(self.split_features.len() - 1)
    }
}

fn categorical_vocabulary_sizes(model: &ForestModel, feature_spec: &FeatureSpec) -> Result<Vec<usize>> {
    let mut sizes = vec![0; feature_spec.categorical().len()];
    for feature in &model.input_features {
        if let Some(idx) = feature_spec.categorical_index(feature.column_idx) {
            let column = model
                .data_spec
                .column(feature.column_idx)
                .ok_or(ForestError::UnknownFeature {
                    column: feature.column_idx,
                })?;
            sizes[idx] = column.vocabulary_size();
        }
    }
    Ok(sizes)
}
