//! Frozen flat forest.

use crate::config::ConverterConfig;
use crate::core::error::{ForestError, Result};
use crate::core::types::{Activation, ConditionType, NodeOffset};
use crate::flatten::compact::CompactArray;
use crate::flatten::densify::{densify_conditions, raw_conditions, ConditionTable};
use crate::flatten::forest::InternalForest;
use crate::flatten::offset::BeginNodeIdx;
use crate::ensure;

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Read-only array form of a forest.
///
/// Non-leaf arrays are indexed by forest-wide non-leaf index, leaf arrays by
/// forest-wide leaf index, and per-tree arrays by tree index. Child and root
/// values are tree-relative offsets (see [`crate::flatten::offset`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlattenedForest {
    pub(crate) leaf_outputs: Vec<f32>,
    pub(crate) split_features: CompactArray,
    #[serde(with = "float_bits")]
    pub(crate) split_parameters: Vec<f32>,
    pub(crate) negative_children: CompactArray,
    pub(crate) positive_children: CompactArray,
    pub(crate) condition_table: ConditionTable,
    pub(crate) condition_codes: Option<CompactArray>,
    pub(crate) root_nodes: CompactArray,
    pub(crate) begin_non_leaf_nodes: CompactArray,
    pub(crate) begin_leaf_nodes: CompactArray,
    pub(crate) categorical_mask: Vec<bool>,
    pub(crate) categorical_vocabulary_sizes: Vec<usize>,
    pub(crate) initial_predictions: Vec<f32>,
    pub(crate) max_depth: usize,
    pub(crate) activation: Activation,
    num_trees: usize,
    num_non_leaf_nodes: usize,
}

/// Stores floats by their bit pattern, so that mask offsets bit-cast into
/// the parameter slot survive text formats unchanged.
mod float_bits {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub(super) fn serialize<S: Serializer>(values: &[f32], serializer: S) -> Result<S::Ok, S::Error> {
        values
            .iter()
            .map(|v| v.to_bits())
            .collect::<Vec<u32>>()
            .serialize(serializer)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f32>, D::Error> {
        let bits = Vec::<u32>::deserialize(deserializer)?;
        Ok(bits.into_iter().map(f32::from_bits).collect())
    }
}

impl InternalForest {
    /// Densifies condition kinds, narrows index arrays and freezes the forest.
    ///
    /// Fails with [`ForestError::EmptyForest`] if the forest has no tree or
    /// no non-leaf node.
    pub fn freeze(self, config: &ConverterConfig) -> Result<FlattenedForest> {
        ensure!(self.num_trees() > 0, ForestError::empty_forest("the forest has no trees"));
        ensure!(
            self.num_non_leaf_nodes() > 0,
            ForestError::empty_forest("the forest has no non-leaf nodes")
        );

        let compact = config.compact_arrays;
        let conditions = if config.densify_conditions {
            densify_conditions(&self.condition_types)
        } else {
            raw_conditions(&self.condition_types)
        };
        let condition_codes = match &conditions.codes {
            Some(codes) => Some(CompactArray::from_values(codes, compact)?),
            None => None,
        };

        let mut categorical_mask = self.categorical_mask;
        if categorical_mask.is_empty() {
            categorical_mask.push(false);
        }

        let forest = FlattenedForest {
            split_features: CompactArray::from_values(&self.split_features, compact)?,
            negative_children: CompactArray::from_values(&self.negative_children, compact)?,
            positive_children: CompactArray::from_values(&self.positive_children, compact)?,
            root_nodes: CompactArray::from_values(&self.root_nodes, compact)?,
            begin_non_leaf_nodes: CompactArray::from_values(&self.begin_non_leaf_nodes, compact)?,
            begin_leaf_nodes: CompactArray::from_values(&self.begin_leaf_nodes, compact)?,
            num_trees: self.root_nodes.len(),
            num_non_leaf_nodes: self.split_features.len(),
            leaf_outputs: self.leaf_outputs,
            split_parameters: self.split_parameters,
            condition_table: conditions.table,
            condition_codes,
            categorical_mask,
            categorical_vocabulary_sizes: self.categorical_vocabulary_sizes,
            initial_predictions: self.initial_predictions,
            max_depth: self.max_depth,
            activation: self.activation,
        };
        log::debug!(
            "Frozen forest: {} condition kind(s), {} bytes of index arrays",
            forest.condition_table.len(),
            forest.index_size_in_bytes()
        );
        Ok(forest)
    }
}

impl FlattenedForest {
    /// Number of trees.
    pub fn num_trees(&self) -> usize {
        self.num_trees
    }

    /// Number of non-leaf nodes across all trees.
    pub fn num_non_leaf_nodes(&self) -> usize {
        self.num_non_leaf_nodes
    }

    /// Number of leaves across all trees.
    pub fn num_leaf_nodes(&self) -> usize {
        self.leaf_outputs.len()
    }

    /// Number of model outputs.
    pub fn num_outputs(&self) -> usize {
        self.initial_predictions.len()
    }

    /// Number of routing iterations per tree.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Output activation.
    pub fn activation(&self) -> Activation {
        self.activation
    }

    /// Base prediction.
    pub fn initial_predictions(&self) -> &[f32] {
        &self.initial_predictions
    }

    /// Output of every leaf.
    pub fn leaf_outputs(&self) -> &[f32] {
        &self.leaf_outputs
    }

    /// Dispatch table of the stored condition codes.
    pub fn condition_table(&self) -> &ConditionTable {
        &self.condition_table
    }

    /// Per-node condition codes; `None` when every node has the same kind.
    pub fn condition_codes(&self) -> Option<&CompactArray> {
        self.condition_codes.as_ref()
    }

    /// Concatenated categorical bitmaps.
    pub fn categorical_mask(&self) -> &[bool] {
        &self.categorical_mask
    }

    /// Internal feature index tested by every non-leaf.
    pub fn split_features(&self) -> &CompactArray {
        &self.split_features
    }

    /// Threshold, or bit-cast mask offset, of every non-leaf.
    pub fn split_parameters(&self) -> &[f32] {
        &self.split_parameters
    }

    /// Negative child offset of every non-leaf.
    pub fn negative_children(&self) -> &CompactArray {
        &self.negative_children
    }

    /// Positive child offset of every non-leaf.
    pub fn positive_children(&self) -> &CompactArray {
        &self.positive_children
    }

    /// Root offset of `tree`.
    #[inline]
    pub fn root_offset(&self, tree: usize) -> NodeOffset {
        self.root_nodes.get(tree)
    }

    /// First leaf and non-leaf of `tree`.
    #[inline]
    pub fn begin(&self, tree: usize) -> BeginNodeIdx {
        BeginNodeIdx {
            leaf: self.begin_leaf_nodes.get(tree) as usize,
            non_leaf: self.begin_non_leaf_nodes.get(tree) as usize,
        }
    }

    /// Condition kind of a non-leaf node.
    #[inline]
    pub fn condition_kind(&self, node: usize) -> Option<ConditionType> {
        match &self.condition_codes {
            None => self.condition_table.single(),
            Some(codes) => self.condition_table.kind(codes.get(node)),
        }
    }

    /// Size in bytes of the narrowed index arrays.
    pub fn index_size_in_bytes(&self) -> usize {
        [
            &self.split_features,
            &self.negative_children,
            &self.positive_children,
            &self.root_nodes,
            &self.begin_non_leaf_nodes,
            &self.begin_leaf_nodes,
        ]
        .iter()
        .map(|array| array.size_in_bytes())
        .sum::<usize>()
            + self
                .condition_codes
                .as_ref()
                .map_or(0, CompactArray::size_in_bytes)
    }

    /// Serializes the arrays to JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses arrays written by [`FlattenedForest::to_json_string`] and
    /// validates them.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let forest: FlattenedForest = serde_json::from_str(json)?;
        forest.validate()?;
        Ok(forest)
    }

    fn tree_range(begins: &CompactArray, tree: usize, num_trees: usize, total: usize) -> Range<usize> {
        let start = begins.get(tree) as usize;
        let end = if tree + 1 < num_trees {
            begins.get(tree + 1) as usize
        } else {
            total
        };
        start..end
    }

    /// Checks the structural consistency of the arrays.
    ///
    /// Forests produced by [`InternalForest::freeze`] are always consistent;
    /// this guards forests read back from storage.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| ForestError::serialization(format!("invalid flattened forest: {}", reason));

        if self.num_trees == 0 || self.num_non_leaf_nodes == 0 {
            return Err(ForestError::empty_forest("the forest has no non-leaf nodes"));
        }
        for (name, len) in [
            ("split_features", self.split_features.len()),
            ("split_parameters", self.split_parameters.len()),
            ("negative_children", self.negative_children.len()),
            ("positive_children", self.positive_children.len()),
        ] {
            if len != self.num_non_leaf_nodes {
                return Err(invalid(format!(
                    "{} has {} entries, expected {}",
                    name, len, self.num_non_leaf_nodes
                )));
            }
        }
        if let Some(codes) = &self.condition_codes {
            if codes.len() != self.num_non_leaf_nodes {
                return Err(invalid("condition code count".to_string()));
            }
        } else if self.condition_table.single().is_none() {
            return Err(invalid("missing condition codes".to_string()));
        }
        for array in [&self.root_nodes, &self.begin_non_leaf_nodes, &self.begin_leaf_nodes] {
            if array.len() != self.num_trees {
                return Err(invalid("per-tree array length".to_string()));
            }
        }
        if self.initial_predictions.is_empty() {
            return Err(invalid("no initial prediction".to_string()));
        }
        if self.categorical_mask.is_empty() {
            return Err(invalid("empty categorical mask".to_string()));
        }

        let mut deepest_leaf = 0;
        for tree in 0..self.num_trees {
            let non_leaves = Self::tree_range(
                &self.begin_non_leaf_nodes,
                tree,
                self.num_trees,
                self.num_non_leaf_nodes,
            );
            let leaves = Self::tree_range(
                &self.begin_leaf_nodes,
                tree,
                self.num_trees,
                self.leaf_outputs.len(),
            );
            if non_leaves.start > non_leaves.end
                || non_leaves.end > self.num_non_leaf_nodes
                || leaves.start > leaves.end
                || leaves.end > self.leaf_outputs.len()
            {
                return Err(invalid(format!("tree {} has inconsistent begin indices", tree)));
            }
            let in_tree = |offset: NodeOffset| {
                if offset >= 0 {
                    (offset as usize) < non_leaves.len()
                } else {
                    ((-(offset as i64) - 1) as usize) < leaves.len()
                }
            };
            if !in_tree(self.root_offset(tree)) {
                return Err(invalid(format!("tree {} has an out of range root", tree)));
            }
            for node in non_leaves.clone() {
                if !in_tree(self.negative_children.get(node)) || !in_tree(self.positive_children.get(node)) {
                    return Err(invalid(format!("node {} has an out of range child", node)));
                }
                let kind = self
                    .condition_kind(node)
                    .ok_or_else(|| invalid(format!("node {} has an unknown condition code", node)))?;
                if kind == ConditionType::IsIn {
                    let feature = self.split_features.get(node);
                    let size = usize::try_from(feature)
                        .ok()
                        .and_then(|f| self.categorical_vocabulary_sizes.get(f))
                        .ok_or_else(|| invalid(format!("node {} tests an unknown categorical feature", node)))?;
                    let offset = self.split_parameters[node].to_bits() as usize;
                    if offset + size > self.categorical_mask.len() {
                        return Err(invalid(format!("node {} has an out of range mask", node)));
                    }
                }
            }

            // Each node has exactly one parent and every leaf is reachable
            // within `max_depth` routing steps.
            let mut seen_non_leaf = vec![false; non_leaves.len()];
            let mut seen_leaf = vec![false; leaves.len()];
            let mut stack = vec![(self.root_offset(tree), 0usize)];
            while let Some((offset, depth)) = stack.pop() {
                let seen = if offset < 0 {
                    &mut seen_leaf[(-(offset as i64) - 1) as usize]
                } else {
                    &mut seen_non_leaf[offset as usize]
                };
                if std::mem::replace(seen, true) {
                    return Err(invalid(format!("tree {} reaches a node twice", tree)));
                }
                if offset < 0 {
                    deepest_leaf = deepest_leaf.max(depth);
                    continue;
                }
                if depth >= self.max_depth {
                    return Err(invalid(format!(
                        "tree {} is deeper than max depth {}",
                        tree, self.max_depth
                    )));
                }
                let node = non_leaves.start + offset as usize;
                stack.push((self.negative_children.get(node), depth + 1));
                stack.push((self.positive_children.get(node), depth + 1));
            }
            if seen_non_leaf.iter().chain(&seen_leaf).any(|&seen| !seen) {
                return Err(invalid(format!("tree {} has unreachable nodes", tree)));
            }
        }
        if deepest_leaf != self.max_depth {
            return Err(invalid(format!(
                "max depth {} differs from the deepest leaf at depth {}",
                self.max_depth, deepest_leaf
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;
    use crate::flatten::compact::IntWidth;

    fn internal(conditions: Vec<ConditionType>) -> InternalForest {
        let n = conditions.len() as i64;
        InternalForest {
            leaf_outputs: vec![0.5; conditions.len() + 1],
            split_features: vec![0; conditions.len()],
            split_parameters: vec![0.0; conditions.len()],
            negative_children: (0..n).map(|i| -(i + 1)).collect(),
            positive_children: (0..n).map(|i| if i + 1 < n { i + 1 } else { -(n + 1) }).collect(),
            condition_types: conditions,
            root_nodes: vec![0],
            begin_non_leaf_nodes: vec![0],
            begin_leaf_nodes: vec![0],
            categorical_mask: vec![true, false, true],
            categorical_vocabulary_sizes: vec![3],
            initial_predictions: vec![0.0],
            max_depth: n as usize,
            activation: Activation::Identity,
        }
    }

    #[test]
    fn test_freeze_narrows_and_densifies() {
        let forest = internal(vec![ConditionType::IsIn, ConditionType::IsIn])
            .freeze(&ConverterConfig::default())
            .unwrap();
        assert_eq!(forest.split_features().width(), IntWidth::I8);
        assert!(forest.condition_codes().is_none());
        assert_eq!(forest.condition_kind(1), Some(ConditionType::IsIn));
        assert_eq!(forest.num_trees(), 1);
        assert_eq!(forest.num_non_leaf_nodes(), 2);
        assert_eq!(forest.num_leaf_nodes(), 3);
        forest.validate().unwrap();
    }

    #[test]
    fn test_freeze_without_densify_or_compaction() {
        let config = ConfigBuilder::new()
            .densify_conditions(false)
            .compact_arrays(false)
            .build()
            .unwrap();
        let forest = internal(vec![ConditionType::IsIn]).freeze(&config).unwrap();
        assert_eq!(forest.split_features().width(), IntWidth::I32);
        assert_eq!(forest.condition_table().len(), ConditionType::ALL.len());
        assert_eq!(forest.condition_codes().unwrap().to_vec(), vec![1]);
        assert_eq!(forest.condition_kind(0), Some(ConditionType::IsIn));
    }

    #[test]
    fn test_empty_forest() {
        let config = ConverterConfig::default();
        assert!(matches!(
            InternalForest::default().freeze(&config),
            Err(ForestError::EmptyForest { .. })
        ));

        let leaves_only = InternalForest {
            leaf_outputs: vec![1.0],
            root_nodes: vec![-1],
            begin_non_leaf_nodes: vec![0],
            begin_leaf_nodes: vec![0],
            initial_predictions: vec![0.0],
            ..InternalForest::default()
        };
        assert!(matches!(
            leaves_only.freeze(&config),
            Err(ForestError::EmptyForest { .. })
        ));
    }

    #[test]
    fn test_json_keeps_mask_offsets_exact() {
        let mut internal = internal(vec![ConditionType::IsIn]);
        internal.categorical_mask = vec![false; 10];
        internal.split_parameters = vec![f32::from_bits(7)];
        let forest = internal.freeze(&ConverterConfig::default()).unwrap();

        let restored = FlattenedForest::from_json_str(&forest.to_json_string().unwrap()).unwrap();
        assert_eq!(restored, forest);
        assert_eq!(restored.split_parameters()[0].to_bits(), 7);
    }

    #[test]
    fn test_validate_rejects_shallow_max_depth() {
        let mut forest = internal(vec![ConditionType::GreaterEqual; 3])
            .freeze(&ConverterConfig::default())
            .unwrap();
        forest.max_depth = 2;
        assert!(forest.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_child() {
        let mut forest = internal(vec![ConditionType::GreaterEqual])
            .freeze(&ConverterConfig::default())
            .unwrap();
        forest.negative_children = CompactArray::I8(vec![-9]);
        assert!(forest.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_deep_max_depth() {
        let mut forest = internal(vec![ConditionType::GreaterEqual; 3])
            .freeze(&ConverterConfig::default())
            .unwrap();
        forest.max_depth = 4;
        assert!(forest.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_shared_children() {
        // Both children of every node point at the next node: a chain that
        // would describe 2^40 paths if nodes could have several parents.
        let n = 40;
        let mut forest = internal(vec![ConditionType::GreaterEqual; n])
            .freeze(&ConverterConfig::default())
            .unwrap();
        let chain: Vec<i64> = (0..n as i64).map(|i| if i + 1 < n as i64 { i + 1 } else { -1 }).collect();
        forest.negative_children = CompactArray::from_values(&chain, true).unwrap();
        forest.positive_children = forest.negative_children.clone();
        forest.leaf_outputs.truncate(1);

        let start = std::time::Instant::now();
        assert!(matches!(forest.validate(), Err(ForestError::Serialization { .. })));
        let json = forest.to_json_string().unwrap();
        assert!(FlattenedForest::from_json_str(&json).is_err());
        assert!(start.elapsed() < std::time::Duration::from_secs(1));
    }

    #[test]
    fn test_validate_rejects_unreachable_leaf() {
        let mut forest = internal(vec![ConditionType::GreaterEqual])
            .freeze(&ConverterConfig::default())
            .unwrap();
        forest.leaf_outputs.push(0.0);
        assert!(forest.validate().is_err());
    }
}
