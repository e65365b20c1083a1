//! Decision tree structure of a trained model.
//!
//! Trees are owned recursive structures. Every non-leaf holds a typed
//! [`Condition`] and exactly two children; every leaf holds a [`LeafValue`].
//! The flattener only reads them.

use crate::core::types::ColumnIndex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Split condition of a non-leaf node.
///
/// A condition evaluating to true routes the example to the positive child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    /// `value(attribute) >= threshold`
    NumericalGreaterEqual { attribute: ColumnIndex, threshold: f32 },
    /// `value(attribute) in mask`, with `mask` a list of category codes
    CategoricalIsIn { attribute: ColumnIndex, mask: Vec<i64> },
    /// `value(attribute) == true`
    IsTrue { attribute: ColumnIndex },
    /// `value(attribute)` is missing
    IsMissing { attribute: ColumnIndex },
    /// Bucket index of a discretized numerical value `>= threshold`
    DiscretizedGreaterEqual { attribute: ColumnIndex, threshold: i32 },
    /// The categorical set `value(attribute)` intersects `mask`
    CategoricalSetContains { attribute: ColumnIndex, mask: Vec<i64> },
    /// `sum(weights[i] * value(attributes[i])) >= threshold`
    NumericalSparseOblique {
        attributes: Vec<ColumnIndex>,
        weights: Vec<f32>,
        threshold: f32,
    },
}

impl Condition {
    /// Short name of the condition kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Condition::NumericalGreaterEqual { .. } => "NumericalGreaterEqual",
            Condition::CategoricalIsIn { .. } => "CategoricalIsIn",
            Condition::IsTrue { .. } => "IsTrue",
            Condition::IsMissing { .. } => "IsMissing",
            Condition::DiscretizedGreaterEqual { .. } => "DiscretizedGreaterEqual",
            Condition::CategoricalSetContains { .. } => "CategoricalSetContains",
            Condition::NumericalSparseOblique { .. } => "NumericalSparseOblique",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::NumericalGreaterEqual { attribute, threshold } => {
                write!(f, "#{} >= {}", attribute, threshold)
            }
            Condition::CategoricalIsIn { attribute, mask } => {
                write!(f, "#{} in {:?}", attribute, mask)
            }
            Condition::IsTrue { attribute } => write!(f, "#{} is true", attribute),
            Condition::IsMissing { attribute } => write!(f, "#{} is missing", attribute),
            Condition::DiscretizedGreaterEqual { attribute, threshold } => {
                write!(f, "#{} >= bucket {}", attribute, threshold)
            }
            Condition::CategoricalSetContains { attribute, mask } => {
                write!(f, "#{} intersects {:?}", attribute, mask)
            }
            Condition::NumericalSparseOblique {
                attributes,
                weights,
                threshold,
            } => write!(f, "{:?} . {:?} >= {}", attributes, weights, threshold),
        }
    }
}

/// Output stored in a leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LeafValue {
    /// Single scalar output
    Regression(f32),
    /// Class probability distribution
    Probability(Vec<f32>),
    /// Treatment effect per outcome
    Uplift(Vec<f32>),
    /// Isolation forest leaf
    AnomalyDetection { num_examples_without_weight: u64 },
}

impl fmt::Display for LeafValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeafValue::Regression(value) => write!(f, "Regression({})", value),
            LeafValue::Probability(values) => write!(f, "Probability({:?})", values),
            LeafValue::Uplift(values) => write!(f, "Uplift({:?})", values),
            LeafValue::AnomalyDetection {
                num_examples_without_weight,
            } => write!(f, "AnomalyDetection({})", num_examples_without_weight),
        }
    }
}

/// Tree node: either a leaf or a non-leaf with two children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Terminal node
    Leaf { value: LeafValue },
    /// Internal node
    NonLeaf {
        condition: Condition,
        negative_child: Box<Node>,
        positive_child: Box<Node>,
    },
}

impl Node {
    /// Creates a regression leaf.
    pub fn leaf(value: f32) -> Self {
        Node::Leaf {
            value: LeafValue::Regression(value),
        }
    }

    /// Creates a leaf holding an arbitrary value.
    pub fn leaf_with(value: LeafValue) -> Self {
        Node::Leaf { value }
    }

    /// Creates a non-leaf node.
    pub fn non_leaf(condition: Condition, negative_child: Node, positive_child: Node) -> Self {
        Node::NonLeaf {
            condition,
            negative_child: Box::new(negative_child),
            positive_child: Box::new(positive_child),
        }
    }

    /// Returns true if this node is a leaf.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }
}

/// A single decision tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    /// Root node
    pub root: Node,
}

impl Tree {
    /// Creates a tree from its root node.
    pub fn new(root: Node) -> Self {
        Tree { root }
    }

    /// Number of leaf nodes.
    pub fn num_leaves(&self) -> usize {
        self.fold(|node, _| usize::from(node.is_leaf()))
    }

    /// Number of non-leaf nodes.
    pub fn num_non_leaves(&self) -> usize {
        self.fold(|node, _| usize::from(!node.is_leaf()))
    }

    /// Greatest depth of any leaf; a single-leaf tree has depth 0.
    pub fn max_depth(&self) -> usize {
        let mut max_depth = 0;
        self.visit(|node, depth| {
            if node.is_leaf() {
                max_depth = max_depth.max(depth);
            }
        });
        max_depth
    }

    fn fold<F: Fn(&Node, usize) -> usize>(&self, f: F) -> usize {
        let mut total = 0;
        self.visit(|node, depth| total += f(node, depth));
        total
    }

    /// Visits every node in depth-first pre-order, negative child first.
    pub fn visit<F: FnMut(&Node, usize)>(&self, mut f: F) {
        let mut stack = vec![(&self.root, 0usize)];
        while let Some((node, depth)) = stack.pop() {
            f(node, depth);
            if let Node::NonLeaf {
                negative_child,
                positive_child,
                ..
            } = node
            {
                stack.push((positive_child, depth + 1));
                stack.push((negative_child, depth + 1));
            }
        }
    }
}
