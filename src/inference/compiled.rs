//! Compiled forests and batched prediction.

use crate::config::ConverterConfig;
use crate::core::error::{ForestError, Result};
use crate::core::types::{ConditionType, NodeOffset, RoutingMode, Score};
use crate::features::{FeatureBatch, FeatureEncoding, FeatureSpec, InternalFeatureValues};
use crate::flatten::offset::leaf_index;
use crate::flatten::{FlattenedForest, InternalForest};
use crate::inference::activation::apply_activation;
use crate::inference::router::{route_lanes, route_tree, ExampleRef};
use crate::model::{ForestModel, ModelKind};
use crate::{config_error, ensure};

use ndarray::{Array1, Array2, ArrayViewMut1, ArrayViewMut2, Axis};
use rayon::prelude::*;
use std::sync::Arc;

/// Number of examples walked in lock-step by the unified router.
pub const LANE_BLOCK_SIZE: usize = 64;

/// Predictions of a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Predictions {
    /// One value per example
    Scalar(Array1<Score>),
    /// One row of `num_outputs` values per example
    Vector(Array2<Score>),
}

impl Predictions {
    fn from_outputs(outputs: Array2<Score>) -> Self {
        if outputs.ncols() == 1 {
            Predictions::Scalar(outputs.column(0).to_owned())
        } else {
            Predictions::Vector(outputs)
        }
    }

    /// Number of examples.
    pub fn num_examples(&self) -> usize {
        match self {
            Predictions::Scalar(values) => values.len(),
            Predictions::Vector(values) => values.nrows(),
        }
    }

    /// Scalar predictions, if the model has a single output.
    pub fn as_scalar(&self) -> Option<&Array1<Score>> {
        match self {
            Predictions::Scalar(values) => Some(values),
            Predictions::Vector(_) => None,
        }
    }

    /// Vector predictions, if the model has several outputs.
    pub fn as_vector(&self) -> Option<&Array2<Score>> {
        match self {
            Predictions::Scalar(_) => None,
            Predictions::Vector(values) => Some(values),
        }
    }

    /// Predictions as an `(examples, outputs)` matrix.
    pub fn into_array2(self) -> Array2<Score> {
        match self {
            Predictions::Scalar(values) => values.insert_axis(Axis(1)),
            Predictions::Vector(values) => values,
        }
    }
}

/// A flattened forest ready for prediction.
///
/// Holds everything needed to go from a caller's named feature batch to
/// predictions: the internal feature layout, the optional categorical
/// encoder, the arrays and the routing configuration.
#[derive(Debug, Clone)]
pub struct CompiledForest {
    forest: FlattenedForest,
    feature_spec: FeatureSpec,
    feature_encoding: Option<FeatureEncoding>,
    config: ConverterConfig,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl CompiledForest {
    /// Assembles a compiled forest from its parts.
    ///
    /// Checks that the arrays are consistent and only reference features
    /// known to `feature_spec`.
    pub fn from_parts(
        forest: FlattenedForest,
        feature_spec: FeatureSpec,
        feature_encoding: Option<FeatureEncoding>,
        config: ConverterConfig,
    ) -> Result<Self> {
        config.validate()?;
        forest.validate()?;
        check_feature_references(&forest, &feature_spec)?;

        let pool = if config.num_threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.num_threads)
                .build()
                .map_err(|e| config_error!("Failed to create thread pool: {}", e))?;
            Some(Arc::new(pool))
        } else {
            None
        };

        Ok(CompiledForest {
            forest,
            feature_spec,
            feature_encoding,
            config,
            pool,
        })
    }

    /// Flat arrays.
    pub fn forest(&self) -> &FlattenedForest {
        &self.forest
    }

    /// Internal feature layout.
    pub fn feature_spec(&self) -> &FeatureSpec {
        &self.feature_spec
    }

    /// Categorical string encoder, if any feature needs one.
    pub fn feature_encoding(&self) -> Option<&FeatureEncoding> {
        self.feature_encoding.as_ref()
    }

    /// Configuration used at compilation.
    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Number of outputs per example.
    pub fn num_outputs(&self) -> usize {
        self.forest.num_outputs()
    }

    /// Splits the compiled forest back into its parts.
    pub fn into_parts(self) -> (FlattenedForest, FeatureSpec, Option<FeatureEncoding>, ConverterConfig) {
        (
            self.forest,
            self.feature_spec,
            self.feature_encoding,
            self.config,
        )
    }

    /// Predicts a batch of already encoded features.
    ///
    /// The batch must hold exactly the model's input features. Categorical
    /// features must be integer codes; see [`CompiledForest::encode_and_predict`]
    /// for string values.
    pub fn predict(&self, batch: &FeatureBatch) -> Result<Predictions> {
        let values = self.feature_spec.convert_features(batch)?;
        Ok(Predictions::from_outputs(self.run(&values, true)))
    }

    /// Encodes categorical strings, then predicts.
    pub fn encode_and_predict(&self, batch: FeatureBatch) -> Result<Predictions> {
        let batch = match &self.feature_encoding {
            Some(encoding) => encoding.encode(batch),
            None => batch,
        };
        self.predict(&batch)
    }

    /// Activated predictions of features in the internal layout, as an
    /// `(examples, outputs)` matrix.
    ///
    /// `values` must match the layout of [`CompiledForest::feature_spec`].
    pub fn predict_internal(&self, values: &InternalFeatureValues) -> Result<Array2<Score>> {
        self.feature_spec.check_values(values)?;
        Ok(self.run(values, true))
    }

    /// Predictions before activation.
    pub fn predict_raw(&self, values: &InternalFeatureValues) -> Result<Array2<Score>> {
        self.feature_spec.check_values(values)?;
        Ok(self.run(values, false))
    }

    /// Forest-wide index of the leaf reached in every tree, as an
    /// `(examples, trees)` matrix.
    pub fn predict_leaf_indices(&self, values: &InternalFeatureValues) -> Result<Array2<usize>> {
        self.feature_spec.check_values(values)?;
        let num_trees = self.forest.num_trees();
        let mut leaves = Array2::zeros((values.num_examples(), num_trees));
        for (row, mut out) in leaves.axis_iter_mut(Axis(0)).enumerate() {
            let example = ExampleRef::new(values, row);
            for tree in 0..num_trees {
                out[tree] = route_tree(&self.forest, tree, &example);
            }
        }
        Ok(leaves)
    }

    fn run(&self, values: &InternalFeatureValues, activate: bool) -> Array2<Score> {
        let num_examples = values.num_examples();
        let mut outputs = Array2::zeros((num_examples, self.num_outputs()));
        let parallel = self.config.parallel && num_examples >= self.config.min_parallel_batch;
        log::trace!(
            "Predicting {} example(s), routing {:?}, parallel {}",
            num_examples,
            self.config.routing,
            parallel
        );

        match &self.pool {
            Some(pool) if parallel => pool.install(|| self.fill(values, outputs.view_mut(), activate, true)),
            _ => self.fill(values, outputs.view_mut(), activate, parallel),
        }
        outputs
    }

    fn fill(&self, values: &InternalFeatureValues, mut outputs: ArrayViewMut2<Score>, activate: bool, parallel: bool) {
        match (self.config.routing, parallel) {
            (RoutingMode::Branching, true) => outputs
                .axis_iter_mut(Axis(0))
                .into_par_iter()
                .enumerate()
                .for_each(|(row, out)| self.predict_row(values, row, out, activate)),
            (RoutingMode::Branching, false) => {
                for (row, out) in outputs.axis_iter_mut(Axis(0)).enumerate() {
                    self.predict_row(values, row, out, activate);
                }
            }
            (RoutingMode::Unified, true) => outputs
                .axis_chunks_iter_mut(Axis(0), LANE_BLOCK_SIZE)
                .into_par_iter()
                .enumerate()
                .for_each(|(block, out)| {
                    self.predict_block(values, block * LANE_BLOCK_SIZE, out, activate)
                }),
            (RoutingMode::Unified, false) => {
                for (block, out) in outputs.axis_chunks_iter_mut(Axis(0), LANE_BLOCK_SIZE).enumerate() {
                    self.predict_block(values, block * LANE_BLOCK_SIZE, out, activate);
                }
            }
        }
    }

    fn predict_row(&self, values: &InternalFeatureValues, row: usize, mut out: ArrayViewMut1<Score>, activate: bool) {
        let forest = &self.forest;
        let num_outputs = forest.num_outputs();
        let example = ExampleRef::new(values, row);

        for (slot, &initial) in out.iter_mut().zip(forest.initial_predictions()) {
            *slot = initial;
        }
        for tree in 0..forest.num_trees() {
            let leaf = route_tree(forest, tree, &example);
            out[tree % num_outputs] += forest.leaf_outputs[leaf];
        }
        if activate {
            apply_activation(forest.activation(), out);
        }
    }

    fn predict_block(&self, values: &InternalFeatureValues, start: usize, mut out: ArrayViewMut2<Score>, activate: bool) {
        let forest = &self.forest;
        let num_outputs = forest.num_outputs();
        let examples: Vec<ExampleRef<'_>> = (start..start + out.nrows())
            .map(|row| ExampleRef::new(values, row))
            .collect();
        let mut offsets: Vec<NodeOffset> = vec![0; examples.len()];

        for mut row in out.axis_iter_mut(Axis(0)) {
            for (slot, &initial) in row.iter_mut().zip(forest.initial_predictions()) {
                *slot = initial;
            }
        }
        for tree in 0..forest.num_trees() {
            route_lanes(forest, tree, &examples, &mut offsets);
            let begin_leaf = forest.begin(tree).leaf;
            for (lane, &offset) in offsets.iter().enumerate() {
                out[[lane, tree % num_outputs]] += forest.leaf_outputs[leaf_index(begin_leaf, offset)];
            }
        }
        if activate {
            for row in out.axis_iter_mut(Axis(0)) {
                apply_activation(forest.activation(), row);
            }
        }
    }
}

fn check_feature_references(forest: &FlattenedForest, feature_spec: &FeatureSpec) -> Result<()> {
    let num_categorical = feature_spec.categorical().len();
    if forest.categorical_vocabulary_sizes.len() != num_categorical {
        return Err(ForestError::serialization(format!(
            "forest knows {} categorical feature(s), the feature layout {}",
            forest.categorical_vocabulary_sizes.len(),
            num_categorical
        )));
    }
    for node in 0..forest.num_non_leaf_nodes() {
        let feature = forest.split_features().get(node);
        let group_size = match forest.condition_kind(node) {
            Some(ConditionType::GreaterEqual) => feature_spec.numerical().len(),
            Some(ConditionType::IsIn) => num_categorical,
            None => 0,
        };
        if feature < 0 || feature as usize >= group_size {
            return Err(ForestError::serialization(format!(
                "node {} tests feature {} outside of its group of {}",
                node, feature, group_size
            )));
        }
    }
    Ok(())
}

/// Flattens `model` into a [`CompiledForest`].
///
/// Only gradient boosted trees are supported. A multi-output model must have
/// a zero base prediction and a number of trees multiple of its number of
/// outputs; tree `t` contributes to output `t % num_outputs`.
pub fn compile(model: &ForestModel, config: &ConverterConfig) -> Result<CompiledForest> {
    compile_model(model, config).map_err(|e| {
        log::error!("Model conversion failed [{}]: {}", e.category(), e);
        e
    })
}

fn compile_model(model: &ForestModel, config: &ConverterConfig) -> Result<CompiledForest> {
    config.validate()?;
    ensure!(
        !matches!(model.kind, ModelKind::RandomForest),
        ForestError::unsupported_model("RandomForest")
    );

    let initial_predictions = model.initial_predictions();
    if initial_predictions.is_empty()
        || (initial_predictions.len() > 1 && initial_predictions.iter().any(|&v| v != 0.0))
    {
        return Err(ForestError::UnsupportedInitialPrediction {
            values: initial_predictions,
        });
    }
    let num_outputs = initial_predictions.len();
    ensure!(
        model.trees.len() % num_outputs == 0,
        ForestError::invalid_parameter(
            "trees",
            model.trees.len().to_string(),
            format!("not a multiple of the {} model outputs", num_outputs),
        )
    );

    let feature_spec = FeatureSpec::new(&model.input_features)?;
    let feature_encoding = FeatureEncoding::build_with_code(
        &model.input_features,
        &model.data_spec,
        config.out_of_vocabulary_code,
    );
    let forest = InternalForest::build(model, &feature_spec)?.freeze(config)?;

    log::info!(
        "Compiled forest: {} tree(s), {} output(s), {} activation, {:?} routing",
        forest.num_trees(),
        forest.num_outputs(),
        forest.activation(),
        config.routing
    );
    CompiledForest::from_parts(forest, feature_spec, feature_encoding, config.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;
    use crate::core::types::Activation;
    use crate::model::{Column, Condition, DataSpec, Node, Tree};
    use approx::assert_relative_eq;

    fn stump(threshold: f32, low: f32, high: f32) -> Tree {
        Tree::new(Node::non_leaf(
            Condition::NumericalGreaterEqual {
                attribute: 0,
                threshold,
            },
            Node::leaf(low),
            Node::leaf(high),
        ))
    }

    fn model(trees: Vec<Tree>, initial: Vec<f32>, activation: Activation) -> ForestModel {
        ForestModel::gradient_boosted(DataSpec::new(vec![Column::numerical("x")]), trees, initial, activation)
    }

    fn batch(x: Vec<f32>) -> FeatureBatch {
        FeatureBatch::new().with("x", x)
    }

    #[test]
    fn test_sum_onto_initial_prediction() {
        let model = model(
            vec![stump(0.0, -1.0, 1.0), stump(1.0, 0.0, 2.0)],
            vec![0.5],
            Activation::Identity,
        );
        let compiled = compile(&model, &ConverterConfig::default()).unwrap();
        let predictions = compiled.predict(&batch(vec![-1.0, 0.5, 1.0])).unwrap();
        let values = predictions.as_scalar().unwrap();
        assert_relative_eq!(values[0], -0.5);
        assert_relative_eq!(values[1], 1.5);
        assert_relative_eq!(values[2], 3.5);
    }

    #[test]
    fn test_multi_output_interleaves_trees() {
        let model = model(
            vec![
                stump(0.0, 1.0, 2.0),
                stump(0.0, 10.0, 20.0),
                stump(0.0, 3.0, 4.0),
                stump(0.0, 30.0, 40.0),
            ],
            vec![0.0, 0.0],
            Activation::Identity,
        );
        let compiled = compile(&model, &ConverterConfig::default()).unwrap();
        let predictions = compiled.predict(&batch(vec![-1.0, 1.0])).unwrap();
        let values = predictions.as_vector().unwrap();
        assert_eq!(values.shape(), &[2, 2]);
        assert_relative_eq!(values[[0, 0]], 4.0);
        assert_relative_eq!(values[[0, 1]], 40.0);
        assert_relative_eq!(values[[1, 0]], 6.0);
        assert_relative_eq!(values[[1, 1]], 60.0);
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let model = model(
            vec![stump(0.0, 1.0, 2.0), stump(0.0, 0.5, 3.0), stump(0.0, -1.0, 0.0)],
            vec![0.0; 3],
            Activation::Softmax,
        );
        let compiled = compile(&model, &ConverterConfig::default()).unwrap();
        let values = compiled
            .predict(&batch(vec![-2.0, 2.0]))
            .unwrap()
            .into_array2();
        for row in values.axis_iter(Axis(0)) {
            assert_relative_eq!(row.sum(), 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_rejections() {
        let config = ConverterConfig::default();

        let mut random_forest = model(vec![stump(0.0, 0.0, 1.0)], vec![0.0], Activation::Identity);
        random_forest.kind = ModelKind::RandomForest;
        assert!(matches!(
            compile(&random_forest, &config),
            Err(ForestError::UnsupportedModel { .. })
        ));

        let biased = model(vec![stump(0.0, 0.0, 1.0); 2], vec![0.1, 0.0], Activation::Softmax);
        assert!(matches!(
            compile(&biased, &config),
            Err(ForestError::UnsupportedInitialPrediction { .. })
        ));

        let uneven = model(vec![stump(0.0, 0.0, 1.0); 3], vec![0.0, 0.0], Activation::Softmax);
        assert!(matches!(
            compile(&uneven, &config),
            Err(ForestError::InvalidParameter { .. })
        ));

        let empty = model(vec![], vec![0.0], Activation::Identity);
        assert!(matches!(compile(&empty, &config), Err(ForestError::EmptyForest { .. })));

        let leaves_only = model(vec![Tree::new(Node::leaf(1.0))], vec![0.0], Activation::Identity);
        assert!(matches!(
            compile(&leaves_only, &config),
            Err(ForestError::EmptyForest { .. })
        ));
    }

    #[test]
    fn test_routing_modes_and_thread_pool_agree() {
        let model = model(
            (0..8).map(|i| stump(i as f32 * 0.25, -(i as f32), i as f32 * 0.5)).collect(),
            vec![0.25],
            Activation::Sigmoid,
        );
        let x: Vec<f32> = (0..300).map(|i| (i as f32 - 150.0) / 60.0).collect();
        let reference = compile(&model, &ConfigBuilder::new().parallel(false).build().unwrap())
            .unwrap()
            .predict(&batch(x.clone()))
            .unwrap();

        for (routing, parallel, threads) in [
            (RoutingMode::Branching, true, 0),
            (RoutingMode::Branching, true, 2),
            (RoutingMode::Unified, false, 0),
            (RoutingMode::Unified, true, 2),
        ] {
            let config = ConfigBuilder::new()
                .routing(routing)
                .parallel(parallel)
                .min_parallel_batch(16)
                .num_threads(threads)
                .build()
                .unwrap();
            let predictions = compile(&model, &config).unwrap().predict(&batch(x.clone())).unwrap();
            assert_eq!(predictions, reference);
        }
    }

    #[test]
    fn test_leaf_indices() {
        let model = model(vec![stump(0.0, 1.0, 2.0), stump(5.0, 3.0, 4.0)], vec![0.0], Activation::Identity);
        let compiled = compile(&model, &ConverterConfig::default()).unwrap();
        let values = compiled.feature_spec().convert_features(&batch(vec![1.0, 6.0])).unwrap();
        let leaves = compiled.predict_leaf_indices(&values).unwrap();
        assert_eq!(leaves, ndarray::array![[1, 2], [1, 3]]);
    }

    #[test]
    fn test_raw_predictions_skip_activation() {
        let model = model(vec![stump(0.0, -2.0, 2.0)], vec![0.0], Activation::Sigmoid);
        let compiled = compile(&model, &ConverterConfig::default()).unwrap();
        let values = compiled.feature_spec().convert_features(&batch(vec![1.0])).unwrap();
        assert_relative_eq!(compiled.predict_raw(&values).unwrap()[[0, 0]], 2.0);
        assert_relative_eq!(compiled.predict_internal(&values).unwrap()[[0, 0]], 0.880_797, epsilon = 1e-6);
    }

    #[test]
    fn test_internal_values_must_match_layout() {
        let model = model(vec![stump(0.0, 1.0, 2.0)], vec![0.0], Activation::Identity);
        let compiled = compile(&model, &ConverterConfig::default()).unwrap();

        // No numerical column for a forest testing `x`.
        let missing = InternalFeatureValues {
            numerical: Array2::zeros((2, 0)),
            categorical: Array2::zeros((2, 0)),
            boolean: Array2::from_elem((2, 0), false),
        };
        assert!(matches!(
            compiled.predict_internal(&missing),
            Err(ForestError::FeatureBatchMismatch { .. })
        ));

        // Groups with different row counts.
        let ragged = InternalFeatureValues {
            numerical: Array2::zeros((3, 1)),
            categorical: Array2::zeros((1, 0)),
            boolean: Array2::from_elem((3, 0), false),
        };
        assert!(matches!(
            compiled.predict_raw(&ragged),
            Err(ForestError::BatchSizeMismatch { .. })
        ));
        assert!(matches!(
            compiled.predict_leaf_indices(&ragged),
            Err(ForestError::BatchSizeMismatch { .. })
        ));
    }
}
