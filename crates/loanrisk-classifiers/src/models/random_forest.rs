use ndarray::ArrayView2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::ModelKind;
use crate::error::{PipelineError, Result};
use crate::models::classifier_trait::{
    balanced_class_weights, check_prediction_input, check_training_input, normalize,
    ClassifierModel, FeatureImportance,
};
use crate::models::decision_tree::{DecisionTree, TreeParams};

const KIND: ModelKind = ModelKind::RandomForest;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub bootstrap: bool,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 10,
            min_samples_split: 5,
            min_samples_leaf: 2,
            bootstrap: true,
        }
    }
}

/// Bagged CART ensemble with balanced class weights.
///
/// Tree `t` draws from its own ChaCha stream seeded with `seed + t`, so the
/// fitted forest does not depend on how rayon schedules the trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestAdapter {
    params: ForestParams,
    seed: u64,
    n_features: Option<usize>,
    trees: Vec<DecisionTree>,
    importances: Vec<f64>,
}

impl RandomForestAdapter {
    pub fn new(seed: u64) -> Self {
        Self::with_params(ForestParams::default(), seed)
    }

    pub fn with_params(params: ForestParams, seed: u64) -> Self {
        Self {
            params,
            seed,
            n_features: None,
            trees: Vec::new(),
            importances: Vec::new(),
        }
    }
}

impl ClassifierModel for RandomForestAdapter {
    fn kind(&self) -> ModelKind {
        KIND
    }

    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[u8]) -> Result<()> {
        check_training_input(KIND, x, y)?;
        if self.params.n_trees == 0 {
            return Err(PipelineError::model_fit(KIND, "forest needs at least one tree"));
        }

        let (n, p) = x.dim();
        let class_weight = balanced_class_weights(y);
        let weights: Vec<f64> = y.iter().map(|&l| class_weight[l as usize]).collect();
        let tree_params = TreeParams {
            max_depth: self.params.max_depth,
            min_samples_split: self.params.min_samples_split,
            min_samples_leaf: self.params.min_samples_leaf,
            max_features: Some(((p as f64).sqrt() as usize).max(1)),
        };
        let bootstrap = self.params.bootstrap;
        let base_seed = self.seed;

        let trees: Vec<DecisionTree> = (0..self.params.n_trees)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));
                let rows: Vec<usize> = if bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                DecisionTree::fit(&tree_params, x, y, &weights, rows, &mut rng)
            })
            .collect();

        let mut importances = vec![0.0; p];
        for tree in &trees {
            for (acc, v) in importances.iter_mut().zip(tree.importances()) {
                *acc += v;
            }
        }
        importances.iter_mut().for_each(|v| *v /= trees.len() as f64);
        normalize(&mut importances);

        log::debug!(
            "Random forest: {} trees, mean depth {:.1}",
            trees.len(),
            trees.iter().map(|t| t.depth() as f64).sum::<f64>() / trees.len() as f64
        );
        self.trees = trees;
        self.importances = importances;
        self.n_features = Some(p);
        Ok(())
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Vec<f64>> {
        check_prediction_input(KIND, x, self.n_features)?;
        let n_trees = self.trees.len() as f64;
        Ok((0..x.nrows())
            .into_par_iter()
            .map(|r| {
                let row = x.row(r);
                self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / n_trees
            })
            .collect())
    }

    fn is_fitted(&self) -> bool {
        self.n_features.is_some()
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| PipelineError::model_fit(KIND, e.to_string()))
    }

    fn as_feature_importance(&self) -> Option<&dyn FeatureImportance> {
        Some(self)
    }
}

impl FeatureImportance for RandomForestAdapter {
    fn feature_importances(&self) -> Result<Vec<f64>> {
        if !self.is_fitted() {
            return Err(PipelineError::model_fit(KIND, "model is not fitted"));
        }
        Ok(self.importances.clone())
    }
}
