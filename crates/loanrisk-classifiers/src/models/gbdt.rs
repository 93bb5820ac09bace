//! Gradient boosted trees on top of the `gbdt` crate.
use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec, ValueType};
use gbdt::gradient_boost::GBDT;
use ndarray::ArrayView2;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::config::ModelKind;
use crate::error::{PipelineError, Result};
use crate::models::classifier_trait::{
    check_prediction_input, check_training_input, normalize, ClassifierModel, FeatureImportance,
};

const KIND: ModelKind = ModelKind::GradientBoostedTrees;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    pub num_boost_round: usize,
    pub max_depth: u32,
    pub learning_rate: f64,
    pub training_optimization_level: u8,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            num_boost_round: 100,
            max_depth: 6,
            learning_rate: 0.1,
            training_optimization_level: 2,
        }
    }
}

/// Log-likelihood boosting with positives weighted by `neg / pos`.
///
/// Row and column sampling stay at 1.0: the crate draws them from an
/// unseeded RNG. The seed only drives permutation importance.
#[derive(Serialize, Deserialize)]
pub struct GradientBoostedTreesAdapter {
    params: BoostingParams,
    seed: u64,
    n_features: Option<usize>,
    positive_weight: f64,
    importances: Vec<f64>,
    model: Option<GBDT>,
}

impl GradientBoostedTreesAdapter {
    pub fn new(seed: u64) -> Self {
        Self::with_params(BoostingParams::default(), seed)
    }

    pub fn with_params(params: BoostingParams, seed: u64) -> Self {
        Self {
            params,
            seed,
            n_features: None,
            positive_weight: 1.0,
            importances: Vec::new(),
            model: None,
        }
    }

    pub fn positive_weight(&self) -> f64 {
        self.positive_weight
    }

    fn config(&self, feature_size: usize) -> Config {
        let mut config = Config::new();
        config.set_feature_size(feature_size);
        config.set_shrinkage(self.params.learning_rate as ValueType);
        config.set_max_depth(self.params.max_depth);
        config.set_iterations(self.params.num_boost_round);
        config.set_data_sample_ratio(1.0);
        config.set_feature_sample_ratio(1.0);
        config.set_debug(false);
        config.set_training_optimization_level(self.params.training_optimization_level);
        config.set_loss("LogLikelyhood");
        config
    }

    fn model(&self) -> Result<&GBDT> {
        self.model
            .as_ref()
            .ok_or_else(|| PipelineError::model_fit(KIND, "model is not fitted"))
    }

    /// Turn the booster output into probabilities, rejecting NaN.
    fn raw_proba(model: &GBDT, rows: &DataVec) -> Result<Vec<f64>> {
        model
            .predict(rows)
            .into_iter()
            .map(|p| {
                let p = f64::from(p);
                if p.is_nan() {
                    Err(PipelineError::model_fit(KIND, "booster produced NaN"))
                } else {
                    Ok(p.clamp(0.0, 1.0))
                }
            })
            .collect()
    }

    /// Mean increase in weighted log-loss when one training column is
    /// shuffled, clamped at zero and normalised.
    fn permutation_importance(
        &self,
        model: &GBDT,
        x: ArrayView2<'_, f64>,
        y: &[u8],
        weights: &[f64],
    ) -> Result<Vec<f64>> {
        let baseline_proba = Self::raw_proba(model, &to_data(x, y, weights))?;
        let baseline = weighted_log_loss(&baseline_proba, y, weights);
        let mut scores = Vec::with_capacity(x.ncols());
        for j in 0..x.ncols() {
            let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(j as u64));
            let mut column: Vec<f64> = x.column(j).to_vec();
            column.shuffle(&mut rng);

            let mut permuted = x.to_owned();
            for (dst, src) in permuted.column_mut(j).iter_mut().zip(column) {
                *dst = src;
            }
            let proba = Self::raw_proba(model, &to_data(permuted.view(), y, weights))?;
            scores.push((weighted_log_loss(&proba, y, weights) - baseline).max(0.0));
        }
        normalize(&mut scores);
        Ok(scores)
    }
}

fn to_data(x: ArrayView2<'_, f64>, y: &[u8], weights: &[f64]) -> DataVec {
    let mut data = DataVec::with_capacity(x.nrows());
    for (i, row) in x.rows().into_iter().enumerate() {
        let features = row.iter().map(|&v| v as ValueType).collect();
        // LogLikelyhood expects labels in {-1, 1}.
        let label = if y[i] == 1 { 1.0 } else { -1.0 };
        data.push(Data::new_training_data(features, weights[i] as ValueType, label, None));
    }
    data
}

fn weighted_log_loss(proba: &[f64], y: &[u8], weights: &[f64]) -> f64 {
    const EPS: f64 = 1e-15;
    let total: f64 = weights.iter().sum();
    let loss: f64 = proba
        .iter()
        .zip(y)
        .zip(weights)
        .map(|((&p, &label), &w)| {
            let p = p.clamp(EPS, 1.0 - EPS);
            if label == 1 {
                -w * p.ln()
            } else {
                -w * (1.0 - p).ln()
            }
        })
        .sum();
    loss / total
}

impl ClassifierModel for GradientBoostedTreesAdapter {
    fn kind(&self) -> ModelKind {
        KIND
    }

    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[u8]) -> Result<()> {
        check_training_input(KIND, x, y)?;
        let pos = y.iter().filter(|&&l| l == 1).count();
        let neg = y.len() - pos;
        let positive_weight = neg as f64 / pos as f64;
        let weights: Vec<f64> = y
            .iter()
            .map(|&l| if l == 1 { positive_weight } else { 1.0 })
            .collect();

        let mut model = GBDT::new(&self.config(x.ncols()));
        let mut train = to_data(x, y, &weights);
        model.fit(&mut train);

        let importances = self.permutation_importance(&model, x, y, &weights)?;
        log::debug!(
            "Boosted {} rounds (positive weight {:.3})",
            self.params.num_boost_round,
            positive_weight
        );
        self.positive_weight = positive_weight;
        self.importances = importances;
        self.n_features = Some(x.ncols());
        self.model = Some(model);
        Ok(())
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Vec<f64>> {
        check_prediction_input(KIND, x, self.n_features)?;
        let model = self.model()?;
        let mut rows = DataVec::with_capacity(x.nrows());
        for row in x.rows() {
            let features = row.iter().map(|&v| v as ValueType).collect();
            rows.push(Data::new_training_data(features, 1.0, 0.0, None));
        }
        Self::raw_proba(model, &rows)
    }

    fn is_fitted(&self) -> bool {
        self.model.is_some()
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| PipelineError::model_fit(KIND, e.to_string()))
    }

    fn as_feature_importance(&self) -> Option<&dyn FeatureImportance> {
        Some(self)
    }
}

impl FeatureImportance for GradientBoostedTreesAdapter {
    fn feature_importances(&self) -> Result<Vec<f64>> {
        self.model()?;
        Ok(self.importances.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn data() -> (Array2<f64>, Vec<u8>) {
        let n = 80;
        let x = Array2::from_shape_fn((n, 3), |(i, j)| match j {
            0 => i as f64,
            1 => ((i * 7) % 11) as f64,
            _ => 5.0,
        });
        let y = (0..n).map(|i| u8::from(i >= 60)).collect();
        (x, y)
    }

    fn quick() -> BoostingParams {
        BoostingParams {
            num_boost_round: 20,
            ..BoostingParams::default()
        }
    }

    #[test]
    fn boosted_model_separates_classes() {
        let (x, y) = data();
        let mut model = GradientBoostedTreesAdapter::with_params(quick(), 42);
        model.fit(x.view(), &y).unwrap();
        assert!((model.positive_weight() - 3.0).abs() < 1e-12);

        let proba = model.predict_proba(x.view()).unwrap();
        assert_eq!(proba.len(), 80);
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
        assert!(proba[0] < 0.5 && proba[79] > 0.5, "{} {}", proba[0], proba[79]);
    }

    #[test]
    fn permutation_importance_ignores_constant_column() {
        let (x, y) = data();
        let mut model = GradientBoostedTreesAdapter::with_params(quick(), 42);
        model.fit(x.view(), &y).unwrap();
        let imp = model.feature_importances().unwrap();
        assert_eq!(imp.len(), 3);
        assert_eq!(imp[2], 0.0);
        assert!(imp[0] > imp[1], "{:?}", imp);
    }

    #[test]
    fn predict_before_fit_fails() {
        let model = GradientBoostedTreesAdapter::new(0);
        let x = Array2::<f64>::zeros((1, 3));
        assert!(matches!(
            model.predict_proba(x.view()),
            Err(PipelineError::ModelFit { .. })
        ));
    }
}
