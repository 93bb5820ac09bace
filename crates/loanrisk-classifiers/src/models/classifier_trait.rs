use ndarray::ArrayView2;

use crate::config::ModelKind;
use crate::error::{PipelineError, Result};

/// Probability above which a row is labelled positive.
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Common contract of the three classifier families.
///
/// Labels use `0` for repaid and `1` for default. Every method other than
/// `fit` fails with `ModelFit` until the model has been fitted.
pub trait ClassifierModel {
    fn kind(&self) -> ModelKind;

    /// Fit on rows of `x` with binary labels `y`.
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[u8]) -> Result<()>;

    /// Positive-class probability per row, each in `[0, 1]`.
    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Vec<f64>>;

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Vec<u8>> {
        Ok(labels_from_proba(&self.predict_proba(x)?))
    }

    fn is_fitted(&self) -> bool;

    /// Self-describing JSON form of the fitted model.
    fn to_json(&self) -> Result<serde_json::Value>;

    /// Tree models expose importances; the linear model does not.
    fn as_feature_importance(&self) -> Option<&dyn FeatureImportance> {
        None
    }

    fn name(&self) -> &str {
        self.kind().display_name()
    }
}

/// Per-feature importance in feature order, summing to 1 (or all zero when
/// no split or permutation changed anything).
pub trait FeatureImportance {
    fn feature_importances(&self) -> Result<Vec<f64>>;
}

pub fn labels_from_proba(proba: &[f64]) -> Vec<u8> {
    proba
        .iter()
        .map(|&p| u8::from(p > DECISION_THRESHOLD))
        .collect()
}

/// Shape checks shared by every `fit` implementation.
pub(crate) fn check_training_input(
    kind: ModelKind,
    x: ArrayView2<'_, f64>,
    y: &[u8],
) -> Result<()> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(PipelineError::model_fit(kind, "empty training matrix"));
    }
    if x.nrows() != y.len() {
        return Err(PipelineError::model_fit(
            kind,
            format!("{} rows but {} labels", x.nrows(), y.len()),
        ));
    }
    if let Some(bad) = y.iter().find(|&&l| l > 1) {
        return Err(PipelineError::model_fit(kind, format!("label {} is not binary", bad)));
    }
    let positives = y.iter().filter(|&&l| l == 1).count();
    if positives == 0 || positives == y.len() {
        return Err(PipelineError::model_fit(
            kind,
            "training labels contain a single class",
        ));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(PipelineError::model_fit(kind, "training matrix has non-finite values"));
    }
    Ok(())
}

pub(crate) fn check_prediction_input(
    kind: ModelKind,
    x: ArrayView2<'_, f64>,
    n_features: Option<usize>,
) -> Result<usize> {
    let expected =
        n_features.ok_or_else(|| PipelineError::model_fit(kind, "model is not fitted"))?;
    if x.ncols() != expected {
        return Err(PipelineError::model_fit(
            kind,
            format!("expected {} features, got {}", expected, x.ncols()),
        ));
    }
    Ok(expected)
}

/// Inverse-frequency weights `n / (2 * n_class)` for labels 0 and 1.
pub(crate) fn balanced_class_weights(y: &[u8]) -> [f64; 2] {
    let n = y.len() as f64;
    let pos = y.iter().filter(|&&l| l == 1).count() as f64;
    let neg = n - pos;
    [n / (2.0 * neg), n / (2.0 * pos)]
}

/// Rescale non-negative scores to sum to one; all-zero input stays zero.
pub(crate) fn normalize(scores: &mut [f64]) {
    let total: f64 = scores.iter().sum();
    if total > 0.0 {
        scores.iter_mut().for_each(|v| *v /= total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn threshold_is_strict() {
        assert_eq!(labels_from_proba(&[0.2, 0.5, 0.500001, 1.0]), vec![0, 0, 1, 1]);
    }

    #[test]
    fn balanced_weights_equalize_class_mass() {
        let y = [0, 0, 0, 1];
        let w = balanced_class_weights(&y);
        assert!((3.0 * w[0] - w[1]).abs() < 1e-12);
        assert!((3.0 * w[0] + w[1] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn single_class_training_is_rejected() {
        let x = array![[1.0], [2.0]];
        let err = check_training_input(ModelKind::RandomForest, x.view(), &[1, 1]).unwrap_err();
        assert!(matches!(err, PipelineError::ModelFit { .. }));
    }

    #[test]
    fn unfitted_prediction_is_rejected() {
        let x = array![[1.0]];
        let err =
            check_prediction_input(ModelKind::LogisticRegression, x.view(), None).unwrap_err();
        assert!(err.to_string().contains("not fitted"));
    }
}
