use crate::config::ModelKind;
use crate::error::{PipelineError, Result};
use crate::models::classifier_trait::ClassifierModel;
use crate::models::gbdt::GradientBoostedTreesAdapter;
use crate::models::logistic::LogisticRegressionAdapter;
use crate::models::random_forest::RandomForestAdapter;

/// Build an unfitted adapter with its family's fixed hyper-parameters.
///
/// `run_seed` is offset per family so the three models never share a stream.
pub fn build_model(kind: ModelKind, run_seed: u64) -> Box<dyn ClassifierModel> {
    let seed = run_seed.wrapping_add(kind.seed_offset());
    match kind {
        ModelKind::LogisticRegression => Box::new(LogisticRegressionAdapter::new()),
        ModelKind::RandomForest => Box::new(RandomForestAdapter::new(seed)),
        ModelKind::GradientBoostedTrees => Box::new(GradientBoostedTreesAdapter::new(seed)),
    }
}

/// Rebuild a fitted adapter from the JSON written by [`ClassifierModel::to_json`].
pub fn load_model(kind: ModelKind, value: serde_json::Value) -> Result<Box<dyn ClassifierModel>> {
    let bad = |e: serde_json::Error| {
        PipelineError::model_fit(kind, format!("cannot decode model: {}", e))
    };
    let model: Box<dyn ClassifierModel> = match kind {
        ModelKind::LogisticRegression => {
            Box::new(serde_json::from_value::<LogisticRegressionAdapter>(value).map_err(bad)?)
        }
        ModelKind::RandomForest => {
            Box::new(serde_json::from_value::<RandomForestAdapter>(value).map_err(bad)?)
        }
        ModelKind::GradientBoostedTrees => {
            Box::new(serde_json::from_value::<GradientBoostedTreesAdapter>(value).map_err(bad)?)
        }
    };
    if !model.is_fitted() {
        return Err(PipelineError::model_fit(kind, "stored model was never fitted"));
    }
    Ok(model)
}
