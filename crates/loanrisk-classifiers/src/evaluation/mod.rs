//! Uniform evaluation of fitted models on the test partition.
pub mod importance;
pub mod metrics;
pub mod ranking;
pub mod report;

use serde::{Deserialize, Serialize};

use crate::config::ModelKind;
use crate::error::Result;

pub use importance::{FeatureImportanceRow, FeatureImportanceTable};
pub use metrics::{roc_auc, roc_curve, ConfusionMatrix, MetricReport};
pub use ranking::{rank, ranking_order};
pub use report::{ClassStats, ClassificationReport};

/// Wall-clock cost of one model. Reported, never ranked on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelTiming {
    pub fit_seconds: f64,
    /// Mean prediction latency per test row, in milliseconds.
    pub predict_ms_per_sample: f64,
}

/// Everything the reports need about one model.
#[derive(Debug, Clone)]
pub struct ModelEvaluation {
    pub metrics: MetricReport,
    pub report: ClassificationReport,
    pub roc_curve: Vec<(f64, f64)>,
    pub importance: Option<FeatureImportanceTable>,
    pub timing: ModelTiming,
}

impl ModelEvaluation {
    pub fn model(&self) -> ModelKind {
        self.metrics.model
    }
}

/// Inputs collected by the orchestrator for one fitted model.
pub struct TestPredictions<'a> {
    pub model: ModelKind,
    pub y_true: &'a [u8],
    pub y_pred: &'a [u8],
    pub proba: &'a [f64],
    pub importances: Option<Vec<f64>>,
    pub timing: ModelTiming,
}

pub fn evaluate_model(p: TestPredictions<'_>, feature_names: &[String]) -> Result<ModelEvaluation> {
    let metrics = MetricReport::compute(p.model, p.y_true, p.y_pred, p.proba)?;
    let confusion = ConfusionMatrix::from_predictions(p.y_true, p.y_pred);
    let importance = p
        .importances
        .map(|imp| FeatureImportanceTable::new(p.model, feature_names, &imp))
        .transpose()?;
    log::info!(
        "{}: accuracy {:.4}, precision {:.4}, recall {:.4}, f1 {:.4}, roc_auc {:.4}",
        p.model,
        metrics.accuracy,
        metrics.precision,
        metrics.recall,
        metrics.f1,
        metrics.roc_auc
    );
    Ok(ModelEvaluation {
        metrics,
        report: ClassificationReport::from_confusion(&confusion),
        roc_curve: roc_curve(p.y_true, p.proba),
        importance,
        timing: p.timing,
    })
}

/// Evaluations sorted best first.
#[derive(Debug, Clone)]
pub struct ModelComparison {
    ranked: Vec<ModelEvaluation>,
}

impl ModelComparison {
    pub fn new(mut evaluations: Vec<ModelEvaluation>) -> Self {
        evaluations.sort_by(|a, b| ranking_order(&a.metrics, &b.metrics));
        Self {
            ranked: evaluations,
        }
    }

    pub fn ranked(&self) -> &[ModelEvaluation] {
        &self.ranked
    }

    pub fn best(&self) -> Option<&ModelEvaluation> {
        self.ranked.first()
    }

    pub fn get(&self, model: ModelKind) -> Option<&ModelEvaluation> {
        self.ranked.iter().find(|e| e.model() == model)
    }

    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparison_orders_by_auc() {
        let y_true = [0, 0, 1, 1, 0, 1];
        let names = vec!["Age".to_string(), "Income".to_string()];
        let evaluate = |model, proba: &[f64], importances| {
            let y_pred: Vec<u8> = proba.iter().map(|&p| u8::from(p > 0.5)).collect();
            evaluate_model(
                TestPredictions {
                    model,
                    y_true: &y_true,
                    y_pred: &y_pred,
                    proba,
                    importances,
                    timing: ModelTiming::default(),
                },
                &names,
            )
            .unwrap()
        };

        let weak = evaluate(
            ModelKind::LogisticRegression,
            &[0.6, 0.4, 0.5, 0.7, 0.2, 0.3],
            None,
        );
        let strong = evaluate(
            ModelKind::RandomForest,
            &[0.1, 0.2, 0.9, 0.8, 0.3, 0.7],
            Some(vec![0.25, 0.75]),
        );
        assert!(weak.importance.is_none());
        assert_eq!(strong.importance.as_ref().unwrap().rows[0].feature, "Income");

        let cmp = ModelComparison::new(vec![weak, strong]);
        assert_eq!(cmp.best().unwrap().model(), ModelKind::RandomForest);
        assert_eq!(cmp.len(), 2);
        assert!(cmp.get(ModelKind::GradientBoostedTrees).is_none());
    }
}
