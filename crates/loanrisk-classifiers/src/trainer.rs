//! End-to-end training run.
//!
//! The orchestrator walks `Idle -> Preprocessed -> Trained -> Evaluated ->
//! Persisted`. Each step only runs from its predecessor; a failing step
//! leaves the stage unchanged and nothing is written to disk.
use std::time::Instant;

use ndarray::Array2;

use crate::config::{ModelKind, PipelineConfig};
use crate::data_handling::Dataset;
use crate::error::{PipelineError, PipelineStage, Result};
use crate::evaluation::{evaluate_model, ModelComparison, ModelTiming, TestPredictions};
use crate::models::{build_model, labels_from_proba, ClassifierModel};
use crate::preprocessing::{fit_scaler, FittedCodec, Scaler};
use crate::split::{stratified_split, Split};
use crate::store::{self, ArtifactBundle, ArtifactLayout, RunManifest};

/// Encoded and scaled matrices for both partitions.
pub struct PreparedData {
    pub split: Split,
    pub codec: FittedCodec,
    pub scaler: Scaler,
    pub x_train: Array2<f64>,
    pub x_train_scaled: Array2<f64>,
    pub x_test: Array2<f64>,
    pub x_test_scaled: Array2<f64>,
    pub y_train: Vec<u8>,
    pub y_test: Vec<u8>,
}

impl PreparedData {
    fn train_matrix(&self, kind: ModelKind) -> &Array2<f64> {
        if kind.uses_scaled_features() {
            &self.x_train_scaled
        } else {
            &self.x_train
        }
    }

    fn test_matrix(&self, kind: ModelKind) -> &Array2<f64> {
        if kind.uses_scaled_features() {
            &self.x_test_scaled
        } else {
            &self.x_test
        }
    }
}

pub struct TrainedModel {
    pub model: Box<dyn ClassifierModel>,
    pub fit_seconds: f64,
}

/// What a completed run hands back to the caller.
pub struct TrainingOutcome {
    pub comparison: ModelComparison,
    pub manifest: RunManifest,
    pub written: Vec<std::path::PathBuf>,
}

pub struct TrainingOrchestrator {
    config: PipelineConfig,
    dataset: Dataset,
    stage: PipelineStage,
    prepared: Option<PreparedData>,
    trained: Vec<TrainedModel>,
    comparison: Option<ModelComparison>,
}

impl TrainingOrchestrator {
    pub fn new(config: PipelineConfig, dataset: Dataset) -> Result<Self> {
        config.validate()?;
        dataset.require_labels()?;
        Ok(Self {
            config,
            dataset,
            stage: PipelineStage::Idle,
            prepared: None,
            trained: Vec::new(),
            comparison: None,
        })
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn prepared(&self) -> Option<&PreparedData> {
        self.prepared.as_ref()
    }

    pub fn trained(&self) -> &[TrainedModel] {
        &self.trained
    }

    pub fn comparison(&self) -> Option<&ModelComparison> {
        self.comparison.as_ref()
    }

    fn expect_stage(&self, to: PipelineStage) -> Result<()> {
        let required = match to {
            PipelineStage::Idle => None,
            PipelineStage::Preprocessed => Some(PipelineStage::Idle),
            PipelineStage::Trained => Some(PipelineStage::Preprocessed),
            PipelineStage::Evaluated => Some(PipelineStage::Trained),
            PipelineStage::Persisted => Some(PipelineStage::Evaluated),
        };
        if required == Some(self.stage) {
            Ok(())
        } else {
            Err(PipelineError::InvalidTransition {
                from: self.stage,
                to,
            })
        }
    }

    /// Split, then fit the codec and scaler on the training rows only.
    pub fn preprocess(&mut self) -> Result<&PreparedData> {
        self.expect_stage(PipelineStage::Preprocessed)?;
        let prepared = self
            .build_prepared()
            .map_err(|e| e.in_stage(PipelineStage::Preprocessed))?;
        self.stage = PipelineStage::Preprocessed;
        Ok(self.prepared.insert(prepared))
    }

    fn build_prepared(&self) -> Result<PreparedData> {
        let labels = self.dataset.require_labels()?;
        let split = stratified_split(labels, self.config.test_fraction, self.config.seed)?;
        let train = self.dataset.select(&split.train);
        let test = self.dataset.select(&split.test);
        log::info!(
            "Split {} rows into {} train / {} test",
            self.dataset.n_samples(),
            train.n_samples(),
            test.n_samples()
        );

        let codec = FittedCodec::fit(&train);
        let x_train = codec.transform(&train)?;
        let x_test = codec.transform(&test)?;

        let scaler = fit_scaler(x_train.view(), codec.feature_names())?;
        let x_train_scaled = scaler.transform(x_train.view())?;
        let x_test_scaled = scaler.transform(x_test.view())?;
        log::debug!(
            "Encoded {} categorical columns, scaled {} columns",
            codec.encoders().len(),
            scaler.n_features()
        );

        Ok(PreparedData {
            y_train: train.require_labels()?.to_vec(),
            y_test: test.require_labels()?.to_vec(),
            split,
            codec,
            scaler,
            x_train,
            x_train_scaled,
            x_test,
            x_test_scaled,
        })
    }

    /// Fit every model family on its representation of the training rows.
    pub fn train(&mut self) -> Result<&[TrainedModel]> {
        self.expect_stage(PipelineStage::Trained)?;
        let trained = self
            .fit_all()
            .map_err(|e| e.in_stage(PipelineStage::Trained))?;
        self.trained = trained;
        self.stage = PipelineStage::Trained;
        Ok(&self.trained)
    }

    fn fit_all(&self) -> Result<Vec<TrainedModel>> {
        let prepared = self.prepared_data()?;
        let mut trained = Vec::with_capacity(ModelKind::ALL.len());
        for kind in ModelKind::ALL {
            log::info!("Training {}...", kind);
            let mut model = build_model(kind, self.config.seed);
            let start = Instant::now();
            model.fit(prepared.train_matrix(kind).view(), &prepared.y_train)?;
            let fit_seconds = start.elapsed().as_secs_f64();
            log::info!("{} trained in {:.2}s", kind, fit_seconds);
            trained.push(TrainedModel { model, fit_seconds });
        }
        Ok(trained)
    }

    /// Score the test rows with every model and rank the results.
    pub fn evaluate(&mut self) -> Result<&ModelComparison> {
        self.expect_stage(PipelineStage::Evaluated)?;
        let comparison = self
            .evaluate_all()
            .map_err(|e| e.in_stage(PipelineStage::Evaluated))?;
        if let Some(best) = comparison.best() {
            log::info!(
                "Best model by ROC-AUC: {} ({:.4})",
                best.model(),
                best.metrics.roc_auc
            );
        }
        self.stage = PipelineStage::Evaluated;
        Ok(self.comparison.insert(comparison))
    }

    fn evaluate_all(&self) -> Result<ModelComparison> {
        let prepared = self.prepared_data()?;
        let n_test = prepared.y_test.len().max(1) as f64;
        let mut evaluations = Vec::with_capacity(self.trained.len());
        for trained in &self.trained {
            let kind = trained.model.kind();
            let x = prepared.test_matrix(kind).view();

            let start = Instant::now();
            let proba = trained.model.predict_proba(x)?;
            let y_pred = labels_from_proba(&proba);
            let predict_ms = start.elapsed().as_secs_f64() * 1_000.0;

            let importances = trained
                .model
                .as_feature_importance()
                .map(|fi| fi.feature_importances())
                .transpose()?;

            evaluations.push(evaluate_model(
                TestPredictions {
                    model: kind,
                    y_true: &prepared.y_test,
                    y_pred: &y_pred,
                    proba: &proba,
                    importances,
                    timing: ModelTiming {
                        fit_seconds: trained.fit_seconds,
                        predict_ms_per_sample: predict_ms / n_test,
                    },
                },
                prepared.codec.feature_names(),
            )?);
        }
        Ok(ModelComparison::new(evaluations))
    }

    /// Write all artifacts under the configured output root.
    pub fn persist(&mut self) -> Result<Vec<std::path::PathBuf>> {
        self.expect_stage(PipelineStage::Persisted)?;
        let written = self
            .write_artifacts()
            .map_err(|e| e.in_stage(PipelineStage::Persisted))?;
        self.stage = PipelineStage::Persisted;
        Ok(written)
    }

    pub fn manifest(&self) -> Result<RunManifest> {
        let prepared = self.prepared_data()?;
        let positives = |y: &[u8]| y.iter().filter(|&&l| l == 1).count();
        Ok(RunManifest {
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            seed: self.config.seed,
            test_fraction: self.config.test_fraction,
            id_column: self.config.schema.id_column.clone(),
            label_column: self.config.schema.label_column.clone(),
            n_train: prepared.y_train.len(),
            n_test: prepared.y_test.len(),
            train_positive: positives(&prepared.y_train),
            test_positive: positives(&prepared.y_test),
            schema: self.dataset.schema().clone(),
            models: self.trained.iter().map(|t| t.model.kind()).collect(),
        })
    }

    fn write_artifacts(&self) -> Result<Vec<std::path::PathBuf>> {
        let prepared = self.prepared_data()?;
        let comparison = self.comparison.as_ref().ok_or(PipelineError::InvalidTransition {
            from: self.stage,
            to: PipelineStage::Persisted,
        })?;
        let manifest = self.manifest()?;
        let html_report = self
            .config
            .html_report
            .then(|| crate::report::render_training_report(&manifest, comparison));

        let bundle = ArtifactBundle {
            manifest: &manifest,
            codec: &prepared.codec,
            scaler: &prepared.scaler,
            models: self.trained.iter().map(|t| t.model.as_ref()).collect(),
            comparison,
            html_report,
        };
        store::persist(&bundle, &ArtifactLayout::new(&self.config.output_root))
    }

    fn prepared_data(&self) -> Result<&PreparedData> {
        self.prepared.as_ref().ok_or(PipelineError::InvalidTransition {
            from: self.stage,
            to: PipelineStage::Preprocessed,
        })
    }

    /// Run every remaining step in order.
    pub fn run(mut self) -> Result<TrainingOutcome> {
        self.dataset.log_input_data_summary();
        self.preprocess()?;
        self.train()?;
        self.evaluate()?;
        let written = self.persist()?;
        let manifest = self.manifest()?;
        let comparison = self.comparison.take().ok_or(PipelineError::InvalidTransition {
            from: self.stage,
            to: PipelineStage::Evaluated,
        })?;
        Ok(TrainingOutcome {
            comparison,
            manifest,
            written,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_handling::Column;
    use crate::schema::{FeatureKind, FeatureSchema, FeatureSpec};

    fn dataset(n: usize) -> Dataset {
        let schema = FeatureSchema::new(vec![
            FeatureSpec {
                name: "Income".into(),
                kind: FeatureKind::Numerical,
            },
            FeatureSpec {
                name: "Employment".into(),
                kind: FeatureKind::Categorical,
            },
        ])
        .unwrap();
        let kinds = ["Employed", "Self-employed", "Unemployed"];
        let labels: Vec<u8> = (0..n).map(|i| u8::from(i % 5 == 0)).collect();
        Dataset::new(
            schema,
            (0..n).map(|i| format!("L{:04}", i)).collect(),
            vec![
                Column::Numerical(
                    (0..n)
                        .map(|i| {
                            let base = if labels[i] == 1 { 20_000.0 } else { 60_000.0 };
                            base + (i % 17) as f64 * 500.0
                        })
                        .collect(),
                ),
                Column::Categorical((0..n).map(|i| kinds[i % 3].to_string()).collect()),
            ],
            Some(labels),
        )
        .unwrap()
    }

    #[test]
    fn steps_must_run_in_order() {
        let mut orch = TrainingOrchestrator::new(PipelineConfig::default(), dataset(100)).unwrap();
        match orch.train() {
            Err(PipelineError::InvalidTransition { from, to }) => {
                assert_eq!(from, PipelineStage::Idle);
                assert_eq!(to, PipelineStage::Trained);
            }
            other => panic!("expected InvalidTransition, got {:?}", other.err()),
        }
        assert!(orch.persist().is_err());
        assert_eq!(orch.stage(), PipelineStage::Idle);

        orch.preprocess().unwrap();
        assert_eq!(orch.stage(), PipelineStage::Preprocessed);
        assert!(orch.preprocess().is_err());
    }

    #[test]
    fn preprocessing_fits_on_train_rows_only() {
        let mut orch = TrainingOrchestrator::new(PipelineConfig::default(), dataset(200)).unwrap();
        let prepared = orch.preprocess().unwrap();
        assert_eq!(prepared.split.test.len(), 40);
        assert_eq!(prepared.x_train.nrows(), 160);
        assert_eq!(prepared.x_test_scaled.ncols(), 2);

        let train_income: Vec<f64> = prepared.x_train.column(0).to_vec();
        let mean = train_income.iter().sum::<f64>() / train_income.len() as f64;
        assert!((prepared.scaler.mean[0] - mean).abs() < 1e-6);
    }

    #[test]
    fn dataset_without_labels_is_rejected() {
        let ds = dataset(20);
        let unlabeled = Dataset::new(
            ds.schema().clone(),
            ds.ids().to_vec(),
            ds.columns().to_vec(),
            None,
        )
        .unwrap();
        assert!(TrainingOrchestrator::new(PipelineConfig::default(), unlabeled).is_err());
    }
}
