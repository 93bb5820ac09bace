//! Scoring new applications with a persisted artifact bundle.
use std::path::Path;

use crate::config::ModelKind;
use crate::data_handling::Dataset;
use crate::error::{PipelineError, Result};
use crate::models::{labels_from_proba, ClassifierModel};
use crate::schema::{FeatureKind, FeatureSchema, SchemaConfig};
use crate::store::{self, ArtifactLayout, LoadedArtifacts, RunManifest};

#[derive(Debug, Clone, PartialEq)]
pub struct ModelPredictions {
    pub model: ModelKind,
    pub proba: Vec<f64>,
    pub labels: Vec<u8>,
}

/// Per-row outputs of every model, aligned with `ids`.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionTable {
    pub id_column: String,
    pub ids: Vec<String>,
    pub models: Vec<ModelPredictions>,
}

impl PredictionTable {
    pub fn get(&self, model: ModelKind) -> Option<&ModelPredictions> {
        self.models.iter().find(|m| m.model == model)
    }

    /// `<id>, <stem>_probability, <stem>_label, ...` with one row per input row.
    pub fn to_csv(&self) -> std::result::Result<Vec<u8>, csv::Error> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        let mut header = vec![self.id_column.clone()];
        for m in &self.models {
            header.push(format!("{}_probability", m.model.file_stem()));
            header.push(format!("{}_label", m.model.file_stem()));
        }
        wtr.write_record(&header)?;

        for (row, id) in self.ids.iter().enumerate() {
            let mut record = vec![id.clone()];
            for m in &self.models {
                record.push(format!("{:.6}", m.proba[row]));
                record.push(m.labels[row].to_string());
            }
            wtr.write_record(&record)?;
        }
        wtr.into_inner().map_err(|e| e.into_error().into())
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let bytes = self
            .to_csv()
            .map_err(|e| PipelineError::persistence(path, e))?;
        store::write_atomic(path, &bytes)
    }
}

pub struct Predictor {
    artifacts: LoadedArtifacts,
}

impl Predictor {
    pub fn load<P: AsRef<Path>>(root: P) -> Result<Self> {
        let layout = ArtifactLayout::new(root.as_ref());
        let artifacts = store::load(&layout)?;
        log::info!(
            "Loaded {} models trained on {} features from {}",
            artifacts.models.len(),
            artifacts.feature_names.len(),
            layout.root().display()
        );
        Ok(Self { artifacts })
    }

    pub fn manifest(&self) -> &RunManifest {
        &self.artifacts.manifest
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.artifacts.manifest.schema
    }

    /// Loader settings that reproduce the training-time schema.
    pub fn schema_config(&self) -> SchemaConfig {
        let schema = self.schema();
        let names = |kind: FeatureKind| {
            schema
                .features()
                .iter()
                .filter(|f| f.kind == kind)
                .map(|f| f.name.clone())
                .collect::<Vec<_>>()
        };
        SchemaConfig {
            id_column: self.artifacts.manifest.id_column.clone(),
            label_column: self.artifacts.manifest.label_column.clone(),
            categorical: Some(names(FeatureKind::Categorical)),
            numerical: Some(names(FeatureKind::Numerical)),
        }
    }

    /// Run every stored model over `data`.
    ///
    /// Categories unseen at training time fail with `UnknownCategory`.
    pub fn predict(&self, data: &Dataset) -> Result<PredictionTable> {
        if data.schema() != self.schema() {
            return Err(PipelineError::InputSchema(format!(
                "input features {:?} do not match the trained features {:?}",
                data.schema().names(),
                self.schema().names()
            )));
        }
        let x = self.artifacts.codec.transform(data)?;
        let x_scaled = self.artifacts.scaler.transform(x.view())?;

        let mut models = Vec::with_capacity(self.artifacts.models.len());
        for model in &self.artifacts.models {
            let kind = model.kind();
            let input = if kind.uses_scaled_features() {
                x_scaled.view()
            } else {
                x.view()
            };
            let proba = model.predict_proba(input)?;
            let labels = labels_from_proba(&proba);
            log::debug!(
                "{} flagged {} of {} rows",
                kind,
                labels.iter().filter(|&&l| l == 1).count(),
                labels.len()
            );
            models.push(ModelPredictions {
                model: kind,
                proba,
                labels,
            });
        }

        Ok(PredictionTable {
            id_column: self.artifacts.manifest.id_column.clone(),
            ids: data.ids().to_vec(),
            models,
        })
    }
}
