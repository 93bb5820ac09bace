use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::schema::SchemaConfig;

/// The three classifier families trained on every run.
///
/// Declaration order is the fixed tie-break order used when ranking models.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    LogisticRegression,
    RandomForest,
    GradientBoostedTrees,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [
        ModelKind::LogisticRegression,
        ModelKind::RandomForest,
        ModelKind::GradientBoostedTrees,
    ];

    /// Human readable name used in reports and tables.
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelKind::LogisticRegression => "Logistic Regression",
            ModelKind::RandomForest => "Random Forest",
            ModelKind::GradientBoostedTrees => "Gradient Boosted Trees",
        }
    }

    /// Stem used for artifact file names (`models/<stem>_model.json`).
    pub fn file_stem(&self) -> &'static str {
        match self {
            ModelKind::LogisticRegression => "logistic_regression",
            ModelKind::RandomForest => "random_forest",
            ModelKind::GradientBoostedTrees => "xgboost",
        }
    }

    /// Only the linear model is trained on standardized features.
    pub fn uses_scaled_features(&self) -> bool {
        matches!(self, ModelKind::LogisticRegression)
    }

    /// Offset mixed into the run seed so each family draws an independent stream.
    pub(crate) fn seed_offset(&self) -> u64 {
        match self {
            ModelKind::LogisticRegression => 0,
            ModelKind::RandomForest => 1_000,
            ModelKind::GradientBoostedTrees => 2_000,
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', ' '], "_").as_str() {
            "logistic_regression" | "logreg" | "lr" => Ok(ModelKind::LogisticRegression),
            "random_forest" | "rf" => Ok(ModelKind::RandomForest),
            "gradient_boosted_trees" | "gbdt" | "xgboost" => Ok(ModelKind::GradientBoostedTrees),
            _ => Err(format!(
                "Unknown model kind: {}. Valid options are: logistic_regression, random_forest, gradient_boosted_trees",
                s
            )),
        }
    }
}

/// Run level settings for a training pipeline.
///
/// Model hyper-parameters are fixed per family and deliberately not part of
/// this struct.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    /// Seed threaded through the split and every model adapter.
    pub seed: u64,
    /// Fraction of rows held out for evaluation.
    pub test_fraction: f64,
    pub schema: SchemaConfig,
    /// Root under which `models/` and `results/` are written.
    pub output_root: PathBuf,
    /// Also render `results/training_report.html`.
    pub html_report: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            test_fraction: 0.2,
            schema: SchemaConfig::default(),
            output_root: PathBuf::from("."),
            html_report: true,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(crate::PipelineError::Config(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        self.schema.validate()
    }
}

/// Load a pipeline configuration from a JSON file.
pub fn load_pipeline_config<P: AsRef<Path>>(path: P) -> anyhow::Result<PipelineConfig> {
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
    let config: PipelineConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid config: {}", path.as_ref().display()))?;
    Ok(config)
}
