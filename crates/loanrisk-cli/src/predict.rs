//! `loanrisk predict`: score a table with a persisted artifact bundle.
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use loanrisk_classifiers::inference::{PredictionTable, Predictor};
use loanrisk_classifiers::io::read_inference_csv;

pub fn run_prediction(data_path: &Path, artifacts: &Path) -> Result<PredictionTable> {
    let predictor = Predictor::load(artifacts)
        .with_context(|| format!("Failed to load artifacts from {}", artifacts.display()))?;
    let data = read_inference_csv(data_path, predictor.schema(), &predictor.schema_config())?;
    let table = predictor
        .predict(&data)
        .with_context(|| format!("Scoring {} failed", data_path.display()))?;
    log::info!("Scored {} rows with {} models", table.ids.len(), table.models.len());
    Ok(table)
}

/// Write `table` to `output`, or to stdout when no path is given.
pub fn write_predictions(table: &PredictionTable, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            table.write_csv(path)?;
            log::info!("Predictions written to {}", path.display());
        }
        None => {
            let bytes = table.to_csv().context("Failed to render predictions")?;
            std::io::stdout()
                .lock()
                .write_all(&bytes)
                .context("Failed to write predictions to stdout")?;
        }
    }
    Ok(())
}
