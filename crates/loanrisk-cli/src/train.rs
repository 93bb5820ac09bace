//! `loanrisk train`: fit and persist the three classifiers.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use loanrisk_classifiers::config::{load_pipeline_config, PipelineConfig};
use loanrisk_classifiers::io::read_loan_csv;
use loanrisk_classifiers::trainer::{TrainingOrchestrator, TrainingOutcome};

/// Command line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct TrainOverrides {
    pub output_dir: Option<PathBuf>,
    pub seed: Option<u64>,
    pub no_report: bool,
}

/// Config from `config_path` (or defaults) with `overrides` applied.
pub fn resolve_config(
    config_path: Option<&Path>,
    overrides: &TrainOverrides,
) -> Result<PipelineConfig> {
    let mut config = match config_path {
        Some(path) => load_pipeline_config(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = &overrides.output_dir {
        config.output_root = dir.clone();
    }
    if let Some(seed) = overrides.seed {
        config.seed = seed;
    }
    if overrides.no_report {
        config.html_report = false;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

pub fn run_training(data_path: &Path, config: PipelineConfig) -> Result<TrainingOutcome> {
    let dataset = read_loan_csv(data_path, &config.schema)?;
    let output_root = config.output_root.clone();
    let outcome = TrainingOrchestrator::new(config, dataset)
        .and_then(|orchestrator| orchestrator.run())
        .with_context(|| format!("Training on {} failed", data_path.display()))?;

    for e in outcome.comparison.ranked() {
        log::info!(
            "{:<20} accuracy {:.4}  f1 {:.4}  roc_auc {:.4}",
            e.model().display_name(),
            e.metrics.accuracy,
            e.metrics.f1,
            e.metrics.roc_auc
        );
    }
    if let Some(best) = outcome.comparison.best() {
        log::info!(
            "Best model: {} (roc_auc {:.4})",
            best.model().display_name(),
            best.metrics.roc_auc
        );
    }
    log::info!(
        "Wrote {} artifacts under {}",
        outcome.written.len(),
        output_root.display()
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"seed": 7, "test_fraction": 0.3}"#).unwrap();

        let overrides = TrainOverrides {
            output_dir: Some(dir.path().join("out")),
            seed: Some(99),
            no_report: true,
        };
        let config = resolve_config(Some(&path), &overrides).unwrap();
        assert_eq!(config.seed, 99);
        assert_eq!(config.test_fraction, 0.3);
        assert_eq!(config.output_root, dir.path().join("out"));
        assert!(!config.html_report);
    }

    #[test]
    fn defaults_without_config_file() {
        let config = resolve_config(None, &TrainOverrides::default()).unwrap();
        assert_eq!(config.seed, 42);
        assert!(config.html_report);
    }
}
