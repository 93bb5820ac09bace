use serde::{Deserialize, Serialize};

use crate::config::ModelKind;
use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportanceRow {
    pub feature: String,
    pub importance: f64,
}

/// Importances of one tree model, highest first. Ties keep feature order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportanceTable {
    pub model: ModelKind,
    pub rows: Vec<FeatureImportanceRow>,
}

impl FeatureImportanceTable {
    pub fn new(model: ModelKind, feature_names: &[String], importances: &[f64]) -> Result<Self> {
        if feature_names.len() != importances.len() {
            return Err(PipelineError::Evaluation {
                model,
                reason: format!(
                    "{} importances for {} features",
                    importances.len(),
                    feature_names.len()
                ),
            });
        }
        let mut rows: Vec<FeatureImportanceRow> = feature_names
            .iter()
            .zip(importances)
            .map(|(name, &importance)| FeatureImportanceRow {
                feature: name.clone(),
                importance,
            })
            .collect();
        // sort_by is stable, so equal importances stay in feature order.
        rows.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        Ok(Self { model, rows })
    }

    pub fn top(&self, n: usize) -> &[FeatureImportanceRow] {
        &self.rows[..n.min(self.rows.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_descending_with_stable_ties() {
        let names: Vec<String> = ["Age", "Income", "Employment", "Term"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let table = FeatureImportanceTable::new(
            ModelKind::RandomForest,
            &names,
            &[0.2, 0.5, 0.2, 0.1],
        )
        .unwrap();
        let order: Vec<&str> = table.rows.iter().map(|r| r.feature.as_str()).collect();
        assert_eq!(order, vec!["Income", "Age", "Employment", "Term"]);
        assert_eq!(table.top(1)[0].feature, "Income");
        assert_eq!(table.top(10).len(), 4);
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let names = vec!["Age".to_string()];
        assert!(FeatureImportanceTable::new(ModelKind::RandomForest, &names, &[0.5, 0.5]).is_err());
    }
}
