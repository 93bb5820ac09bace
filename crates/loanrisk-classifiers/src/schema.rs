//! Explicit feature schema for the loan table.
//!
//! The schema is produced once when the table is loaded and stays fixed for
//! the lifetime of a run. Columns can be declared in the configuration; when
//! they are not, the kind of each column is inferred from its values and
//! columns that mix numeric and non-numeric values are rejected instead of
//! guessed.
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Categorical,
    Numerical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name: String,
    pub kind: FeatureKind,
}

/// Ordered list of feature columns (identifier and label excluded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    features: Vec<FeatureSpec>,
}

impl FeatureSchema {
    pub fn new(features: Vec<FeatureSpec>) -> Result<Self> {
        if features.is_empty() {
            return Err(PipelineError::InputSchema(
                "schema must contain at least one feature column".to_string(),
            ));
        }
        for (i, f) in features.iter().enumerate() {
            if features[..i].iter().any(|g| g.name == f.name) {
                return Err(PipelineError::InputSchema(format!(
                    "duplicate feature column '{}'",
                    f.name
                )));
            }
        }
        Ok(Self { features })
    }

    pub fn features(&self) -> &[FeatureSpec] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.features.iter().map(|f| f.name.clone()).collect()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.features.iter().position(|f| f.name == name)
    }

    pub fn categorical(&self) -> impl Iterator<Item = &FeatureSpec> {
        self.features
            .iter()
            .filter(|f| f.kind == FeatureKind::Categorical)
    }

    pub fn numerical(&self) -> impl Iterator<Item = &FeatureSpec> {
        self.features
            .iter()
            .filter(|f| f.kind == FeatureKind::Numerical)
    }
}

/// How the loader should interpret the columns of the input table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Identifier column, carried through but never used as a feature.
    pub id_column: String,
    /// Binary label column (values 0 / 1).
    pub label_column: String,
    /// Explicit categorical columns. When both lists are `None` kinds are inferred.
    pub categorical: Option<Vec<String>>,
    /// Explicit numerical columns.
    pub numerical: Option<Vec<String>>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            id_column: "LoanID".to_string(),
            label_column: "Default".to_string(),
            categorical: None,
            numerical: None,
        }
    }
}

impl SchemaConfig {
    pub fn validate(&self) -> Result<()> {
        if self.id_column == self.label_column {
            return Err(PipelineError::Config(format!(
                "id column and label column are both '{}'",
                self.id_column
            )));
        }
        if self.categorical.is_some() != self.numerical.is_some() {
            return Err(PipelineError::Config(
                "categorical and numerical column lists must be given together".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the feature schema for a table with the given header and raw
    /// feature cells.
    ///
    /// `cells(c)` yields the raw values of header column `c`; it is only
    /// consulted when kinds have to be inferred.
    pub fn resolve<'a, F, I>(&self, headers: &[String], cells: F) -> Result<FeatureSchema>
    where
        F: Fn(usize) -> I,
        I: Iterator<Item = &'a str>,
    {
        if !headers.iter().any(|h| h == &self.id_column) {
            return Err(PipelineError::InputSchema(format!(
                "missing identifier column '{}'",
                self.id_column
            )));
        }
        if !headers.iter().any(|h| h == &self.label_column) {
            return Err(PipelineError::InputSchema(format!(
                "missing label column '{}'",
                self.label_column
            )));
        }

        let feature_columns: Vec<(usize, &String)> = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| **h != self.id_column && **h != self.label_column)
            .collect();

        let specs = match (&self.categorical, &self.numerical) {
            (Some(categorical), Some(numerical)) => {
                declared_specs(&feature_columns, categorical, numerical)?
            }
            _ => feature_columns
                .iter()
                .map(|&(idx, name)| {
                    infer_kind(name, cells(idx)).map(|kind| FeatureSpec {
                        name: name.clone(),
                        kind,
                    })
                })
                .collect::<Result<Vec<_>>>()?,
        };

        FeatureSchema::new(specs)
    }
}

fn declared_specs(
    feature_columns: &[(usize, &String)],
    categorical: &[String],
    numerical: &[String],
) -> Result<Vec<FeatureSpec>> {
    for name in categorical.iter().chain(numerical.iter()) {
        if !feature_columns.iter().any(|(_, h)| *h == name) {
            return Err(PipelineError::InputSchema(format!(
                "declared column '{}' is missing from the input",
                name
            )));
        }
    }
    if let Some(both) = categorical.iter().find(|c| numerical.contains(c)) {
        return Err(PipelineError::InputSchema(format!(
            "column '{}' is declared both categorical and numerical",
            both
        )));
    }

    feature_columns
        .iter()
        .map(|&(_, name)| {
            let kind = if categorical.contains(name) {
                FeatureKind::Categorical
            } else if numerical.contains(name) {
                FeatureKind::Numerical
            } else {
                return Err(PipelineError::InputSchema(format!(
                    "unexpected column '{}' not declared in the schema",
                    name
                )));
            };
            Ok(FeatureSpec {
                name: name.clone(),
                kind,
            })
        })
        .collect()
}

fn infer_kind<'a>(name: &str, values: impl Iterator<Item = &'a str>) -> Result<FeatureKind> {
    let mut numeric = 0usize;
    let mut text = 0usize;
    for v in values {
        if v.trim().parse::<f64>().is_ok() {
            numeric += 1;
        } else {
            text += 1;
        }
    }
    match (numeric, text) {
        (0, 0) => Err(PipelineError::InputSchema(format!(
            "column '{}' has no values",
            name
        ))),
        (_, 0) => Ok(FeatureKind::Numerical),
        (0, _) => Ok(FeatureKind::Categorical),
        (n, t) => Err(PipelineError::InputSchema(format!(
            "column '{}' is ambiguous: {} numeric and {} non-numeric values",
            name, n, t
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers() -> Vec<String> {
        ["LoanID", "Age", "Employment", "Default"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn columns() -> Vec<Vec<&'static str>> {
        vec![
            vec!["L1", "L2"],
            vec!["31", "45"],
            vec!["Employed", "Unemployed"],
            vec!["0", "1"],
        ]
    }

    #[test]
    fn infers_kinds_and_skips_id_and_label() {
        let cols = columns();
        let schema = SchemaConfig::default()
            .resolve(&headers(), |c| cols[c].iter().copied())
            .unwrap();
        assert_eq!(schema.names(), vec!["Age", "Employment"]);
        assert_eq!(schema.features()[0].kind, FeatureKind::Numerical);
        assert_eq!(schema.features()[1].kind, FeatureKind::Categorical);
    }

    #[test]
    fn mixed_column_is_rejected() {
        let mut cols = columns();
        cols[1] = vec!["31", "unknown"];
        let err = SchemaConfig::default()
            .resolve(&headers(), |c| cols[c].iter().copied())
            .unwrap_err();
        assert!(err.to_string().contains("ambiguous"), "{}", err);
    }

    #[test]
    fn declared_schema_rejects_extra_columns() {
        let cols = columns();
        let cfg = SchemaConfig {
            categorical: Some(vec!["Employment".into()]),
            numerical: Some(vec![]),
            ..SchemaConfig::default()
        };
        let err = cfg
            .resolve(&headers(), |c| cols[c].iter().copied())
            .unwrap_err();
        assert!(err.to_string().contains("Age"), "{}", err);
    }

    #[test]
    fn declared_schema_rejects_missing_columns() {
        let cols = columns();
        let cfg = SchemaConfig {
            categorical: Some(vec!["Employment".into(), "Purpose".into()]),
            numerical: Some(vec!["Age".into()]),
            ..SchemaConfig::default()
        };
        assert!(matches!(
            cfg.resolve(&headers(), |c| cols[c].iter().copied()),
            Err(PipelineError::InputSchema(_))
        ));
    }

    #[test]
    fn missing_label_column_is_schema_error() {
        let cols = columns();
        let cfg = SchemaConfig {
            label_column: "Defaulted".into(),
            ..SchemaConfig::default()
        };
        let err = cfg
            .resolve(&headers(), |c| cols[c].iter().copied())
            .unwrap_err();
        assert!(err.to_string().contains("Defaulted"));
    }
}
