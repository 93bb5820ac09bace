//! In-memory representation of a loaded loan table.
//!
//! Values are stored column-major: each feature column is either a vector
//! of raw category strings or a vector of floats, in schema order. Labels
//! are optional so the same type carries inference inputs.
use crate::error::{PipelineError, Result};
use crate::schema::{FeatureKind, FeatureSchema};

#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Categorical(Vec<String>),
    Numerical(Vec<f64>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Categorical(v) => v.len(),
            Column::Numerical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> FeatureKind {
        match self {
            Column::Categorical(_) => FeatureKind::Categorical,
            Column::Numerical(_) => FeatureKind::Numerical,
        }
    }

    fn select(&self, indices: &[usize]) -> Column {
        match self {
            Column::Categorical(v) => {
                Column::Categorical(indices.iter().map(|&i| v[i].clone()).collect())
            }
            Column::Numerical(v) => Column::Numerical(indices.iter().map(|&i| v[i]).collect()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dataset {
    schema: FeatureSchema,
    ids: Vec<String>,
    columns: Vec<Column>,
    labels: Option<Vec<u8>>,
}

impl Dataset {
    /// Assemble a dataset, checking that every column matches the schema and
    /// that all row-aligned vectors agree in length.
    pub fn new(
        schema: FeatureSchema,
        ids: Vec<String>,
        columns: Vec<Column>,
        labels: Option<Vec<u8>>,
    ) -> Result<Self> {
        if columns.len() != schema.len() {
            return Err(PipelineError::InputSchema(format!(
                "schema has {} features but {} columns were provided",
                schema.len(),
                columns.len()
            )));
        }
        let n = ids.len();
        for (spec, column) in schema.features().iter().zip(columns.iter()) {
            if column.kind() != spec.kind {
                return Err(PipelineError::InputSchema(format!(
                    "column '{}' does not match its declared kind {:?}",
                    spec.name, spec.kind
                )));
            }
            if column.len() != n {
                return Err(PipelineError::InputSchema(format!(
                    "column '{}' has {} values, expected {}",
                    spec.name,
                    column.len(),
                    n
                )));
            }
        }
        if let Some(labels) = &labels {
            if labels.len() != n {
                return Err(PipelineError::InputSchema(format!(
                    "{} labels for {} rows",
                    labels.len(),
                    n
                )));
            }
            if let Some(bad) = labels.iter().find(|&&l| l > 1) {
                return Err(PipelineError::InputSchema(format!(
                    "label {} is not binary",
                    bad
                )));
            }
        }
        Ok(Self {
            schema,
            ids,
            columns,
            labels,
        })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.schema.position(name).map(|i| &self.columns[i])
    }

    pub fn labels(&self) -> Option<&[u8]> {
        self.labels.as_deref()
    }

    /// Labels, or an error for datasets loaded without a label column.
    pub fn require_labels(&self) -> Result<&[u8]> {
        self.labels().ok_or_else(|| {
            PipelineError::InputSchema("dataset has no label column".to_string())
        })
    }

    pub fn n_samples(&self) -> usize {
        self.ids.len()
    }

    pub fn n_positive(&self) -> usize {
        self.labels
            .as_ref()
            .map(|l| l.iter().filter(|&&v| v == 1).count())
            .unwrap_or(0)
    }

    pub fn log_input_data_summary(&self) {
        log::info!(
            "Loaded {} rows with {} features ({} categorical, {} numerical)",
            self.n_samples(),
            self.schema.len(),
            self.schema.categorical().count(),
            self.schema.numerical().count()
        );
        if self.labels.is_some() {
            let pos = self.n_positive();
            let n = self.n_samples().max(1);
            log::info!(
                "Target distribution: {} negative / {} positive ({:.2}% positive)",
                self.n_samples() - pos,
                pos,
                100.0 * pos as f64 / n as f64
            );
        }
    }

    /// Rows at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> Dataset {
        Dataset {
            schema: self.schema.clone(),
            ids: indices.iter().map(|&i| self.ids[i].clone()).collect(),
            columns: self.columns.iter().map(|c| c.select(indices)).collect(),
            labels: self
                .labels
                .as_ref()
                .map(|l| indices.iter().map(|&i| l[i]).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FeatureSpec;

    fn schema() -> FeatureSchema {
        FeatureSchema::new(vec![
            FeatureSpec {
                name: "Age".into(),
                kind: FeatureKind::Numerical,
            },
            FeatureSpec {
                name: "Employment".into(),
                kind: FeatureKind::Categorical,
            },
        ])
        .unwrap()
    }

    fn dataset() -> Dataset {
        Dataset::new(
            schema(),
            vec!["a".into(), "b".into(), "c".into()],
            vec![
                Column::Numerical(vec![30.0, 40.0, 50.0]),
                Column::Categorical(vec![
                    "Employed".into(),
                    "Unemployed".into(),
                    "Employed".into(),
                ]),
            ],
            Some(vec![0, 1, 0]),
        )
        .unwrap()
    }

    #[test]
    fn select_keeps_rows_aligned() {
        let ds = dataset().select(&[2, 1]);
        assert_eq!(ds.ids(), &["c".to_string(), "b".to_string()]);
        assert_eq!(ds.labels().unwrap(), &[0, 1]);
        assert_eq!(ds.column("Age"), Some(&Column::Numerical(vec![50.0, 40.0])));
    }

    #[test]
    fn non_binary_label_is_rejected() {
        let err = Dataset::new(
            schema(),
            vec!["a".into()],
            vec![
                Column::Numerical(vec![1.0]),
                Column::Categorical(vec!["x".into()]),
            ],
            Some(vec![2]),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::InputSchema(_)));
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let err = Dataset::new(
            schema(),
            vec!["a".into()],
            vec![
                Column::Categorical(vec!["1".into()]),
                Column::Categorical(vec!["x".into()]),
            ],
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Age"));
    }
}
