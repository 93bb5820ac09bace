use std::collections::BTreeMap;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::data_handling::{Column, Dataset};
use crate::error::{PipelineError, Result};

/// Vocabulary of one categorical column. The code of a category is its
/// index in `classes`, which is kept sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnEncoding {
    classes: Vec<String>,
}

impl ColumnEncoding {
    fn fit<'a>(values: impl Iterator<Item = &'a String>) -> Self {
        let mut classes: Vec<String> = values.cloned().collect();
        classes.sort_unstable();
        classes.dedup();
        Self { classes }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn encode(&self, value: &str) -> Option<usize> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(value))
            .ok()
    }

    pub fn decode(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }
}

/// Label encodings for every categorical feature, keyed by column name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedCodec {
    feature_names: Vec<String>,
    encoders: BTreeMap<String, ColumnEncoding>,
}

impl FittedCodec {
    /// Build vocabularies from the categorical columns of `train`.
    pub fn fit(train: &Dataset) -> Self {
        let mut encoders = BTreeMap::new();
        for (spec, column) in train.schema().features().iter().zip(train.columns()) {
            if let Column::Categorical(values) = column {
                let encoding = ColumnEncoding::fit(values.iter());
                log::debug!("Encoded {}: {} unique values", spec.name, encoding.classes.len());
                encoders.insert(spec.name.clone(), encoding);
            }
        }
        Self {
            feature_names: train.schema().names(),
            encoders,
        }
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn encoders(&self) -> &BTreeMap<String, ColumnEncoding> {
        &self.encoders
    }

    pub fn encode(&self, column: &str, value: &str) -> Result<usize> {
        let encoding = self.encoders.get(column).ok_or_else(|| {
            PipelineError::InputSchema(format!("column '{}' is not categorical", column))
        })?;
        encoding
            .encode(value)
            .ok_or_else(|| PipelineError::UnknownCategory {
                column: column.to_string(),
                value: value.to_string(),
            })
    }

    pub fn decode(&self, column: &str, code: usize) -> Option<&str> {
        self.encoders.get(column).and_then(|e| e.decode(code))
    }

    /// Numeric feature matrix (rows x features, schema order).
    ///
    /// Fails on the first category that is not in the fitted vocabulary.
    pub fn transform(&self, data: &Dataset) -> Result<Array2<f64>> {
        let names = data.schema().names();
        if names != self.feature_names {
            return Err(PipelineError::InputSchema(format!(
                "feature columns {:?} do not match the fitted columns {:?}",
                names, self.feature_names
            )));
        }

        let n = data.n_samples();
        let mut x = Array2::<f64>::zeros((n, names.len()));
        for (c, (name, column)) in names.iter().zip(data.columns()).enumerate() {
            match column {
                Column::Numerical(values) => {
                    if self.encoders.contains_key(name) {
                        return Err(PipelineError::InputSchema(format!(
                            "column '{}' was categorical at fit time",
                            name
                        )));
                    }
                    for (r, v) in values.iter().enumerate() {
                        x[[r, c]] = *v;
                    }
                }
                Column::Categorical(values) => {
                    for (r, v) in values.iter().enumerate() {
                        x[[r, c]] = self.encode(name, v)? as f64;
                    }
                }
            }
        }
        Ok(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FeatureKind, FeatureSchema, FeatureSpec};

    fn dataset(employment: &[&str]) -> Dataset {
        let schema = FeatureSchema::new(vec![
            FeatureSpec {
                name: "Age".into(),
                kind: FeatureKind::Numerical,
            },
            FeatureSpec {
                name: "Employment".into(),
                kind: FeatureKind::Categorical,
            },
        ])
        .unwrap();
        let n = employment.len();
        Dataset::new(
            schema,
            (0..n).map(|i| format!("L{}", i)).collect(),
            vec![
                Column::Numerical((0..n).map(|i| 20.0 + i as f64).collect()),
                Column::Categorical(employment.iter().map(|s| s.to_string()).collect()),
            ],
            None,
        )
        .unwrap()
    }

    #[test]
    fn codes_are_dense_sorted_and_round_trip() {
        let train = dataset(&["Unemployed", "Employed", "Self-employed", "Employed"]);
        let codec = FittedCodec::fit(&train);
        let x = codec.transform(&train).unwrap();

        let n_classes = codec.encoders()["Employment"].classes().len();
        assert_eq!(n_classes, 3);
        if let Column::Categorical(values) = &train.columns()[1] {
            for (r, original) in values.iter().enumerate() {
                let code = x[[r, 1]] as usize;
                assert!(code < n_classes);
                assert_eq!(codec.decode("Employment", code), Some(original.as_str()));
            }
        }
        assert_eq!(codec.encode("Employment", "Employed").unwrap(), 0);
        assert_eq!(x[[0, 0]], 20.0);
    }

    #[test]
    fn unseen_category_is_an_error() {
        let codec = FittedCodec::fit(&dataset(&["Employed", "Unemployed"]));
        let err = codec.transform(&dataset(&["Employed", "Retired"])).unwrap_err();
        match err {
            PipelineError::UnknownCategory { column, value } => {
                assert_eq!(column, "Employment");
                assert_eq!(value, "Retired");
            }
            other => panic!("expected UnknownCategory, got {:?}", other),
        }
    }

    #[test]
    fn codec_survives_json() {
        let codec = FittedCodec::fit(&dataset(&["b", "a"]));
        let json = serde_json::to_string(&codec).unwrap();
        let back: FittedCodec = serde_json::from_str(&json).unwrap();
        assert_eq!(codec, back);
    }
}
