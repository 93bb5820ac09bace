//! Loan application CSV reader.
use std::io::Read;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use csv::StringRecord;

use crate::data_handling::{Column, Dataset};
use crate::error::PipelineError;
use crate::schema::{FeatureKind, FeatureSchema, SchemaConfig};

/// Read a labelled loan table, resolving the feature schema from `config`.
pub fn read_loan_csv<P: AsRef<Path>>(path: P, config: &SchemaConfig) -> Result<Dataset> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(&path)
        .with_context(|| format!("Failed to open loan table: {}", path.as_ref().display()))?;
    read_records(reader, config)
        .with_context(|| format!("Failed to load loan table: {}", path.as_ref().display()))
}

/// Same as [`read_loan_csv`] for any reader (used for in-memory tables).
pub fn read_loan_table<R: Read>(input: R, config: &SchemaConfig) -> Result<Dataset> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(input);
    read_records(reader, config)
}

/// Read rows to score against an already fitted schema.
///
/// The label column is optional here; the feature columns must match the
/// fitted schema exactly.
pub fn read_inference_csv<P: AsRef<Path>>(
    path: P,
    schema: &FeatureSchema,
    config: &SchemaConfig,
) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(&path)
        .with_context(|| format!("Failed to open input table: {}", path.as_ref().display()))?;

    let headers = header_names(&mut reader)?;
    let records = collect_records(&mut reader)?;

    let id_idx = find_column(&headers, &config.id_column).ok_or_else(|| {
        PipelineError::InputSchema(format!("missing identifier column '{}'", config.id_column))
    })?;
    let label_idx = find_column(&headers, &config.label_column);

    for (idx, name) in headers.iter().enumerate() {
        if idx != id_idx && Some(idx) != label_idx && schema.position(name).is_none() {
            return Err(PipelineError::InputSchema(format!(
                "column '{}' was not part of the trained feature set",
                name
            ))
            .into());
        }
    }

    build_dataset(&headers, &records, schema.clone(), id_idx, label_idx)
        .with_context(|| format!("Failed to load input table: {}", path.as_ref().display()))
}

fn read_records<R: Read>(mut reader: csv::Reader<R>, config: &SchemaConfig) -> Result<Dataset> {
    config.validate()?;
    let headers = header_names(&mut reader)?;
    let records = collect_records(&mut reader)?;
    if records.is_empty() {
        return Err(PipelineError::InputSchema("table has no data rows".to_string()).into());
    }

    let schema = config.resolve(&headers, |col| {
        records.iter().map(move |r| r.get(col).unwrap_or(""))
    })?;

    let id_idx = find_column(&headers, &config.id_column)
        .ok_or_else(|| anyhow!("Missing identifier column '{}'", config.id_column))?;
    let label_idx = find_column(&headers, &config.label_column)
        .ok_or_else(|| anyhow!("Missing label column '{}'", config.label_column))?;

    build_dataset(&headers, &records, schema, id_idx, Some(label_idx))
}

fn header_names<R: Read>(reader: &mut csv::Reader<R>) -> Result<Vec<String>> {
    let headers = reader
        .headers()
        .context("Failed to read header row")?
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();
    Ok(headers)
}

fn collect_records<R: Read>(reader: &mut csv::Reader<R>) -> Result<Vec<StringRecord>> {
    reader
        .records()
        .enumerate()
        .map(|(row_idx, r)| r.with_context(|| format!("Failed to read row {}", row_idx + 1)))
        .collect()
}

fn find_column(headers: &[String], name: &str) -> Option<usize> {
    headers.iter().position(|h| h == name)
}

fn build_dataset(
    headers: &[String],
    records: &[StringRecord],
    schema: FeatureSchema,
    id_idx: usize,
    label_idx: Option<usize>,
) -> Result<Dataset> {
    let mut feature_indices = Vec::with_capacity(schema.len());
    for spec in schema.features() {
        let idx = find_column(headers, &spec.name).ok_or_else(|| {
            PipelineError::InputSchema(format!("missing feature column '{}'", spec.name))
        })?;
        feature_indices.push(idx);
    }

    let ids = records
        .iter()
        .map(|r| r.get(id_idx).unwrap_or_default().to_string())
        .collect::<Vec<_>>();

    let labels = match label_idx {
        Some(idx) => Some(
            records
                .iter()
                .enumerate()
                .map(|(row, r)| parse_label(r.get(idx).unwrap_or_default(), row))
                .collect::<std::result::Result<Vec<u8>, PipelineError>>()?,
        ),
        None => None,
    };

    let mut columns = Vec::with_capacity(schema.len());
    for (spec, &idx) in schema.features().iter().zip(feature_indices.iter()) {
        let column = match spec.kind {
            FeatureKind::Categorical => Column::Categorical(
                records
                    .iter()
                    .enumerate()
                    .map(|(row, r)| {
                        let v = r.get(idx).unwrap_or_default();
                        if v.is_empty() {
                            Err(missing_value(&spec.name, row))
                        } else {
                            Ok(v.to_string())
                        }
                    })
                    .collect::<std::result::Result<Vec<_>, PipelineError>>()?,
            ),
            FeatureKind::Numerical => Column::Numerical(
                records
                    .iter()
                    .enumerate()
                    .map(|(row, r)| parse_numeric(&spec.name, r.get(idx).unwrap_or_default(), row))
                    .collect::<std::result::Result<Vec<_>, PipelineError>>()?,
            ),
        };
        columns.push(column);
    }

    Ok(Dataset::new(schema, ids, columns, labels)?)
}

fn missing_value(column: &str, row: usize) -> PipelineError {
    PipelineError::InputSchema(format!("missing value in column '{}' at row {}", column, row + 1))
}

fn parse_numeric(column: &str, raw: &str, row: usize) -> std::result::Result<f64, PipelineError> {
    if raw.is_empty() {
        return Err(missing_value(column, row));
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(PipelineError::InputSchema(format!(
            "invalid numeric value '{}' in column '{}' at row {}",
            raw,
            column,
            row + 1
        ))),
    }
}

fn parse_label(raw: &str, row: usize) -> std::result::Result<u8, PipelineError> {
    match raw.parse::<f64>() {
        Ok(v) if v == 0.0 => Ok(0),
        Ok(v) if v == 1.0 => Ok(1),
        _ => Err(PipelineError::InputSchema(format!(
            "label '{}' at row {} is not 0 or 1",
            raw,
            row + 1
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
LoanID,Age,Income,Employment,Default
A1,25,32000.5,Employed,0
A2,61,12000,Unemployed,1
A3,40,58000,Employed,0
";

    #[test]
    fn reads_table_with_inferred_schema() {
        let ds = read_loan_table(TABLE.as_bytes(), &SchemaConfig::default()).unwrap();
        assert_eq!(ds.n_samples(), 3);
        assert_eq!(ds.schema().names(), vec!["Age", "Income", "Employment"]);
        assert_eq!(ds.labels().unwrap(), &[0, 1, 0]);
        assert_eq!(ds.ids()[1], "A2");
        assert_eq!(
            ds.column("Income"),
            Some(&Column::Numerical(vec![32000.5, 12000.0, 58000.0]))
        );
    }

    #[test]
    fn non_binary_label_fails() {
        let table = "LoanID,Age,Default\nA1,25,2\nA2,30,0\n";
        let err = read_loan_table(table.as_bytes(), &SchemaConfig::default()).unwrap_err();
        let root = err.downcast_ref::<PipelineError>().expect("typed error");
        assert!(matches!(root, PipelineError::InputSchema(_)));
    }

    #[test]
    fn missing_label_column_fails() {
        let table = "LoanID,Age\nA1,25\n";
        let err = read_loan_table(table.as_bytes(), &SchemaConfig::default()).unwrap_err();
        assert!(err.to_string().contains("Default"), "{:#}", err);
    }

    #[test]
    fn empty_cell_is_reported_with_row() {
        let table = "LoanID,Age,Employment,Default\nA1,25,,0\nA2,30,Employed,1\n";
        let cfg = SchemaConfig {
            categorical: Some(vec!["Employment".into()]),
            numerical: Some(vec!["Age".into()]),
            ..SchemaConfig::default()
        };
        let err = read_loan_table(table.as_bytes(), &cfg).unwrap_err();
        assert!(format!("{:#}", err).contains("row 1"), "{:#}", err);
    }

    #[test]
    fn inference_table_may_omit_label() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("score.csv");
        std::fs::write(&path, "LoanID,Age,Income,Employment\nB1,33,41000,Employed\n").unwrap();

        let train = read_loan_table(TABLE.as_bytes(), &SchemaConfig::default()).unwrap();
        let ds = read_inference_csv(&path, train.schema(), &SchemaConfig::default()).unwrap();
        assert_eq!(ds.n_samples(), 1);
        assert!(ds.labels().is_none());
    }

    #[test]
    fn inference_table_rejects_unknown_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("score.csv");
        std::fs::write(
            &path,
            "LoanID,Age,Income,Employment,Purpose\nB1,33,41000,Employed,Auto\n",
        )
        .unwrap();

        let train = read_loan_table(TABLE.as_bytes(), &SchemaConfig::default()).unwrap();
        let err = read_inference_csv(&path, train.schema(), &SchemaConfig::default()).unwrap_err();
        assert!(err.to_string().contains("Purpose"), "{:#}", err);
    }
}
