//! Artifact persistence.
//!
//! Every artifact of a run is rendered in memory before anything touches
//! disk. All files are then staged as hidden synced siblings, and only once
//! every one of them is on disk are they renamed over their destinations.
//! A reader never observes a partially written file, and a failed write
//! leaves the previous bundle in place.
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::ModelKind;
use crate::error::{PipelineError, Result};
use crate::evaluation::{FeatureImportanceTable, ModelComparison};
use crate::models::{load_model, ClassifierModel};
use crate::preprocessing::{FittedCodec, Scaler};
use crate::schema::FeatureSchema;

/// Bumped whenever the on-disk model envelope changes shape.
pub const FORMAT_VERSION: u32 = 1;

/// Fixed artifact paths under an output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    root: PathBuf,
}

impl ArtifactLayout {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn models_dir(&self) -> PathBuf {
        self.root.join("models")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.root.join("results")
    }

    pub fn model_path(&self, kind: ModelKind) -> PathBuf {
        self.models_dir()
            .join(format!("{}_model.json", kind.file_stem()))
    }

    pub fn scaler_path(&self) -> PathBuf {
        self.models_dir().join("scaler.json")
    }

    pub fn label_encoders_path(&self) -> PathBuf {
        self.models_dir().join("label_encoders.json")
    }

    pub fn feature_names_path(&self) -> PathBuf {
        self.models_dir().join("feature_names.json")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.models_dir().join("manifest.json")
    }

    pub fn comparison_path(&self) -> PathBuf {
        self.results_dir().join("model_comparison.csv")
    }

    pub fn classification_reports_path(&self) -> PathBuf {
        self.results_dir().join("classification_reports.txt")
    }

    /// Only the tree families have an importance table.
    pub fn importance_path(&self, kind: ModelKind) -> Option<PathBuf> {
        match kind {
            ModelKind::LogisticRegression => None,
            _ => Some(
                self.results_dir()
                    .join(format!("{}_feature_importance.csv", kind.file_stem())),
            ),
        }
    }

    pub fn html_report_path(&self) -> PathBuf {
        self.results_dir().join("training_report.html")
    }
}

/// Provenance of a run, stored next to the models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub crate_version: String,
    /// RFC 3339 timestamp of the run.
    pub created_at: String,
    pub seed: u64,
    pub test_fraction: f64,
    pub id_column: String,
    pub label_column: String,
    pub n_train: usize,
    pub n_test: usize,
    pub train_positive: usize,
    pub test_positive: usize,
    pub schema: FeatureSchema,
    pub models: Vec<ModelKind>,
}

#[derive(Serialize, Deserialize)]
struct ModelEnvelope {
    kind: ModelKind,
    format_version: u32,
    model: serde_json::Value,
}

/// Borrowed view of everything a finished run persists.
pub struct ArtifactBundle<'a> {
    pub manifest: &'a RunManifest,
    pub codec: &'a FittedCodec,
    pub scaler: &'a Scaler,
    pub models: Vec<&'a dyn ClassifierModel>,
    pub comparison: &'a ModelComparison,
    pub html_report: Option<String>,
}

/// Render and write the bundle. Returns the written paths in write order.
///
/// Every file is staged as a synced temporary sibling before any of them is
/// renamed into place, so a failed write leaves the previous bundle intact.
/// Fixed artifact paths this run did not produce are removed afterwards.
pub fn persist(bundle: &ArtifactBundle<'_>, layout: &ArtifactLayout) -> Result<Vec<PathBuf>> {
    let files = render_bundle(bundle, layout)?;

    for dir in [layout.models_dir(), layout.results_dir()] {
        fs::create_dir_all(&dir).map_err(|e| PipelineError::persistence(&dir, e))?;
    }

    let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(files.len());
    for (path, bytes) in &files {
        match stage_file(path, bytes) {
            Ok(tmp) => staged.push((tmp, path.clone())),
            Err(e) => {
                discard_staged(&staged);
                return Err(e);
            }
        }
    }

    for (i, (tmp, path)) in staged.iter().enumerate() {
        if let Err(e) = fs::rename(tmp, path) {
            discard_staged(&staged[i..]);
            return Err(PipelineError::persistence(path, e));
        }
        log::debug!("Wrote {}", path.display());
    }

    let written: Vec<PathBuf> = files.into_iter().map(|(p, _)| p).collect();
    remove_stale(layout, &written)?;
    log::info!("Saved {} artifacts under {}", written.len(), layout.root().display());
    Ok(written)
}

/// Every path a run may produce, whether or not this run produces it.
fn fixed_paths(layout: &ArtifactLayout) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = ModelKind::ALL.iter().map(|&k| layout.model_path(k)).collect();
    paths.extend(ModelKind::ALL.iter().filter_map(|&k| layout.importance_path(k)));
    paths.push(layout.html_report_path());
    paths
}

fn remove_stale(layout: &ArtifactLayout, written: &[PathBuf]) -> Result<()> {
    for path in fixed_paths(layout) {
        if !written.contains(&path) && path.is_file() {
            fs::remove_file(&path).map_err(|e| PipelineError::persistence(&path, e))?;
            log::debug!("Removed stale {}", path.display());
        }
    }
    Ok(())
}

fn discard_staged(staged: &[(PathBuf, PathBuf)]) {
    for (tmp, _) in staged {
        let _ = fs::remove_file(tmp);
    }
}

fn render_bundle(
    bundle: &ArtifactBundle<'_>,
    layout: &ArtifactLayout,
) -> Result<Vec<(PathBuf, Vec<u8>)>> {
    let mut files = Vec::new();

    for model in &bundle.models {
        let kind = model.kind();
        if !model.is_fitted() {
            return Err(PipelineError::persistence(
                layout.model_path(kind),
                format!("{} is not fitted", kind),
            ));
        }
        let envelope = ModelEnvelope {
            kind,
            format_version: FORMAT_VERSION,
            model: model.to_json()?,
        };
        let path = layout.model_path(kind);
        let bytes = to_json_bytes(&path, &envelope)?;
        files.push((path, bytes));
    }

    let path = layout.scaler_path();
    files.push((path.clone(), to_json_bytes(&path, bundle.scaler)?));
    let path = layout.label_encoders_path();
    files.push((path.clone(), to_json_bytes(&path, bundle.codec)?));
    let path = layout.feature_names_path();
    files.push((path.clone(), to_json_bytes(&path, &bundle.codec.feature_names())?));
    let path = layout.manifest_path();
    files.push((path.clone(), to_json_bytes(&path, bundle.manifest)?));

    let path = layout.comparison_path();
    let bytes = render_comparison_csv(bundle.comparison)
        .map_err(|e| PipelineError::persistence(&path, e))?;
    files.push((path, bytes));
    files.push((
        layout.classification_reports_path(),
        render_classification_reports(bundle.comparison).into_bytes(),
    ));

    for evaluation in bundle.comparison.ranked() {
        if let (Some(table), Some(path)) = (
            evaluation.importance.as_ref(),
            layout.importance_path(evaluation.model()),
        ) {
            let bytes =
                render_importance_csv(table).map_err(|e| PipelineError::persistence(&path, e))?;
            files.push((path, bytes));
        }
    }

    if let Some(html) = &bundle.html_report {
        files.push((layout.html_report_path(), html.clone().into_bytes()));
    }
    Ok(files)
}

fn to_json_bytes<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(value).map_err(|e| PipelineError::persistence(path, e))
}

/// Write `bytes` to the temporary sibling of `path` and sync it.
///
/// Returns the temporary path; the destination itself is untouched. A
/// destination that exists but is not a regular file is rejected up front.
fn stage_file(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| PipelineError::persistence(path, "path has no file name"))?;
    if path.exists() && !path.is_file() {
        return Err(PipelineError::persistence(path, "destination exists and is not a file"));
    }
    let tmp = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));

    let result = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.flush()?;
        file.sync_all()
    })();
    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(PipelineError::persistence(path, e));
    }
    Ok(tmp)
}

/// Write `bytes` to `path` through a synced temporary sibling and a rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = stage_file(path, bytes)?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        PipelineError::persistence(path, e)
    })
}

/// Comparison table, best model first.
pub fn render_comparison_csv(
    comparison: &ModelComparison,
) -> std::result::Result<Vec<u8>, csv::Error> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record([
        "model",
        "accuracy",
        "precision",
        "recall",
        "f1",
        "roc_auc",
        "training_time_s",
        "prediction_time_ms",
    ])?;
    for e in comparison.ranked() {
        let m = &e.metrics;
        wtr.write_record([
            m.model.display_name().to_string(),
            format!("{:.6}", m.accuracy),
            format!("{:.6}", m.precision),
            format!("{:.6}", m.recall),
            format!("{:.6}", m.f1),
            format!("{:.6}", m.roc_auc),
            format!("{:.4}", e.timing.fit_seconds),
            format!("{:.6}", e.timing.predict_ms_per_sample),
        ])?;
    }
    wtr.into_inner().map_err(|e| e.into_error().into())
}

pub fn render_importance_csv(
    table: &FeatureImportanceTable,
) -> std::result::Result<Vec<u8>, csv::Error> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(["feature", "importance"])?;
    for row in &table.rows {
        wtr.write_record([row.feature.clone(), format!("{:.6}", row.importance)])?;
    }
    wtr.into_inner().map_err(|e| e.into_error().into())
}

/// All per-model reports in family order.
pub fn render_classification_reports(comparison: &ModelComparison) -> String {
    let rule = "=".repeat(60);
    let mut out = format!("{}\nCLASSIFICATION REPORTS\n{}\n\n", rule, rule);
    for kind in ModelKind::ALL {
        if let Some(e) = comparison.get(kind) {
            out.push_str(&format!("\n{}\n{}\n", kind.display_name(), "-".repeat(60)));
            out.push_str(&e.report.render());
            out.push('\n');
        }
    }
    out
}

/// Fitted state read back from an artifact root.
pub struct LoadedArtifacts {
    pub manifest: RunManifest,
    pub codec: FittedCodec,
    pub scaler: Scaler,
    pub feature_names: Vec<String>,
    pub models: Vec<Box<dyn ClassifierModel>>,
}

pub fn load(layout: &ArtifactLayout) -> Result<LoadedArtifacts> {
    let manifest: RunManifest = read_json(&layout.manifest_path())?;
    let codec: FittedCodec = read_json(&layout.label_encoders_path())?;
    let scaler: Scaler = read_json(&layout.scaler_path())?;
    let feature_names: Vec<String> = read_json(&layout.feature_names_path())?;

    if feature_names != manifest.schema.names()
        || feature_names.as_slice() != codec.feature_names()
    {
        return Err(PipelineError::persistence(
            layout.feature_names_path(),
            "feature names disagree with the manifest or the label encoders",
        ));
    }
    if scaler.feature_names != feature_names {
        return Err(PipelineError::persistence(
            layout.scaler_path(),
            "scaler columns disagree with the feature names",
        ));
    }

    let mut models = Vec::with_capacity(manifest.models.len());
    for &kind in &manifest.models {
        let path = layout.model_path(kind);
        let envelope: ModelEnvelope = read_json(&path)?;
        if envelope.kind != kind {
            return Err(PipelineError::persistence(
                &path,
                format!("file holds a {} model", envelope.kind),
            ));
        }
        if envelope.format_version != FORMAT_VERSION {
            return Err(PipelineError::persistence(
                &path,
                format!("unsupported format version {}", envelope.format_version),
            ));
        }
        models.push(load_model(kind, envelope.model)?);
    }

    Ok(LoadedArtifacts {
        manifest,
        codec,
        scaler,
        feature_names,
        models,
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read(path).map_err(|e| PipelineError::persistence(path, e))?;
    serde_json::from_slice(&content).map_err(|e| PipelineError::persistence(path, e))
}
