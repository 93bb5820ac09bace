use std::fmt;
use std::path::PathBuf;

use crate::config::ModelKind;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Stage of a training run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum PipelineStage {
    Idle,
    Preprocessed,
    Trained,
    Evaluated,
    Persisted,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Preprocessed => "preprocessing",
            PipelineStage::Trained => "training",
            PipelineStage::Evaluated => "evaluation",
            PipelineStage::Persisted => "persistence",
        };
        f.write_str(name)
    }
}

/// Every failure the pipeline can surface. None of them are retried.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("input schema error: {0}")]
    InputSchema(String),

    #[error("unknown category '{value}' in column '{column}' (not seen at fit time)")]
    UnknownCategory { column: String, value: String },

    #[error("class {label} has {count} samples, too few to stratify (need at least {required})")]
    InsufficientSamples {
        label: u8,
        count: usize,
        required: usize,
    },

    #[error("{model} failed to fit: {reason}")]
    ModelFit { model: ModelKind, reason: String },

    #[error("evaluation of {model} failed: {reason}")]
    Evaluation { model: ModelKind, reason: String },

    #[error("failed to persist {}: {reason}", .path.display())]
    Persistence { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cannot move from {from} to {to}")]
    InvalidTransition {
        from: PipelineStage,
        to: PipelineStage,
    },

    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: PipelineStage,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    pub fn model_fit(model: ModelKind, reason: impl Into<String>) -> Self {
        PipelineError::ModelFit {
            model,
            reason: reason.into(),
        }
    }

    pub fn persistence(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        PipelineError::Persistence {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Wrap this error with the stage it happened in. Already wrapped errors
    /// keep their innermost stage.
    pub fn in_stage(self, stage: PipelineStage) -> Self {
        match self {
            PipelineError::Stage { .. } => self,
            other => PipelineError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The underlying error with stage wrappers removed.
    pub fn root(&self) -> &PipelineError {
        match self {
            PipelineError::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_wrapping_is_idempotent() {
        let err = PipelineError::InputSchema("missing column".into())
            .in_stage(PipelineStage::Preprocessed)
            .in_stage(PipelineStage::Trained);
        match &err {
            PipelineError::Stage { stage, .. } => assert_eq!(*stage, PipelineStage::Preprocessed),
            other => panic!("expected stage wrapper, got {:?}", other),
        }
        assert!(matches!(err.root(), PipelineError::InputSchema(_)));
        assert!(err.to_string().contains("preprocessing stage failed"));
    }

    #[test]
    fn unknown_category_message_names_column_and_value() {
        let err = PipelineError::UnknownCategory {
            column: "Employment".into(),
            value: "Retired".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Employment"));
        assert!(msg.contains("Retired"));
    }
}
