//! Error types for the text preparation pipeline.
//!
//! Every failure a stage can hit is a variant of [`PipelineError`]. None of
//! them terminate the process: the controller parks at the current stage and
//! the caller may retry once the input is corrected.
//!
//! Errors are serializable as `{ code, message }` so a presentation layer can
//! render them without matching on variants.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

use crate::pipeline::stage::{PipelineStage, PipelineStep};
use crate::types::DatasetRole;

/// The main error type for the text preparation pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A file was offered for a role under the wrong name.
    #[error("Expected '{expected}' for the {role} dataset, got '{actual}'")]
    NameMismatch {
        role: DatasetRole,
        expected: String,
        actual: String,
    },

    /// The tabular parser rejected the file itself.
    #[error("Failed to parse {role} dataset '{file}': {reason}")]
    ParseStructural {
        role: DatasetRole,
        file: String,
        reason: String,
    },

    /// One or more roles produced zero usable rows.
    #[error("No usable rows in: {}", format_roles(.roles))]
    EmptyDataset { roles: Vec<DatasetRole> },

    /// The training header does not hold enough columns to pick text and label.
    #[error("Cannot determine text/label columns: {0}")]
    MissingColumns(String),

    /// Rows could not be turned into tensors.
    #[error("Encoding failed: {0}")]
    Encoding(String),

    /// The classifier factory could not build a model.
    #[error("Model creation failed: {0}")]
    ModelCreation(String),

    /// The classifier collaborator failed while fitting.
    #[error("Training failed: {0}")]
    TrainingFailed(String),

    /// The classifier collaborator failed while evaluating.
    #[error("Evaluation failed: {0}")]
    EvaluationFailed(String),

    /// The classifier collaborator failed while predicting.
    #[error("Prediction failed: {0}")]
    PredictionFailed(String),

    /// A stage was entered before its prerequisite stage succeeded.
    #[error("Cannot run {step}: requires stage {required:?}, pipeline is at {current:?}")]
    StageNotReady {
        step: PipelineStep,
        required: PipelineStage,
        current: PipelineStage,
    },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal error (e.g., parser thread panicked).
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PipelineError>,
    },
}

fn format_roles(roles: &[DatasetRole]) -> String {
    roles
        .iter()
        .map(|r| r.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl PipelineError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PipelineError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get error code for frontend handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NameMismatch { .. } => "NAME_MISMATCH",
            Self::ParseStructural { .. } => "PARSE_STRUCTURAL",
            Self::EmptyDataset { .. } => "EMPTY_DATASET",
            Self::MissingColumns(_) => "MISSING_COLUMNS",
            Self::Encoding(_) => "ENCODING_ERROR",
            Self::ModelCreation(_) => "MODEL_CREATION_FAILED",
            Self::TrainingFailed(_) => "TRAINING_FAILED",
            Self::EvaluationFailed(_) => "EVALUATION_FAILED",
            Self::PredictionFailed(_) => "PREDICTION_FAILED",
            Self::StageNotReady { .. } => "STAGE_NOT_READY",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if the user can fix this by correcting input and retrying.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::NameMismatch { .. }
            | Self::ParseStructural { .. }
            | Self::EmptyDataset { .. }
            | Self::MissingColumns(_)
            | Self::StageNotReady { .. }
            | Self::InvalidConfig(_) => true,
            Self::WithContext { source, .. } => source.is_recoverable(),
            _ => false,
        }
    }

    /// Check if this error is a stage-order violation.
    pub fn is_stage_not_ready(&self) -> bool {
        matches!(self, Self::StageNotReady { .. })
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for PipelineError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PipelineError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PipelineError::Io(e).with_context(context))
    }
}
