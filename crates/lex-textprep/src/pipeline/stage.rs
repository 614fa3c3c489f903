//! Pipeline states, user-visible steps and the failure overlay.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PipelineError;

/// How far the pipeline has progressed. Ordered: a later variant implies
/// every earlier one completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Fewer than three files accepted
    AwaitingFiles,
    /// One accepted file per role
    FilesReady,
    /// All three files parsed into raw tables
    Parsed,
    /// Text and label columns determined
    Inspected,
    /// Rows normalized and vocabulary built
    Preprocessed,
    /// Every role encoded to fixed-length sequences
    Embedded,
    /// A classifier was created for the current encoding
    ModelReady,
    /// The classifier was fitted
    Trained,
    /// Test-set metrics computed
    Evaluated,
    /// At least one ad-hoc prediction served
    PredictReady,
}

impl PipelineStage {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::AwaitingFiles => "Awaiting Files",
            Self::FilesReady => "Files Ready",
            Self::Parsed => "Parsed",
            Self::Inspected => "Inspected",
            Self::Preprocessed => "Preprocessed",
            Self::Embedded => "Embedded",
            Self::ModelReady => "Model Ready",
            Self::Trained => "Trained",
            Self::Evaluated => "Evaluated",
            Self::PredictReady => "Predict Ready",
        }
    }

    /// The step the user is positioned at in this state.
    pub fn current_step(&self) -> PipelineStep {
        match self {
            Self::AwaitingFiles => PipelineStep::FileSelect,
            Self::FilesReady => PipelineStep::Parse,
            Self::Parsed => PipelineStep::Inspect,
            Self::Inspected => PipelineStep::Preprocess,
            Self::Preprocessed => PipelineStep::Embed,
            Self::Embedded | Self::ModelReady => PipelineStep::Train,
            Self::Trained => PipelineStep::Evaluate,
            Self::Evaluated | Self::PredictReady => PipelineStep::Predict,
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// The eight steps a presentation layer shows, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    FileSelect,
    Parse,
    Inspect,
    Preprocess,
    Embed,
    Train,
    Evaluate,
    Predict,
}

impl PipelineStep {
    pub const ALL: [PipelineStep; 8] = [
        Self::FileSelect,
        Self::Parse,
        Self::Inspect,
        Self::Preprocess,
        Self::Embed,
        Self::Train,
        Self::Evaluate,
        Self::Predict,
    ];

    /// 1-based position among the eight steps.
    pub fn number(&self) -> usize {
        *self as usize + 1
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::FileSelect => "Select Files",
            Self::Parse => "Parse Datasets",
            Self::Inspect => "Inspect Columns",
            Self::Preprocess => "Preprocess Rows",
            Self::Embed => "Embed Sequences",
            Self::Train => "Train Model",
            Self::Evaluate => "Evaluate Model",
            Self::Predict => "Predict",
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// The last stage failure. Kept until the next successful stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    pub step: PipelineStep,
    pub code: String,
    pub message: String,
}

impl StageFailure {
    pub fn new(step: PipelineStep, error: &PipelineError) -> Self {
        Self {
            step,
            code: error.error_code().to_string(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        assert!(PipelineStage::AwaitingFiles < PipelineStage::FilesReady);
        assert!(PipelineStage::Embedded < PipelineStage::ModelReady);
        assert!(PipelineStage::Evaluated < PipelineStage::PredictReady);
    }

    #[test]
    fn test_step_numbers() {
        let numbers: Vec<usize> = PipelineStep::ALL.iter().map(|s| s.number()).collect();
        assert_eq!(numbers, (1..=8).collect::<Vec<_>>());
    }

    #[test]
    fn test_current_step() {
        assert_eq!(PipelineStage::AwaitingFiles.current_step(), PipelineStep::FileSelect);
        assert_eq!(PipelineStage::ModelReady.current_step(), PipelineStep::Train);
        assert_eq!(PipelineStage::PredictReady.current_step(), PipelineStep::Predict);
    }

    #[test]
    fn test_stage_json_values() {
        let expectations = [
            (PipelineStage::AwaitingFiles, "\"awaiting_files\""),
            (PipelineStage::ModelReady, "\"model_ready\""),
            (PipelineStage::PredictReady, "\"predict_ready\""),
        ];
        for (stage, expected) in expectations {
            assert_eq!(serde_json::to_string(&stage).unwrap(), expected);
        }
        assert_eq!(
            serde_json::to_string(&PipelineStep::FileSelect).unwrap(),
            "\"file_select\""
        );
    }

    #[test]
    fn test_failure_from_error() {
        let err = PipelineError::Encoding("ragged".to_string());
        let failure = StageFailure::new(PipelineStep::Embed, &err);
        assert_eq!(failure.code, "ENCODING_ERROR");
        assert_eq!(failure.message, "Encoding failed: ragged");
    }
}
