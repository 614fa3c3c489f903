//! Artifacts of one pipeline run and the reports each stage returns.

use serde::{Deserialize, Serialize};

use super::stage::PipelineStage;
use crate::classifier::{Classifier, EvaluationMetrics, TrainingHistory};
use crate::dataset::{DatasetFileValidator, NormalizedTable};
use crate::text::{EncodedDataset, Vocabulary};
use crate::types::{ColumnKeys, DatasetFile, PerRole, RawRow, RawTable};

/// Everything the stages have produced so far.
///
/// Each artifact belongs to the stage that produced it;
/// [`PipelineRun::clear_after`] drops every artifact of later stages.
pub struct PipelineRun {
    pub(crate) validator: DatasetFileValidator,
    pub(crate) tables: Option<PerRole<RawTable>>,
    pub(crate) column_keys: Option<ColumnKeys>,
    pub(crate) normalized: Option<PerRole<NormalizedTable>>,
    pub(crate) vocabulary: Option<Vocabulary>,
    pub(crate) encoded: Option<PerRole<EncodedDataset>>,
    pub(crate) classifier: Option<Box<dyn Classifier>>,
    pub(crate) history: Option<TrainingHistory>,
    pub(crate) evaluation: Option<EvaluationMetrics>,
}

impl PipelineRun {
    pub(crate) fn new(validator: DatasetFileValidator) -> Self {
        Self {
            validator,
            tables: None,
            column_keys: None,
            normalized: None,
            vocabulary: None,
            encoded: None,
            classifier: None,
            history: None,
            evaluation: None,
        }
    }

    /// Drop every artifact produced by a stage later than `stage`.
    pub(crate) fn clear_after(&mut self, stage: PipelineStage) {
        if stage < PipelineStage::Parsed {
            self.tables = None;
        }
        if stage < PipelineStage::Inspected {
            self.column_keys = None;
        }
        if stage < PipelineStage::Preprocessed {
            self.normalized = None;
            self.vocabulary = None;
        }
        if stage < PipelineStage::Embedded {
            self.encoded = None;
        }
        if stage < PipelineStage::ModelReady {
            self.classifier = None;
        }
        if stage < PipelineStage::Trained {
            self.history = None;
        }
        if stage < PipelineStage::Evaluated {
            self.evaluation = None;
        }
    }

    pub fn validator(&self) -> &DatasetFileValidator {
        &self.validator
    }

    pub fn files(&self) -> Option<PerRole<DatasetFile>> {
        self.validator.files()
    }

    pub fn tables(&self) -> Option<&PerRole<RawTable>> {
        self.tables.as_ref()
    }

    pub fn column_keys(&self) -> Option<&ColumnKeys> {
        self.column_keys.as_ref()
    }

    pub fn normalized(&self) -> Option<&PerRole<NormalizedTable>> {
        self.normalized.as_ref()
    }

    pub fn vocabulary(&self) -> Option<&Vocabulary> {
        self.vocabulary.as_ref()
    }

    pub fn encoded(&self) -> Option<&PerRole<EncodedDataset>> {
        self.encoded.as_ref()
    }

    pub fn has_classifier(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn history(&self) -> Option<&TrainingHistory> {
        self.history.as_ref()
    }

    pub fn evaluation(&self) -> Option<&EvaluationMetrics> {
        self.evaluation.as_ref()
    }
}

impl std::fmt::Debug for PipelineRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineRun")
            .field("validator", &self.validator)
            .field("tables", &self.tables.is_some())
            .field("column_keys", &self.column_keys)
            .field("normalized", &self.normalized.is_some())
            .field("vocabulary_len", &self.vocabulary.as_ref().map(Vocabulary::len))
            .field("encoded", &self.encoded.is_some())
            .field("classifier", &self.classifier.is_some())
            .field("history", &self.history.is_some())
            .field("evaluation", &self.evaluation)
            .finish()
    }
}

/// Row and column counts per role after parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseSummary {
    pub rows: PerRole<usize>,
    pub headers: PerRole<Vec<String>>,
}

/// Column mapping chosen from the training header, plus a short preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionReport {
    pub column_keys: ColumnKeys,
    pub training_headers: Vec<String>,
    pub row_counts: PerRole<usize>,
    pub preview: PerRole<Vec<RawRow>>,
}

/// Rows kept and dropped per role, and the resulting vocabulary size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessReport {
    pub kept: PerRole<usize>,
    pub dropped: PerRole<usize>,
    /// Entries including `<PAD>` and `<OOV>`
    pub vocabulary_size: usize,
}

impl PreprocessReport {
    pub fn total_dropped(&self) -> usize {
        self.dropped.iter().map(|(_, n)| *n).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.total_dropped() == 0
    }

    pub fn status_message(&self) -> String {
        if self.is_clean() {
            "clean".to_string()
        } else {
            format!("cleaned with {} exclusions", self.total_dropped())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingReport {
    pub sequence_length: usize,
    pub sequences: PerRole<usize>,
    pub oov_rate: PerRole<f32>,
}

/// Classifier output for one ad-hoc text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub text: String,
    pub probability: f32,
    pub label: u8,
    /// Non-pad positions after truncation
    pub token_count: usize,
    pub oov_count: usize,
}
