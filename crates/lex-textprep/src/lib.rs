//! Text Classification Data Preparation Library
//!
//! Turns three labelled CSV datasets (training, testing, validation) into
//! fixed-length integer sequences for a binary text classifier, then drives
//! training, evaluation and ad-hoc prediction through a pluggable
//! [`Classifier`].
//!
//! # Overview
//!
//! - **File admission**: one file per role, accepted by exact name
//! - **Parsing**: the three files are parsed concurrently with Polars
//! - **Inspection**: text and label columns picked from the training header
//! - **Preprocessing**: rows normalized, vocabulary built from training text
//! - **Embedding**: every row encoded to `max_sequence_length` indices
//! - **Training / Evaluation / Prediction**: delegated to a [`Classifier`]
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lex_textprep::{DatasetRole, NaiveBayesClassifier, PipelineConfig, PipelineController};
//!
//! let config = PipelineConfig::builder().max_sequence_length(50).build()?;
//! let mut controller = PipelineController::builder()
//!     .config(config)
//!     .on_progress(|update| println!("[{:.0}%] {}", update.progress * 100.0, update.message))
//!     .build()?;
//!
//! for role in DatasetRole::ALL {
//!     let name = controller.config().file_name(role).to_string();
//!     controller.select_file(role, format!("data/{name}"))?;
//! }
//! controller.parse()?;
//! controller.inspect()?;
//! controller.preprocess()?;
//! controller.embed()?;
//! controller.create_model(|spec| Ok(Box::new(NaiveBayesClassifier::new(*spec))))?;
//! controller.train()?;
//! controller.evaluate()?;
//!
//! let prediction = controller.predict("limited offer, click here")?;
//! println!("label {} (p = {:.2})", prediction.label, prediction.probability);
//! ```
//!
//! # Stage Order
//!
//! Each operation requires the previous stage to have completed and fails
//! with [`PipelineError::StageNotReady`] otherwise. Re-running a stage, or
//! selecting a different file, discards every artifact downstream of it.

pub mod classifier;
pub mod config;
pub mod dataset;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod text;
pub mod types;

// Re-exports for convenient access
pub use classifier::{
    Classifier, ClassifierError, EpochMetrics, EvaluationMetrics, FitOptions, ModelSpec,
    NaiveBayesClassifier, TrainingHistory,
};
pub use config::{
    ConfigValidationError, DEFAULT_MAX_SEQUENCE_LENGTH, PipelineConfig, PipelineConfigBuilder,
};
pub use dataset::{
    DatasetFileValidator, NormalizedTable, ParseOptions, PolarsCsvParser, RowNormalizer,
    TabularLoader, TabularParser,
};
pub use error::{PipelineError, Result as PipelineResult, ResultExt};
pub use pipeline::{
    ClosureProgressReporter, EmbeddingReport, InspectionReport, ParseSummary, PipelineController,
    PipelineControllerBuilder, PipelineRun, PipelineStage, PipelineStep, Prediction,
    PreprocessReport, ProgressReporter, Severity, StageFailure, StatusUpdate,
};
pub use report::{ReportWriter, RunReport};
pub use text::{
    EncodedDataset, EncodedSequence, IntTensor, OOV_INDEX, OOV_TOKEN, PAD_INDEX, PAD_TOKEN,
    SequenceEncoder, Tokenizer, Vocabulary, VocabularyBuilder,
};
pub use types::{
    ColumnKeys, DatasetFile, DatasetRole, NormalizedRow, PerRole, RawRow, RawTable, RawValue,
};
