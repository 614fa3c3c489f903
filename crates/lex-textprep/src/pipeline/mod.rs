//! Pipeline module.
//!
//! [`PipelineController`] sequences the stages; the other submodules hold
//! the state machine, the status sink and the per-run artifacts.

mod controller;
pub mod progress;
pub mod run;
pub mod stage;

pub use controller::{PipelineController, PipelineControllerBuilder};
pub use progress::{ClosureProgressReporter, ProgressReporter, Severity, StatusUpdate};
pub use run::{
    EmbeddingReport, InspectionReport, ParseSummary, PipelineRun, Prediction, PreprocessReport,
};
pub use stage::{PipelineStage, PipelineStep, StageFailure};
