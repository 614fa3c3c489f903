//! Status reporting to a presentation layer.
//!
//! Every stage emits [`StatusUpdate`]s through a [`ProgressReporter`]. The
//! pipeline never renders anything itself.
//!
//! # Example
//!
//! ```rust,ignore
//! use lex_textprep::PipelineController;
//!
//! let controller = PipelineController::builder()
//!     .on_progress(|update| {
//!         println!("[{}/8] {}", update.step.number(), update.message);
//!     })
//!     .build()?;
//! ```

use serde::{Deserialize, Serialize};

use super::stage::PipelineStep;

/// How a status line should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// One status line for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// Step that emitted the update
    pub step: PipelineStep,

    pub severity: Severity,

    /// Overall progress across the eight steps (0.0 - 1.0)
    pub progress: f32,

    /// Human-readable message describing current activity
    pub message: String,

    /// Items finished so far (e.g. epochs)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_processed: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_total: Option<usize>,
}

impl StatusUpdate {
    /// Update at `stage_progress` (0.0 - 1.0) through `step`.
    pub fn new(
        step: PipelineStep,
        severity: Severity,
        stage_progress: f32,
        message: impl Into<String>,
    ) -> Self {
        let steps = PipelineStep::ALL.len() as f32;
        let base = (step.number() - 1) as f32;
        Self {
            step,
            severity,
            progress: ((base + stage_progress.clamp(0.0, 1.0)) / steps).clamp(0.0, 1.0),
            message: message.into(),
            items_processed: None,
            items_total: None,
        }
    }

    pub fn info(step: PipelineStep, message: impl Into<String>) -> Self {
        Self::new(step, Severity::Info, 0.0, message)
    }

    pub fn success(step: PipelineStep, message: impl Into<String>) -> Self {
        Self::new(step, Severity::Success, 1.0, message)
    }

    pub fn warning(step: PipelineStep, message: impl Into<String>) -> Self {
        Self::new(step, Severity::Warning, 1.0, message)
    }

    pub fn error(step: PipelineStep, message: impl Into<String>) -> Self {
        Self::new(step, Severity::Error, 0.0, message)
    }

    /// Info update carrying item counts.
    pub fn with_items(
        step: PipelineStep,
        current: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Self {
        let stage_progress = if total > 0 {
            current as f32 / total as f32
        } else {
            0.0
        };
        Self {
            items_processed: Some(current),
            items_total: Some(total),
            ..Self::new(step, Severity::Info, stage_progress, message)
        }
    }
}

/// Receives status updates from the pipeline.
///
/// Implementations must be `Send + Sync` so a controller can be moved to a
/// worker thread while the sink stays shared with the UI.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: StatusUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(StatusUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(StatusUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(StatusUpdate) + Send + Sync,
{
    fn report(&self, update: StatusUpdate) {
        (self.callback)(update);
    }
}

static_assertions::assert_impl_all!(StatusUpdate: Send, Sync);
