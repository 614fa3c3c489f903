//! The classifier collaborator seam.
//!
//! The pipeline never trains anything itself. It hands integer tensors to a
//! [`Classifier`] and relays the metrics it reports. Callers plug in a real
//! model through [`crate::PipelineController::create_model`];
//! [`NaiveBayesClassifier`] is a dependency-free baseline that satisfies the
//! same contract.

pub mod naive_bayes;

pub use naive_bayes::NaiveBayesClassifier;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::text::IntTensor;

/// What a factory needs to size a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Vocabulary size, reserved tokens included.
    pub vocab_size: usize,
    pub sequence_length: usize,
}

/// Per-fit settings handed through from the pipeline configuration.
#[derive(Debug, Clone, Copy)]
pub struct FitOptions<'a> {
    pub batch_size: usize,
    pub epochs: usize,
    pub validation: Option<(&'a IntTensor, &'a IntTensor)>,
}

/// Metrics for one completed epoch. `epoch` counts from 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub loss: f32,
    pub accuracy: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub val_loss: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub val_accuracy: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochMetrics>,
}

impl TrainingHistory {
    pub fn last(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub loss: f32,
    pub accuracy: f32,
}

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Tensor shape mismatch: {0}")]
    Shape(String),

    #[error("Model has not been trained")]
    NotTrained,

    #[error("{0}")]
    Backend(String),
}

/// A binary text classifier over fixed-length index sequences.
///
/// Features are `[n, L]`, labels `[n, 1]` with values 0 or 1.
pub trait Classifier: Send {
    fn fit(
        &mut self,
        features: &IntTensor,
        labels: &IntTensor,
        options: &FitOptions<'_>,
        on_epoch: &mut dyn FnMut(&EpochMetrics),
    ) -> Result<TrainingHistory, ClassifierError>;

    fn evaluate(
        &self,
        features: &IntTensor,
        labels: &IntTensor,
    ) -> Result<EvaluationMetrics, ClassifierError>;

    /// Probability of label 1 for every row.
    fn predict(&self, features: &IntTensor) -> Result<Vec<f32>, ClassifierError>;
}

/// Check that features and labels describe the same rows.
pub fn check_shapes(features: &IntTensor, labels: &IntTensor) -> Result<(), ClassifierError> {
    if labels.cols() != 1 {
        return Err(ClassifierError::Shape(format!(
            "labels must be [n, 1], got {:?}",
            labels.shape
        )));
    }
    if features.rows() != labels.rows() {
        return Err(ClassifierError::Shape(format!(
            "{} feature rows but {} labels",
            features.rows(),
            labels.rows()
        )));
    }
    Ok(())
}

/// Mean binary cross-entropy, with probabilities clamped away from 0 and 1.
pub fn binary_cross_entropy(probabilities: &[f32], labels: &[i32]) -> f32 {
    if probabilities.is_empty() {
        return 0.0;
    }
    const EPS: f32 = 1e-7;
    let total: f32 = probabilities
        .iter()
        .zip(labels)
        .map(|(&p, &y)| {
            let p = p.clamp(EPS, 1.0 - EPS);
            if y == 1 { -p.ln() } else { -(1.0 - p).ln() }
        })
        .sum();
    total / probabilities.len() as f32
}

/// Share of rows whose thresholded probability equals the label.
pub fn accuracy(probabilities: &[f32], labels: &[i32], threshold: f32) -> f32 {
    if probabilities.is_empty() {
        return 0.0;
    }
    let correct = probabilities
        .iter()
        .zip(labels)
        .filter(|&(&p, &y)| i32::from(p >= threshold) == y)
        .count();
    correct as f32 / probabilities.len() as f32
}
