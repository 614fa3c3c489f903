//! Multinomial Naive Bayes over token indices.
//!
//! Padding positions are ignored. Counts are Laplace-smoothed, priors
//! included, so a class absent from training still yields finite scores.
//! The model is closed-form: one pass over the data fits it, and `fit`
//! reports a single epoch regardless of the requested count.

use tracing::debug;

use super::{
    Classifier, ClassifierError, EpochMetrics, EvaluationMetrics, FitOptions, ModelSpec,
    TrainingHistory, accuracy, binary_cross_entropy, check_shapes,
};
use crate::text::{IntTensor, PAD_INDEX};

const ALPHA: f64 = 1.0;

#[derive(Debug, Clone)]
struct Fitted {
    log_prior: [f64; 2],
    /// `log_likelihood[class][token]`
    log_likelihood: [Vec<f64>; 2],
}

#[derive(Debug, Clone)]
pub struct NaiveBayesClassifier {
    spec: ModelSpec,
    threshold: f32,
    fitted: Option<Fitted>,
}

impl NaiveBayesClassifier {
    pub fn new(spec: ModelSpec) -> Self {
        Self {
            spec,
            threshold: 0.5,
            fitted: None,
        }
    }

    /// Probability cut-off used for the reported accuracy.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn spec(&self) -> ModelSpec {
        self.spec
    }

    fn check_features(&self, features: &IntTensor) -> Result<(), ClassifierError> {
        if features.cols() != self.spec.sequence_length {
            return Err(ClassifierError::Shape(format!(
                "expected sequences of length {}, got {}",
                self.spec.sequence_length,
                features.cols()
            )));
        }
        if let Some(&bad) = features
            .data
            .iter()
            .find(|&&i| i < 0 || i as usize >= self.spec.vocab_size)
        {
            return Err(ClassifierError::Shape(format!(
                "token index {} outside vocabulary of {}",
                bad, self.spec.vocab_size
            )));
        }
        Ok(())
    }

    fn probabilities(&self, features: &IntTensor) -> Result<Vec<f32>, ClassifierError> {
        let fitted = self.fitted.as_ref().ok_or(ClassifierError::NotTrained)?;
        self.check_features(features)?;

        Ok(features
            .iter_rows()
            .map(|row| {
                let mut score = fitted.log_prior;
                for &token in row.iter().filter(|&&t| t != PAD_INDEX as i32) {
                    for (class, s) in score.iter_mut().enumerate() {
                        *s += fitted.log_likelihood[class][token as usize];
                    }
                }
                // P(1 | row) = sigmoid(log P(1, row) - log P(0, row))
                (1.0 / (1.0 + (score[0] - score[1]).exp())) as f32
            })
            .collect())
    }

    fn metrics(
        &self,
        features: &IntTensor,
        labels: &IntTensor,
    ) -> Result<(f32, f32), ClassifierError> {
        check_shapes(features, labels)?;
        let probs = self.probabilities(features)?;
        Ok((
            binary_cross_entropy(&probs, &labels.data),
            accuracy(&probs, &labels.data, self.threshold),
        ))
    }
}

impl Classifier for NaiveBayesClassifier {
    fn fit(
        &mut self,
        features: &IntTensor,
        labels: &IntTensor,
        options: &FitOptions<'_>,
        on_epoch: &mut dyn FnMut(&EpochMetrics),
    ) -> Result<TrainingHistory, ClassifierError> {
        check_shapes(features, labels)?;
        self.check_features(features)?;

        let vocab = self.spec.vocab_size;
        let mut docs = [0usize; 2];
        let mut counts = [vec![0usize; vocab], vec![0usize; vocab]];
        for (row, &label) in features.iter_rows().zip(&labels.data) {
            let class = match label {
                0 => 0,
                1 => 1,
                other => {
                    return Err(ClassifierError::Shape(format!(
                        "label {other} is not binary"
                    )));
                }
            };
            docs[class] += 1;
            for &token in row.iter().filter(|&&t| t != PAD_INDEX as i32) {
                counts[class][token as usize] += 1;
            }
        }

        let n = (docs[0] + docs[1]) as f64;
        let log_prior = docs.map(|d| ((d as f64 + ALPHA) / (n + 2.0 * ALPHA)).ln());
        let log_likelihood = counts.map(|class_counts| {
            let total: usize = class_counts.iter().sum();
            let denom = total as f64 + ALPHA * vocab as f64;
            class_counts
                .iter()
                .map(|&c| ((c as f64 + ALPHA) / denom).ln())
                .collect::<Vec<f64>>()
        });
        self.fitted = Some(Fitted {
            log_prior,
            log_likelihood,
        });
        debug!(
            "Fitted naive Bayes on {} rows ({} negative, {} positive)",
            n, docs[0], docs[1]
        );

        let (loss, acc) = self.metrics(features, labels)?;
        let (val_loss, val_accuracy) = match options.validation {
            Some((vx, vy)) => {
                let (l, a) = self.metrics(vx, vy)?;
                (Some(l), Some(a))
            }
            None => (None, None),
        };
        let epoch = EpochMetrics {
            epoch: 1,
            loss,
            accuracy: acc,
            val_loss,
            val_accuracy,
        };
        on_epoch(&epoch);

        Ok(TrainingHistory {
            epochs: vec![epoch],
        })
    }

    fn evaluate(
        &self,
        features: &IntTensor,
        labels: &IntTensor,
    ) -> Result<EvaluationMetrics, ClassifierError> {
        let (loss, accuracy) = self.metrics(features, labels)?;
        Ok(EvaluationMetrics { loss, accuracy })
    }

    fn predict(&self, features: &IntTensor) -> Result<Vec<f32>, ClassifierError> {
        self.probabilities(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ModelSpec {
        ModelSpec {
            vocab_size: 6,
            sequence_length: 3,
        }
    }

    fn tensors(rows: &[[i32; 3]], labels: &[i32]) -> (IntTensor, IntTensor) {
        (
            IntTensor::new([rows.len(), 3], rows.concat()).unwrap(),
            IntTensor::new([labels.len(), 1], labels.to_vec()).unwrap(),
        )
    }

    fn options() -> FitOptions<'static> {
        FitOptions {
            batch_size: 2,
            epochs: 3,
            validation: None,
        }
    }

    #[test]
    fn test_separable_data() {
        // tokens 2,3 mark class 0; tokens 4,5 mark class 1
        let (x, y) = tensors(&[[2, 3, 0], [3, 2, 2], [4, 5, 0], [5, 5, 4]], &[0, 0, 1, 1]);
        let mut model = NaiveBayesClassifier::new(spec());
        let mut seen = Vec::new();
        let history = model
            .fit(&x, &y, &options(), &mut |m| seen.push(m.epoch))
            .unwrap();

        assert_eq!(seen, vec![1]);
        assert_eq!(history.last().unwrap().accuracy, 1.0);

        let (probe, _) = tensors(&[[2, 0, 0], [5, 0, 0]], &[0, 1]);
        let probs = model.predict(&probe).unwrap();
        assert!(probs[0] < 0.5);
        assert!(probs[1] > 0.5);
    }

    #[test]
    fn test_predict_before_fit() {
        let model = NaiveBayesClassifier::new(spec());
        let (x, _) = tensors(&[[2, 0, 0]], &[0]);
        assert!(matches!(model.predict(&x), Err(ClassifierError::NotTrained)));
    }

    #[test]
    fn test_rejects_out_of_vocab_index() {
        let mut model = NaiveBayesClassifier::new(spec());
        let (x, y) = tensors(&[[2, 9, 0]], &[1]);
        assert!(model.fit(&x, &y, &options(), &mut |_| {}).is_err());
    }

    #[test]
    fn test_single_class_training_stays_finite() {
        let mut model = NaiveBayesClassifier::new(spec());
        let (x, y) = tensors(&[[2, 3, 0], [2, 2, 0]], &[1, 1]);
        model.fit(&x, &y, &options(), &mut |_| {}).unwrap();
        let probs = model.predict(&x).unwrap();
        assert!(probs.iter().all(|p| p.is_finite() && *p > 0.5));
    }

    #[test]
    fn test_reports_validation_metrics() {
        let (x, y) = tensors(&[[2, 0, 0], [4, 0, 0]], &[0, 1]);
        let (vx, vy) = tensors(&[[3, 0, 0]], &[0]);
        let opts = FitOptions {
            validation: Some((&vx, &vy)),
            ..options()
        };
        let mut model = NaiveBayesClassifier::new(spec());
        let history = model.fit(&x, &y, &opts, &mut |_| {}).unwrap();
        let epoch = history.last().unwrap();
        assert!(epoch.val_loss.is_some());
        assert!(epoch.val_accuracy.is_some());
    }
}
