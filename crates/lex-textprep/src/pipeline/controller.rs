//! Stage sequencing for the text preparation pipeline.
//!
//! The controller owns every artifact of the current run and enforces stage
//! order: an operation whose prerequisite has not completed fails with
//! [`PipelineError::StageNotReady`] and changes nothing. Once the guard
//! passes, the operation invalidates every artifact of later stages before
//! doing its work, so a re-run parse can never leave an old vocabulary or
//! model behind.
//!
//! A stage body that fails sets the [`StageFailure`] overlay and leaves the
//! pipeline at the last completed stage. The next success clears it.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::progress::{ClosureProgressReporter, ProgressReporter, StatusUpdate};
use super::run::{
    EmbeddingReport, InspectionReport, ParseSummary, PipelineRun, Prediction, PreprocessReport,
};
use super::stage::{PipelineStage, PipelineStep, StageFailure};
use crate::classifier::{
    Classifier, ClassifierError, EpochMetrics, EvaluationMetrics, FitOptions, ModelSpec,
    TrainingHistory,
};
use crate::config::PipelineConfig;
use crate::dataset::{
    DatasetFileValidator, NormalizedTable, ParseOptions, PolarsCsvParser, RowNormalizer,
    TabularLoader, TabularParser, infer_columns,
};
use crate::error::{PipelineError, Result};
use crate::text::{EncodedDataset, IntTensor, SequenceEncoder, Vocabulary, VocabularyBuilder};
use crate::types::{ColumnKeys, DatasetFile, DatasetRole, PerRole, RawTable};

/// Drives the eight pipeline steps over one set of dataset files.
///
/// Use [`PipelineController::builder()`] to create one.
///
/// # Example
///
/// ```rust,ignore
/// use lex_textprep::{DatasetRole, NaiveBayesClassifier, PipelineController};
///
/// let mut controller = PipelineController::builder()
///     .on_progress(|update| println!("{}: {}", update.step, update.message))
///     .build()?;
///
/// controller.select_file(DatasetRole::Training, "data/train.csv")?;
/// controller.select_file(DatasetRole::Testing, "data/test.csv")?;
/// controller.select_file(DatasetRole::Validation, "data/validation.csv")?;
///
/// controller.parse()?;
/// controller.inspect()?;
/// controller.preprocess()?;
/// controller.embed()?;
/// controller.create_model(|spec| Ok(Box::new(NaiveBayesClassifier::new(*spec))))?;
/// controller.train()?;
/// controller.evaluate()?;
/// let prediction = controller.predict("free money, click now")?;
/// ```
pub struct PipelineController {
    config: PipelineConfig,
    loader: TabularLoader,
    encoder: SequenceEncoder,
    vocabulary_builder: VocabularyBuilder,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    stage: PipelineStage,
    failure: Option<StageFailure>,
    run: PipelineRun,
}

// The controller is driven from a worker thread while the UI keeps the sink.
static_assertions::assert_impl_all!(PipelineController: Send);

impl PipelineController {
    pub fn builder() -> PipelineControllerBuilder {
        PipelineControllerBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Last completed stage.
    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Step the user is positioned at.
    pub fn current_step(&self) -> PipelineStep {
        self.stage.current_step()
    }

    /// The failure overlay, if the last stage attempt failed.
    pub fn failure(&self) -> Option<&StageFailure> {
        self.failure.as_ref()
    }

    pub fn run(&self) -> &PipelineRun {
        &self.run
    }

    /// Offer a file for one role.
    ///
    /// Any change to the file set invalidates everything parsed from the
    /// previous one, whether the candidate is accepted or not.
    pub fn select_file(&mut self, role: DatasetRole, path: impl AsRef<Path>) -> Result<DatasetFile> {
        let step = PipelineStep::FileSelect;
        let outcome = self.run.validator.offer(role, path).cloned();

        self.run.clear_after(PipelineStage::FilesReady);
        self.stage = if self.run.validator.is_ready() {
            PipelineStage::FilesReady
        } else {
            PipelineStage::AwaitingFiles
        };

        let file = self.settle(step, outcome)?;
        self.report(StatusUpdate::success(
            step,
            format!("Accepted '{}' for the {} dataset", file.name, role),
        ));
        if self.stage == PipelineStage::FilesReady {
            info!("All three datasets selected");
            self.report(StatusUpdate::info(step, "All three datasets selected"));
        }
        Ok(file)
    }

    /// Step 2: parse all three files.
    pub fn parse(&mut self) -> Result<ParseSummary> {
        let step = PipelineStep::Parse;
        self.enter(step, PipelineStage::FilesReady)?;

        let result = self
            .run
            .files()
            .ok_or_else(|| missing_artifact("accepted files"))
            .and_then(|files| self.loader.load_all(&files));
        let tables = self.settle(step, result)?;

        let summary = ParseSummary {
            rows: tables.map(|_, t| t.len()),
            headers: tables.map(|_, t| t.headers.clone()),
        };
        self.run.tables = Some(tables);
        self.stage = PipelineStage::Parsed;
        self.report(StatusUpdate::success(
            step,
            format!(
                "Parsed {} training, {} testing, {} validation rows",
                summary.rows.training, summary.rows.testing, summary.rows.validation
            ),
        ));
        Ok(summary)
    }

    /// Step 3: pick the text and label columns from the training header.
    pub fn inspect(&mut self) -> Result<InspectionReport> {
        let step = PipelineStep::Inspect;
        self.enter(step, PipelineStage::Parsed)?;

        let result = self.inspect_tables();
        let report = self.settle(step, result)?;

        let keys = &report.column_keys;
        let message = format!(
            "Using '{}' as text and '{}' as label",
            keys.text_key, keys.label_key
        );
        self.report(if keys.inferred {
            StatusUpdate::warning(step, format!("{message} (inferred)"))
        } else {
            StatusUpdate::success(step, message)
        });

        self.run.column_keys = Some(report.column_keys.clone());
        self.stage = PipelineStage::Inspected;
        Ok(report)
    }

    fn inspect_tables(&self) -> Result<InspectionReport> {
        let tables = self.tables()?;
        let column_keys = infer_columns(&tables.training.headers)?;
        let preview_rows = self.config.preview_rows;
        Ok(InspectionReport {
            column_keys,
            training_headers: tables.training.headers.clone(),
            row_counts: tables.map(|_, t| t.len()),
            preview: tables.map(|_, t| t.rows.iter().take(preview_rows).cloned().collect()),
        })
    }

    /// Step 4: normalize rows and build the vocabulary from training text.
    pub fn preprocess(&mut self) -> Result<PreprocessReport> {
        let step = PipelineStep::Preprocess;
        self.enter(step, PipelineStage::Inspected)?;

        let result = self.normalize();
        let (normalized, vocabulary) = self.settle(step, result)?;

        let report = PreprocessReport {
            kept: normalized.map(|_, t| t.len()),
            dropped: normalized.map(|_, t| t.dropped),
            vocabulary_size: vocabulary.len(),
        };
        let message = format!(
            "Preprocessing {}; vocabulary has {} tokens",
            report.status_message(),
            vocabulary.learned_len()
        );
        if report.is_clean() {
            self.report(StatusUpdate::success(step, message));
        } else {
            warn!("Dropped rows per role: {:?}", report.dropped);
            self.report(StatusUpdate::warning(step, message));
        }

        self.run.normalized = Some(normalized);
        self.run.vocabulary = Some(vocabulary);
        self.stage = PipelineStage::Preprocessed;
        Ok(report)
    }

    fn normalize(&self) -> Result<(PerRole<NormalizedTable>, Vocabulary)> {
        let tables = self.tables()?;
        let keys: ColumnKeys = self
            .run
            .column_keys
            .clone()
            .ok_or_else(|| missing_artifact("column keys"))?;
        let normalized = RowNormalizer::new(keys).normalize_all(tables)?;
        let vocabulary = self.vocabulary_builder.build(&normalized.training.rows);
        Ok((normalized, vocabulary))
    }

    /// Step 5: encode every role to fixed-length sequences.
    pub fn embed(&mut self) -> Result<EmbeddingReport> {
        let step = PipelineStep::Embed;
        self.enter(step, PipelineStage::Preprocessed)?;

        let result = self.encode();
        let encoded = self.settle(step, result)?;

        let report = EmbeddingReport {
            sequence_length: self.encoder.max_length(),
            sequences: encoded.map(|_, d| d.len()),
            oov_rate: encoded.map(|_, d| d.oov_rate()),
        };
        self.report(StatusUpdate::success(
            step,
            format!(
                "Encoded sequences of length {} (test OOV rate {:.1}%)",
                report.sequence_length,
                report.oov_rate.testing * 100.0
            ),
        ));

        self.run.encoded = Some(encoded);
        self.stage = PipelineStage::Embedded;
        Ok(report)
    }

    fn encode(&self) -> Result<PerRole<EncodedDataset>> {
        let normalized = self
            .run
            .normalized
            .as_ref()
            .ok_or_else(|| missing_artifact("normalized rows"))?;
        let vocabulary = self.vocabulary()?;
        let encode = |role: DatasetRole| {
            self.encoder
                .encode_dataset(role, normalized.get(role), vocabulary)
        };
        Ok(PerRole {
            training: encode(DatasetRole::Training)?,
            testing: encode(DatasetRole::Testing)?,
            validation: encode(DatasetRole::Validation)?,
        })
    }

    /// Step 6a: build a classifier sized for the current encoding.
    pub fn create_model<F>(&mut self, factory: F) -> Result<ModelSpec>
    where
        F: FnOnce(&ModelSpec) -> std::result::Result<Box<dyn Classifier>, ClassifierError>,
    {
        let step = PipelineStep::Train;
        self.enter(step, PipelineStage::Embedded)?;

        let result = self.vocabulary().and_then(|vocabulary| {
            let spec = ModelSpec {
                vocab_size: vocabulary.len(),
                sequence_length: self.encoder.max_length(),
            };
            factory(&spec)
                .map(|classifier| (spec, classifier))
                .map_err(|e| PipelineError::ModelCreation(e.to_string()))
        });
        let (spec, classifier) = self.settle(step, result)?;

        debug!("Created classifier for {:?}", spec);
        self.run.classifier = Some(classifier);
        self.stage = PipelineStage::ModelReady;
        self.report(StatusUpdate::info(
            step,
            format!(
                "Model ready: vocabulary {}, sequence length {}",
                spec.vocab_size, spec.sequence_length
            ),
        ));
        Ok(spec)
    }

    /// Step 6b: fit the classifier on training data, validating each epoch.
    pub fn train(&mut self) -> Result<TrainingHistory> {
        let step = PipelineStep::Train;
        self.enter(step, PipelineStage::ModelReady)?;

        let result = self.fit();
        let history = self.settle(step, result)?;

        let message = match history.last() {
            Some(last) => format!(
                "Training complete: loss {:.4}, accuracy {:.1}%",
                last.loss,
                last.accuracy * 100.0
            ),
            None => "Training complete".to_string(),
        };
        self.report(StatusUpdate::success(step, message));

        self.run.history = Some(history.clone());
        self.stage = PipelineStage::Trained;
        Ok(history)
    }

    fn fit(&mut self) -> Result<TrainingHistory> {
        let encoded = self
            .run
            .encoded
            .as_ref()
            .ok_or_else(|| missing_artifact("encoded datasets"))?;
        let (features, labels) = encoded.training.to_tensors()?;
        let (val_features, val_labels) = encoded.validation.to_tensors()?;

        let epochs = self.config.epochs;
        let options = FitOptions {
            batch_size: self.config.batch_size,
            epochs,
            validation: Some((&val_features, &val_labels)),
        };
        let reporter = self.progress_reporter.clone();
        let mut on_epoch = |metrics: &EpochMetrics| {
            info!(
                "Epoch {}/{}: loss={:.4} accuracy={:.4}",
                metrics.epoch, epochs, metrics.loss, metrics.accuracy
            );
            if let Some(reporter) = &reporter {
                reporter.report(StatusUpdate::with_items(
                    PipelineStep::Train,
                    metrics.epoch,
                    epochs,
                    format!(
                        "Epoch {}/{}: loss {:.4}, accuracy {:.1}%",
                        metrics.epoch,
                        epochs,
                        metrics.loss,
                        metrics.accuracy * 100.0
                    ),
                ));
            }
        };

        let classifier = self
            .run
            .classifier
            .as_mut()
            .ok_or_else(|| missing_artifact("classifier"))?;
        info!("Training on {} sequences", features.rows());
        classifier
            .fit(&features, &labels, &options, &mut on_epoch)
            .map_err(|e| PipelineError::TrainingFailed(e.to_string()))
    }

    /// Step 7: score the trained classifier on the test set.
    pub fn evaluate(&mut self) -> Result<EvaluationMetrics> {
        let step = PipelineStep::Evaluate;
        self.enter(step, PipelineStage::Trained)?;

        let result = self.score_test_set();
        let metrics = self.settle(step, result)?;

        self.report(StatusUpdate::success(
            step,
            format!(
                "Test loss {:.4}, accuracy {:.1}%",
                metrics.loss,
                metrics.accuracy * 100.0
            ),
        ));
        self.run.evaluation = Some(metrics);
        self.stage = PipelineStage::Evaluated;
        Ok(metrics)
    }

    fn score_test_set(&self) -> Result<EvaluationMetrics> {
        let encoded = self
            .run
            .encoded
            .as_ref()
            .ok_or_else(|| missing_artifact("encoded datasets"))?;
        let (features, labels) = encoded.testing.to_tensors()?;
        self.classifier()?
            .evaluate(&features, &labels)
            .map_err(|e| PipelineError::EvaluationFailed(e.to_string()))
    }

    /// Step 8: classify one ad-hoc text with the trained model.
    ///
    /// The text goes through the same tokenizer and vocabulary as training
    /// data. Repeated calls never invalidate anything.
    pub fn predict(&mut self, text: &str) -> Result<Prediction> {
        let step = PipelineStep::Predict;
        self.require(step, PipelineStage::Evaluated)?;

        let result = self.classify(text);
        let prediction = self.settle(step, result)?;

        self.stage = PipelineStage::PredictReady;
        self.report(StatusUpdate::success(
            step,
            format!(
                "Predicted label {} (p = {:.3})",
                prediction.label, prediction.probability
            ),
        ));
        Ok(prediction)
    }

    fn classify(&self, text: &str) -> Result<Prediction> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PipelineError::PredictionFailed(
                "input text is empty".to_string(),
            ));
        }

        let sequence = self.encoder.encode_text(text, self.vocabulary()?);
        let features = IntTensor::new(
            [1, sequence.len()],
            sequence.as_slice().iter().map(|&i| i as i32).collect(),
        )?;
        let probability = self
            .classifier()?
            .predict(&features)
            .map_err(|e| PipelineError::PredictionFailed(e.to_string()))?
            .first()
            .copied()
            .ok_or_else(|| {
                PipelineError::PredictionFailed("classifier returned no output".to_string())
            })?;

        Ok(Prediction {
            text: text.to_string(),
            probability,
            label: u8::from(probability >= self.config.decision_threshold),
            token_count: sequence.token_count(),
            oov_count: sequence.oov_count(),
        })
    }

    /// Drop every artifact and return to file selection.
    pub fn reset(&mut self) {
        info!("Resetting pipeline");
        self.run = PipelineRun::new(DatasetFileValidator::new(self.config.file_names.clone()));
        self.stage = PipelineStage::AwaitingFiles;
        self.failure = None;
        self.report(StatusUpdate::info(PipelineStep::FileSelect, "Pipeline reset"));
    }

    fn require(&self, step: PipelineStep, required: PipelineStage) -> Result<()> {
        if self.stage >= required {
            return Ok(());
        }
        warn!(
            "Rejected {}: requires {:?}, pipeline is at {:?}",
            step, required, self.stage
        );
        Err(PipelineError::StageNotReady {
            step,
            required,
            current: self.stage,
        })
    }

    /// Guard, then roll the pipeline back to `required` so nothing produced
    /// by a later stage outlives this attempt.
    fn enter(&mut self, step: PipelineStep, required: PipelineStage) -> Result<()> {
        self.require(step, required)?;
        self.run.clear_after(required);
        self.stage = required;
        info!("Step {}: {}", step.number(), step);
        self.report(StatusUpdate::info(step, format!("{}...", step)));
        Ok(())
    }

    fn settle<T>(&mut self, step: PipelineStep, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.failure = None;
                Ok(value)
            }
            Err(e) => {
                error!("{} failed: {}", step, e);
                self.report(StatusUpdate::error(step, e.to_string()));
                self.failure = Some(StageFailure::new(step, &e));
                Err(e)
            }
        }
    }

    fn report(&self, update: StatusUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn tables(&self) -> Result<&PerRole<RawTable>> {
        self.run
            .tables
            .as_ref()
            .ok_or_else(|| missing_artifact("parsed tables"))
    }

    fn vocabulary(&self) -> Result<&Vocabulary> {
        self.run
            .vocabulary
            .as_ref()
            .ok_or_else(|| missing_artifact("vocabulary"))
    }

    fn classifier(&self) -> Result<&dyn Classifier> {
        self.run
            .classifier
            .as_deref()
            .ok_or_else(|| missing_artifact("classifier"))
    }
}

fn missing_artifact(what: &str) -> PipelineError {
    PipelineError::Internal(format!("{what} missing for the current stage"))
}

impl std::fmt::Debug for PipelineController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineController")
            .field("config", &self.config)
            .field("stage", &self.stage)
            .field("failure", &self.failure)
            .field("run", &self.run)
            .finish_non_exhaustive()
    }
}

/// Builder for [`PipelineController`].
#[derive(Default)]
pub struct PipelineControllerBuilder {
    config: Option<PipelineConfig>,
    parser: Option<Arc<dyn TabularParser>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(PipelineControllerBuilder: Send);

impl PipelineControllerBuilder {
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the default Polars CSV parser.
    pub fn parser(mut self, parser: Arc<dyn TabularParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(StatusUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Validate the configuration and build the controller.
    pub fn build(self) -> Result<PipelineController> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let parser = self
            .parser
            .unwrap_or_else(|| Arc::new(PolarsCsvParser));
        Ok(PipelineController {
            loader: TabularLoader::new(parser, ParseOptions::default()),
            encoder: SequenceEncoder::new(config.max_sequence_length),
            vocabulary_builder: VocabularyBuilder::default(),
            progress_reporter: self.progress_reporter,
            stage: PipelineStage::AwaitingFiles,
            failure: None,
            run: PipelineRun::new(DatasetFileValidator::new(config.file_names.clone())),
            config,
        })
    }
}
