//! Integration tests for the text preparation pipeline.
//!
//! These tests drive the controller end to end over the CSV fixtures.

use lex_textprep::{
    Classifier, ClassifierError, DatasetRole, EpochMetrics, EvaluationMetrics, FitOptions,
    IntTensor, ModelSpec, NaiveBayesClassifier, PipelineConfig, PipelineController,
    PipelineError, PipelineStage, PipelineStep, ReportWriter, RunReport, Severity, StatusUpdate,
    TrainingHistory,
};
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn controller_with_length(length: usize) -> PipelineController {
    PipelineController::builder()
        .config(
            PipelineConfig::builder()
                .max_sequence_length(length)
                .build()
                .unwrap(),
        )
        .build()
        .unwrap()
}

fn select_fixture(controller: &mut PipelineController, dir: &str) {
    let base = fixtures_path().join(dir);
    for role in DatasetRole::ALL {
        let name = controller.config().file_name(role).to_string();
        controller.select_file(role, base.join(name)).unwrap();
    }
}

fn naive_bayes(spec: &ModelSpec) -> Result<Box<dyn Classifier>, ClassifierError> {
    Ok(Box::new(NaiveBayesClassifier::new(*spec)))
}

/// Records the tensors it is handed and answers with a fixed probability.
#[derive(Clone, Default)]
struct RecordingClassifier {
    fitted: Arc<Mutex<Vec<(IntTensor, IntTensor)>>>,
    evaluated: Arc<Mutex<Vec<(IntTensor, IntTensor)>>>,
    predicted: Arc<Mutex<Vec<IntTensor>>>,
}

impl Classifier for RecordingClassifier {
    fn fit(
        &mut self,
        features: &IntTensor,
        labels: &IntTensor,
        options: &FitOptions<'_>,
        on_epoch: &mut dyn FnMut(&EpochMetrics),
    ) -> Result<TrainingHistory, ClassifierError> {
        self.fitted
            .lock()
            .unwrap()
            .push((features.clone(), labels.clone()));
        let epochs: Vec<EpochMetrics> = (1..=options.epochs)
            .map(|epoch| EpochMetrics {
                epoch,
                loss: 1.0 / epoch as f32,
                accuracy: 0.5,
                val_loss: options.validation.map(|_| 1.0),
                val_accuracy: options.validation.map(|_| 0.5),
            })
            .collect();
        for metrics in &epochs {
            on_epoch(metrics);
        }
        Ok(TrainingHistory { epochs })
    }

    fn evaluate(
        &self,
        features: &IntTensor,
        labels: &IntTensor,
    ) -> Result<EvaluationMetrics, ClassifierError> {
        self.evaluated
            .lock()
            .unwrap()
            .push((features.clone(), labels.clone()));
        Ok(EvaluationMetrics {
            loss: 0.25,
            accuracy: 1.0,
        })
    }

    fn predict(&self, features: &IntTensor) -> Result<Vec<f32>, ClassifierError> {
        self.predicted.lock().unwrap().push(features.clone());
        Ok(vec![0.8; features.rows()])
    }
}

/// Always fails to fit.
struct BrokenClassifier;

impl Classifier for BrokenClassifier {
    fn fit(
        &mut self,
        _features: &IntTensor,
        _labels: &IntTensor,
        _options: &FitOptions<'_>,
        _on_epoch: &mut dyn FnMut(&EpochMetrics),
    ) -> Result<TrainingHistory, ClassifierError> {
        Err(ClassifierError::Backend("out of memory".to_string()))
    }

    fn evaluate(&self, _: &IntTensor, _: &IntTensor) -> Result<EvaluationMetrics, ClassifierError> {
        Err(ClassifierError::NotTrained)
    }

    fn predict(&self, _: &IntTensor) -> Result<Vec<f32>, ClassifierError> {
        Err(ClassifierError::NotTrained)
    }
}

// ============================================================================
// End-to-End Scenario
// ============================================================================

#[test]
fn test_end_to_end_scenario_with_mock_classifier() {
    let mut controller = controller_with_length(5);
    select_fixture(&mut controller, "scenario");
    assert_eq!(controller.stage(), PipelineStage::FilesReady);

    controller.parse().unwrap();
    let inspection = controller.inspect().unwrap();
    assert_eq!(inspection.column_keys.text_key, "text");
    assert_eq!(inspection.column_keys.label_key, "label");
    assert!(!inspection.column_keys.inferred);

    let pre = controller.preprocess().unwrap();
    assert!(pre.is_clean());

    let vocab = controller.run().vocabulary().unwrap();
    let learned: Vec<(&str, u32)> = vocab.iter().collect();
    assert_eq!(
        learned,
        vec![
            ("<PAD>", 0),
            ("<OOV>", 1),
            ("i", 2),
            ("love", 3),
            ("pizza", 4),
            ("ai", 5),
            ("generated", 6),
            ("spam", 7),
        ]
    );

    controller.embed().unwrap();
    let encoded = controller.run().encoded().unwrap();
    let test_rows: Vec<&[u32]> = encoded.testing.sequences.iter().map(|s| s.as_slice()).collect();
    assert_eq!(test_rows, vec![&[1, 1, 1, 0, 0][..], &[2, 3, 4, 0, 0][..]]);

    let mock = RecordingClassifier::default();
    let handle = mock.clone();
    let spec = controller
        .create_model(move |_| Ok(Box::new(mock) as Box<dyn Classifier>))
        .unwrap();
    assert_eq!(
        spec,
        ModelSpec {
            vocab_size: 8,
            sequence_length: 5
        }
    );

    let history = controller.train().unwrap();
    assert_eq!(history.epochs.len(), controller.config().epochs);
    {
        let fitted = handle.fitted.lock().unwrap();
        let (x, y) = &fitted[0];
        assert_eq!(x.shape, [2, 5]);
        assert_eq!(x.row(0), Some(&[2, 3, 4, 0, 0][..]));
        assert_eq!(x.row(1), Some(&[5, 6, 7, 0, 0][..]));
        assert_eq!(x.row(2), None);
        assert_eq!(y.shape, [2, 1]);
        assert_eq!(y.data, vec![0, 1]);
    }

    let metrics = controller.evaluate().unwrap();
    assert_eq!(metrics.accuracy, 1.0);
    {
        let evaluated = handle.evaluated.lock().unwrap();
        assert_eq!(evaluated[0].0.row(0), Some(&[1, 1, 1, 0, 0][..]));
        assert_eq!(evaluated[0].1.data, vec![1, 0]);
    }

    let prediction = controller.predict("I love pizza").unwrap();
    assert_eq!(prediction.label, 1);
    assert_eq!(prediction.token_count, 3);
    assert_eq!(prediction.oov_count, 0);
    assert_eq!(controller.stage(), PipelineStage::PredictReady);
    assert_eq!(
        handle.predicted.lock().unwrap()[0].data,
        vec![2, 3, 4, 0, 0]
    );
}

#[test]
fn test_full_flow_with_baseline_classifier() {
    let mut controller = controller_with_length(8);
    select_fixture(&mut controller, "valid");

    let parse = controller.parse().unwrap();
    assert_eq!(parse.rows.training, 8);
    assert_eq!(parse.rows.testing, 4);
    assert_eq!(parse.rows.validation, 2);

    controller.inspect().unwrap();
    controller.preprocess().unwrap();
    controller.embed().unwrap();
    controller.create_model(naive_bayes).unwrap();
    controller.train().unwrap();
    let metrics = controller.evaluate().unwrap();
    assert!(metrics.accuracy >= 0.75, "accuracy was {}", metrics.accuracy);

    assert_eq!(controller.predict("free money prize").unwrap().label, 1);
    assert_eq!(controller.predict("see you at the meeting").unwrap().label, 0);
    assert!(controller.failure().is_none());
}

// ============================================================================
// File Selection and Parsing
// ============================================================================

#[test]
fn test_wrong_file_name_is_rejected() {
    let mut controller = controller_with_length(5);
    let path = fixtures_path().join("misnamed/Train.csv");
    let err = controller
        .select_file(DatasetRole::Training, &path)
        .unwrap_err();

    assert!(matches!(err, PipelineError::NameMismatch { .. }));
    assert_eq!(controller.stage(), PipelineStage::AwaitingFiles);
    let failure = controller.failure().unwrap();
    assert_eq!(failure.step, PipelineStep::FileSelect);
    assert_eq!(failure.code, "NAME_MISMATCH");
}

#[test]
fn test_header_only_file_is_empty_dataset() {
    let mut controller = controller_with_length(5);
    select_fixture(&mut controller, "header_only");

    match controller.parse().unwrap_err() {
        PipelineError::EmptyDataset { roles } => {
            assert_eq!(roles, vec![DatasetRole::Training]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(controller.stage(), PipelineStage::FilesReady);
    assert!(controller.run().tables().is_none());
    assert_eq!(controller.failure().unwrap().step, PipelineStep::Parse);
}

#[test]
fn test_missing_file_is_structural_error() {
    let mut controller = controller_with_length(5);
    let base = fixtures_path().join("valid");
    controller
        .select_file(DatasetRole::Training, base.join("train.csv"))
        .unwrap();
    controller
        .select_file(DatasetRole::Testing, fixtures_path().join("nowhere/test.csv"))
        .unwrap();
    controller
        .select_file(DatasetRole::Validation, base.join("validation.csv"))
        .unwrap();

    let err = controller.parse().unwrap_err();
    assert_eq!(err.error_code(), "PARSE_STRUCTURAL");
    assert!(err.to_string().contains("testing"));
}

#[test]
fn test_inferred_columns() {
    let mut controller = controller_with_length(5);
    select_fixture(&mut controller, "inferred");
    controller.parse().unwrap();

    let inspection = controller.inspect().unwrap();
    assert_eq!(inspection.column_keys.text_key, "review");
    assert_eq!(inspection.column_keys.label_key, "sentiment");
    assert!(inspection.column_keys.inferred);

    let pre = controller.preprocess().unwrap();
    assert_eq!(pre.kept.training, 2);
    assert!(pre.is_clean());
}

#[test]
fn test_row_drops_are_counted() {
    let mut controller = controller_with_length(5);
    select_fixture(&mut controller, "dirty");

    let parse = controller.parse().unwrap();
    assert_eq!(parse.rows.training, 7);
    assert_eq!(parse.headers.validation, vec!["text", "label"]);

    controller.inspect().unwrap();
    let pre = controller.preprocess().unwrap();
    assert_eq!(pre.kept.training, 3);
    assert_eq!(pre.dropped.training, 4);
    assert_eq!(pre.total_dropped(), 4);
    assert_eq!(pre.kept.training + pre.dropped.training, parse.rows.training);
    assert!(!pre.is_clean());
    assert_eq!(pre.status_message(), "cleaned with 4 exclusions");

    let texts: Vec<&str> = controller
        .run()
        .normalized()
        .unwrap()
        .training
        .rows
        .iter()
        .map(|r| r.text.as_str())
        .collect();
    assert_eq!(texts, vec!["keep this row", "another good row", "final row"]);
}

// ============================================================================
// Stage Order
// ============================================================================

#[test]
fn test_stage_order_violations() {
    let mut controller = controller_with_length(5);

    assert!(controller.parse().unwrap_err().is_stage_not_ready());
    assert!(controller.inspect().unwrap_err().is_stage_not_ready());
    assert!(controller.train().unwrap_err().is_stage_not_ready());
    assert!(controller.predict("anything").unwrap_err().is_stage_not_ready());
    assert_eq!(controller.stage(), PipelineStage::AwaitingFiles);
    assert!(controller.failure().is_none());

    select_fixture(&mut controller, "valid");
    controller.parse().unwrap();
    match controller.embed().unwrap_err() {
        PipelineError::StageNotReady {
            step,
            required,
            current,
        } => {
            assert_eq!(step, PipelineStep::Embed);
            assert_eq!(required, PipelineStage::Preprocessed);
            assert_eq!(current, PipelineStage::Parsed);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(controller.stage(), PipelineStage::Parsed);
    assert!(controller.run().tables().is_some());
}

#[test]
fn test_rerun_invalidates_downstream() {
    let mut controller = controller_with_length(5);
    select_fixture(&mut controller, "valid");
    controller.parse().unwrap();
    controller.inspect().unwrap();
    controller.preprocess().unwrap();
    controller.embed().unwrap();
    controller.create_model(naive_bayes).unwrap();
    controller.train().unwrap();

    controller.preprocess().unwrap();
    assert_eq!(controller.stage(), PipelineStage::Preprocessed);
    assert!(controller.run().vocabulary().is_some());
    assert!(controller.run().encoded().is_none());
    assert!(!controller.run().has_classifier());
    assert!(controller.run().history().is_none());
    assert!(controller.evaluate().unwrap_err().is_stage_not_ready());
}

#[test]
fn test_rerun_on_unchanged_data_is_identical() {
    let mut controller = controller_with_length(6);
    select_fixture(&mut controller, "valid");
    controller.parse().unwrap();
    controller.inspect().unwrap();
    controller.preprocess().unwrap();
    controller.embed().unwrap();

    let vocabulary = controller.run().vocabulary().unwrap().clone();
    let encoded = controller.run().encoded().unwrap().clone();
    let vocabulary_json = serde_json::to_string(&vocabulary).unwrap();
    let encoded_json = serde_json::to_string(&encoded).unwrap();

    controller.preprocess().unwrap();
    controller.embed().unwrap();

    assert_eq!(controller.run().vocabulary().unwrap(), &vocabulary);
    assert_eq!(controller.run().encoded().unwrap(), &encoded);
    assert_eq!(
        serde_json::to_string(controller.run().vocabulary().unwrap()).unwrap(),
        vocabulary_json
    );
    assert_eq!(
        serde_json::to_string(controller.run().encoded().unwrap()).unwrap(),
        encoded_json
    );
}

#[test]
fn test_replacing_a_file_invalidates_parse() {
    let mut controller = controller_with_length(5);
    select_fixture(&mut controller, "valid");
    controller.parse().unwrap();
    controller.inspect().unwrap();

    let other = fixtures_path().join("scenario/test.csv");
    controller.select_file(DatasetRole::Testing, other).unwrap();
    assert_eq!(controller.stage(), PipelineStage::FilesReady);
    assert!(controller.run().tables().is_none());
    assert!(controller.run().column_keys().is_none());
}

#[test]
fn test_training_failure_keeps_model_ready() {
    let mut controller = controller_with_length(5);
    select_fixture(&mut controller, "valid");
    controller.parse().unwrap();
    controller.inspect().unwrap();
    controller.preprocess().unwrap();
    controller.embed().unwrap();
    controller
        .create_model(|_| Ok(Box::new(BrokenClassifier) as Box<dyn Classifier>))
        .unwrap();

    let err = controller.train().unwrap_err();
    assert_eq!(err.error_code(), "TRAINING_FAILED");
    assert!(err.to_string().contains("out of memory"));
    assert_eq!(controller.stage(), PipelineStage::ModelReady);
    assert_eq!(controller.failure().unwrap().step, PipelineStep::Train);

    // A working model clears the overlay on the next success.
    controller.create_model(naive_bayes).unwrap();
    assert!(controller.failure().is_none());
    controller.train().unwrap();
    assert_eq!(controller.stage(), PipelineStage::Trained);
}

// ============================================================================
// Progress and Export
// ============================================================================

#[test]
fn test_epoch_progress_reaches_sink() {
    let updates: Arc<Mutex<Vec<StatusUpdate>>> = Arc::default();
    let sink = updates.clone();
    let mut controller = PipelineController::builder()
        .config(
            PipelineConfig::builder()
                .max_sequence_length(5)
                .epochs(3)
                .build()
                .unwrap(),
        )
        .on_progress(move |update| sink.lock().unwrap().push(update))
        .build()
        .unwrap();

    select_fixture(&mut controller, "scenario");
    controller.parse().unwrap();
    controller.inspect().unwrap();
    controller.preprocess().unwrap();
    controller.embed().unwrap();
    controller
        .create_model(|_| Ok(Box::new(RecordingClassifier::default()) as Box<dyn Classifier>))
        .unwrap();
    controller.train().unwrap();

    let updates = updates.lock().unwrap();
    let epochs: Vec<(Option<usize>, Option<usize>)> = updates
        .iter()
        .filter(|u| u.step == PipelineStep::Train && u.items_total.is_some())
        .map(|u| (u.items_processed, u.items_total))
        .collect();
    assert_eq!(
        epochs,
        vec![(Some(1), Some(3)), (Some(2), Some(3)), (Some(3), Some(3))]
    );
    assert!(updates.iter().all(|u| u.severity != Severity::Error));
}

#[test]
fn test_export_writes_artifacts() {
    let mut controller = controller_with_length(5);
    select_fixture(&mut controller, "scenario");
    let mut report = RunReport::new(&controller);
    report.parse = Some(controller.parse().unwrap());
    controller.inspect().unwrap();
    report.preprocess = Some(controller.preprocess().unwrap());
    report.embedding = Some(controller.embed().unwrap());
    report.sync(&controller);

    let dir = std::env::temp_dir().join(format!("lex-textprep-export-{}", std::process::id()));
    let writer = ReportWriter::new(&dir);
    let written = writer.write_artifacts(&controller).unwrap();
    assert_eq!(written.len(), 4);
    writer.write_report(&report).unwrap();

    let vocab = std::fs::read_to_string(dir.join("vocabulary.json")).unwrap();
    let vocab: serde_json::Value = serde_json::from_str(&vocab).unwrap();
    assert_eq!(vocab["<OOV>"], 1);
    assert_eq!(vocab["spam"], 7);

    let encoded = std::fs::read_to_string(dir.join("encoded_testing.json")).unwrap();
    let encoded: serde_json::Value = serde_json::from_str(&encoded).unwrap();
    assert_eq!(encoded["sequences"][0], serde_json::json!([1, 1, 1, 0, 0]));

    let saved = std::fs::read_to_string(dir.join("run_report.json")).unwrap();
    let saved: RunReport = serde_json::from_str(&saved).unwrap();
    assert_eq!(saved.stage, PipelineStage::Embedded);
    assert_eq!(saved.embedding.unwrap().sequence_length, 5);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_reset_drops_everything() {
    let mut controller = controller_with_length(5);
    select_fixture(&mut controller, "scenario");
    controller.parse().unwrap();
    controller.inspect().unwrap();
    controller.reset();

    assert_eq!(controller.stage(), PipelineStage::AwaitingFiles);
    assert!(controller.run().files().is_none());
    assert!(controller.run().tables().is_none());
    assert!(controller.parse().unwrap_err().is_stage_not_ready());
}
