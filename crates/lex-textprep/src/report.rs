//! Run report assembly and JSON export.

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::classifier::{EvaluationMetrics, TrainingHistory};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result, ResultExt};
use crate::pipeline::{
    EmbeddingReport, InspectionReport, ParseSummary, PipelineController, PipelineStage,
    Prediction, PreprocessReport, StageFailure,
};
use crate::types::{DatasetFile, PerRole};

/// Everything one run produced, in a single serializable document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub generated_at: String,
    pub stage: PipelineStage,
    pub config: PipelineConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<PerRole<DatasetFile>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse: Option<ParseSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inspection: Option<InspectionReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preprocess: Option<PreprocessReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<EmbeddingReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub training: Option<TrainingHistory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<EvaluationMetrics>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub predictions: Vec<Prediction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<StageFailure>,
}

impl RunReport {
    /// Start a report from the controller's current state.
    ///
    /// Stage reports are filled in by the caller as stages return them.
    pub fn new(controller: &PipelineController) -> Self {
        let run = controller.run();
        Self {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            stage: controller.stage(),
            config: controller.config().clone(),
            files: run.files(),
            parse: None,
            inspection: None,
            preprocess: None,
            embedding: None,
            training: run.history().cloned(),
            evaluation: run.evaluation().copied(),
            predictions: Vec::new(),
            failure: controller.failure().cloned(),
        }
    }

    /// Refresh the stage, artifacts and failure overlay from the controller.
    pub fn sync(&mut self, controller: &PipelineController) {
        let run = controller.run();
        self.stage = controller.stage();
        self.files = run.files();
        self.training = run.history().cloned();
        self.evaluation = run.evaluation().copied();
        self.failure = controller.failure().cloned();
    }
}

/// Writes run artifacts as pretty-printed JSON into one directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)
            .context(format!("Creating '{}'", self.output_dir.display()))?;
        let path = self.output_dir.join(name);
        let mut file =
            File::create(&path).context(format!("Creating '{}'", path.display()))?;
        file.write_all(serde_json::to_string_pretty(value)?.as_bytes())
            .context(format!("Writing '{}'", path.display()))?;
        info!("Saved {}", path.display());
        Ok(path)
    }

    pub fn write_report(&self, report: &RunReport) -> Result<PathBuf> {
        self.write_json("run_report.json", report)
    }

    /// Write `vocabulary.json` and one `encoded_<role>.json` per role.
    ///
    /// Fails if the run has not reached the embedding stage.
    pub fn write_artifacts(&self, controller: &PipelineController) -> Result<Vec<PathBuf>> {
        let run = controller.run();
        let (Some(vocabulary), Some(encoded)) = (run.vocabulary(), run.encoded()) else {
            return Err(PipelineError::StageNotReady {
                step: crate::pipeline::PipelineStep::Embed,
                required: PipelineStage::Embedded,
                current: controller.stage(),
            });
        };

        let mut written = vec![self.write_json("vocabulary.json", vocabulary)?];
        for (role, dataset) in encoded.iter() {
            written.push(self.write_json(&format!("encoded_{}.json", role), dataset)?);
        }
        Ok(written)
    }
}
