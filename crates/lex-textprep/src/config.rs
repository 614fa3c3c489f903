//! Configuration types for the text preparation pipeline.
//!
//! This module provides configuration options using the builder pattern
//! for flexible and ergonomic pipeline setup.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{PipelineError, Result, ResultExt};
use crate::types::{DatasetRole, PerRole};

/// Default target length of every encoded sequence.
pub const DEFAULT_MAX_SEQUENCE_LENGTH: usize = 50;

/// Configuration for the text preparation pipeline.
///
/// Use [`PipelineConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use lex_textprep::config::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .max_sequence_length(64)
///     .epochs(5)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Length every encoded sequence is truncated or padded to.
    /// Default: 50
    pub max_sequence_length: usize,

    /// The exact, case-sensitive file name each role must carry.
    /// Default: train.csv / test.csv / validation.csv
    pub file_names: PerRole<String>,

    /// Rows per role kept in the inspection preview.
    /// Default: 5
    pub preview_rows: usize,

    /// Batch size forwarded to the classifier.
    /// Default: 32
    pub batch_size: usize,

    /// Epoch count forwarded to the classifier.
    /// Default: 10
    pub epochs: usize,

    /// Probability at or above which a prediction is labelled 1.
    /// Default: 0.5
    pub decision_threshold: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_sequence_length: DEFAULT_MAX_SEQUENCE_LENGTH,
            file_names: default_file_names(),
            preview_rows: 5,
            batch_size: 32,
            epochs: 10,
            decision_threshold: 0.5,
        }
    }
}

fn default_file_names() -> PerRole<String> {
    PerRole {
        training: "train.csv".to_string(),
        testing: "test.csv".to_string(),
        validation: "validation.csv".to_string(),
    }
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Load and validate a configuration from a JSON file.
    ///
    /// Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .context(format!("Reading config '{}'", path.display()))?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        config
            .validate()
            .map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;
        Ok(config)
    }

    /// Expected file name for a role.
    pub fn file_name(&self, role: DatasetRole) -> &str {
        self.file_names.get(role)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        if self.max_sequence_length == 0 {
            return Err(ConfigValidationError::ZeroValue("max_sequence_length"));
        }
        if self.batch_size == 0 {
            return Err(ConfigValidationError::ZeroValue("batch_size"));
        }
        if self.epochs == 0 {
            return Err(ConfigValidationError::ZeroValue("epochs"));
        }
        if !(self.decision_threshold > 0.0 && self.decision_threshold < 1.0) {
            return Err(ConfigValidationError::InvalidThreshold(
                self.decision_threshold,
            ));
        }

        for (role, name) in self.file_names.iter() {
            if name.is_empty() {
                return Err(ConfigValidationError::EmptyFileName(role));
            }
        }
        for (role, name) in self.file_names.iter() {
            let clash = self
                .file_names
                .iter()
                .find(|(other, other_name)| *other > role && *other_name == name);
            if let Some((other, _)) = clash {
                return Err(ConfigValidationError::DuplicateFileName {
                    name: name.clone(),
                    first: role,
                    second: other,
                });
            }
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("'{0}' must be at least 1")]
    ZeroValue(&'static str),

    #[error("Invalid decision threshold: {0} (must be strictly between 0.0 and 1.0)")]
    InvalidThreshold(f32),

    #[error("Expected file name for the {0} dataset is empty")]
    EmptyFileName(DatasetRole),

    #[error("File name '{name}' is used for both the {first} and {second} datasets")]
    DuplicateFileName {
        name: String,
        first: DatasetRole,
        second: DatasetRole,
    },
}

impl From<ConfigValidationError> for PipelineError {
    fn from(err: ConfigValidationError) -> Self {
        PipelineError::InvalidConfig(err.to_string())
    }
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    max_sequence_length: Option<usize>,
    file_names: Option<PerRole<String>>,
    preview_rows: Option<usize>,
    batch_size: Option<usize>,
    epochs: Option<usize>,
    decision_threshold: Option<f32>,
}

impl PipelineConfigBuilder {
    /// Set the length sequences are truncated or padded to.
    pub fn max_sequence_length(mut self, length: usize) -> Self {
        self.max_sequence_length = Some(length);
        self
    }

    /// Set the expected file name for one role.
    pub fn file_name(mut self, role: DatasetRole, name: impl Into<String>) -> Self {
        let names = self.file_names.get_or_insert_with(default_file_names);
        *names.get_mut(role) = name.into();
        self
    }

    /// Set how many rows per role the inspection preview keeps.
    pub fn preview_rows(mut self, rows: usize) -> Self {
        self.preview_rows = Some(rows);
        self
    }

    /// Set the batch size handed to the classifier.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    /// Set the number of epochs handed to the classifier.
    pub fn epochs(mut self, epochs: usize) -> Self {
        self.epochs = Some(epochs);
        self
    }

    /// Set the probability threshold for a positive prediction.
    pub fn decision_threshold(mut self, threshold: f32) -> Self {
        self.decision_threshold = Some(threshold);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> std::result::Result<PipelineConfig, ConfigValidationError> {
        let defaults = PipelineConfig::default();
        let config = PipelineConfig {
            max_sequence_length: self
                .max_sequence_length
                .unwrap_or(defaults.max_sequence_length),
            file_names: self.file_names.unwrap_or(defaults.file_names),
            preview_rows: self.preview_rows.unwrap_or(defaults.preview_rows),
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            epochs: self.epochs.unwrap_or(defaults.epochs),
            decision_threshold: self
                .decision_threshold
                .unwrap_or(defaults.decision_threshold),
        };

        config.validate()?;
        Ok(config)
    }
}
