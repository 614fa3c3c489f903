//! Name-based admission of dataset files.

use std::path::Path;
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::types::{DatasetFile, DatasetRole, PerRole, file_name_of};

/// Admits one file per role, checking only its name.
///
/// A rejected candidate clears whatever was previously accepted for that
/// role, so a role never stays "loaded" with a file the user has since
/// replaced.
#[derive(Debug, Clone)]
pub struct DatasetFileValidator {
    expected: PerRole<String>,
    accepted: PerRole<Option<DatasetFile>>,
}

impl DatasetFileValidator {
    pub fn new(expected: PerRole<String>) -> Self {
        Self {
            expected,
            accepted: PerRole::default(),
        }
    }

    pub fn expected_name(&self, role: DatasetRole) -> &str {
        self.expected.get(role)
    }

    /// Offer `path` for `role`. Matching is exact and case-sensitive.
    pub fn offer(&mut self, role: DatasetRole, path: impl AsRef<Path>) -> Result<&DatasetFile> {
        let path = path.as_ref();
        let actual = file_name_of(path);
        let expected = self.expected.get(role);

        if actual != *expected {
            warn!(
                "Rejected '{}' for {} dataset (expected '{}')",
                actual, role, expected
            );
            *self.accepted.get_mut(role) = None;
            return Err(PipelineError::NameMismatch {
                role,
                expected: expected.clone(),
                actual,
            });
        }

        debug!("Accepted '{}' for {} dataset", path.display(), role);
        let file: &DatasetFile = self
            .accepted
            .get_mut(role)
            .insert(DatasetFile::new(role, path));
        Ok(file)
    }

    pub fn accepted(&self, role: DatasetRole) -> Option<&DatasetFile> {
        self.accepted.get(role).as_ref()
    }

    /// True once every role holds an accepted file.
    pub fn is_ready(&self) -> bool {
        DatasetRole::ALL
            .iter()
            .all(|role| self.accepted.get(*role).is_some())
    }

    /// All three accepted files, or `None` if any role is missing one.
    pub fn files(&self) -> Option<PerRole<DatasetFile>> {
        Some(PerRole {
            training: self.accepted(DatasetRole::Training)?.clone(),
            testing: self.accepted(DatasetRole::Testing)?.clone(),
            validation: self.accepted(DatasetRole::Validation)?.clone(),
        })
    }

    pub fn missing_roles(&self) -> Vec<DatasetRole> {
        DatasetRole::ALL
            .into_iter()
            .filter(|role| self.accepted.get(*role).is_none())
            .collect()
    }

    pub fn clear(&mut self) {
        self.accepted = PerRole::default();
    }
}
