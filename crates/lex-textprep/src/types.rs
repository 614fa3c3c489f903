//! Core data types shared by every pipeline stage.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Which of the three datasets a file feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetRole {
    Training,
    Testing,
    Validation,
}

impl DatasetRole {
    /// All roles, in the order stages process and report them.
    pub const ALL: [DatasetRole; 3] = [
        DatasetRole::Training,
        DatasetRole::Testing,
        DatasetRole::Validation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Training => "training",
            Self::Testing => "testing",
            Self::Validation => "validation",
        }
    }

    /// Position of the role in [`DatasetRole::ALL`].
    pub fn index(&self) -> usize {
        match self {
            Self::Training => 0,
            Self::Testing => 1,
            Self::Validation => 2,
        }
    }
}

impl fmt::Display for DatasetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value per role, indexed by [`DatasetRole`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerRole<T> {
    pub training: T,
    pub testing: T,
    pub validation: T,
}

impl<T> PerRole<T> {
    pub fn from_fn(mut f: impl FnMut(DatasetRole) -> T) -> Self {
        Self {
            training: f(DatasetRole::Training),
            testing: f(DatasetRole::Testing),
            validation: f(DatasetRole::Validation),
        }
    }

    pub fn get(&self, role: DatasetRole) -> &T {
        match role {
            DatasetRole::Training => &self.training,
            DatasetRole::Testing => &self.testing,
            DatasetRole::Validation => &self.validation,
        }
    }

    pub fn get_mut(&mut self, role: DatasetRole) -> &mut T {
        match role {
            DatasetRole::Training => &mut self.training,
            DatasetRole::Testing => &mut self.testing,
            DatasetRole::Validation => &mut self.validation,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (DatasetRole, &T)> {
        DatasetRole::ALL.into_iter().map(move |role| (role, self.get(role)))
    }

    pub fn map<'a, U>(&'a self, mut f: impl FnMut(DatasetRole, &'a T) -> U) -> PerRole<U> {
        PerRole::from_fn(|role| f(role, self.get(role)))
    }

    pub fn into_map<U>(self, mut f: impl FnMut(DatasetRole, T) -> U) -> PerRole<U> {
        PerRole {
            training: f(DatasetRole::Training, self.training),
            testing: f(DatasetRole::Testing, self.testing),
            validation: f(DatasetRole::Validation, self.validation),
        }
    }
}

impl<T> IntoIterator for PerRole<T> {
    type Item = (DatasetRole, T);
    type IntoIter = std::array::IntoIter<(DatasetRole, T), 3>;

    fn into_iter(self) -> Self::IntoIter {
        [
            (DatasetRole::Training, self.training),
            (DatasetRole::Testing, self.testing),
            (DatasetRole::Validation, self.validation),
        ]
        .into_iter()
    }
}

/// A file admitted for one role.
///
/// Only the name has been checked; content is read by the loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetFile {
    pub role: DatasetRole,
    pub path: PathBuf,
    pub name: String,
}

impl DatasetFile {
    pub fn new(role: DatasetRole, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = file_name_of(&path);
        Self { role, path, name }
    }
}

/// Final path component as a string, or empty when there is none.
pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// A scalar cell value as reported by the tabular parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Text(String),
    Number(f64),
    Null,
}

impl RawValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

/// One input record: ordered column-name → value pairs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    fields: Vec<(String, RawValue)>,
}

impl RawRow {
    pub fn new(fields: Vec<(String, RawValue)>) -> Self {
        Self { fields }
    }

    /// Value stored under `key`, compared exactly.
    pub fn get(&self, key: &str) -> Option<&RawValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    pub fn fields(&self) -> &[(String, RawValue)] {
        &self.fields
    }

    pub fn is_blank(&self) -> bool {
        self.fields.iter().all(|(_, value)| value.is_null())
    }
}

/// Rows parsed from one file plus the header that named their fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A row that survived column mapping and label coercion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRow {
    /// Trimmed, never empty.
    pub text: String,
    /// Always 0 or 1.
    pub label: u8,
}

/// The header names used to read text and label out of every role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnKeys {
    pub text_key: String,
    pub label_key: String,
    /// True when at least one key came from positional fallback.
    pub inferred: bool,
}
