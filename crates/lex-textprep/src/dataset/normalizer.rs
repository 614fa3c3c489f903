//! Column inference and row normalization.
//!
//! Two explicit steps: [`infer_columns`] picks the text and label keys from
//! the training header, then [`normalize_row`] applies them to each row.
//! Rows that fail are counted, never kept.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::types::{ColumnKeys, DatasetRole, NormalizedRow, PerRole, RawRow, RawTable, RawValue};

/// Header name with surrounding quotes and whitespace removed.
pub fn clean_header(name: &str) -> &str {
    name.trim_matches(|c: char| c == '"' || c == '\'' || c.is_whitespace())
}

/// Pick the text and label columns from a header list.
///
/// Headers equal to `text` / `label` (case-insensitive, after
/// [`clean_header`]) win. A key that is not found falls back to the next
/// non-empty header, in header order, that is not already taken by the other
/// key, and the result is flagged `inferred`.
pub fn infer_columns(headers: &[String]) -> Result<ColumnKeys> {
    let find = |wanted: &str| {
        headers
            .iter()
            .find(|h| clean_header(h).eq_ignore_ascii_case(wanted))
    };
    let explicit_text = find("text");
    let explicit_label = find("label");

    let mut fallback = headers.iter().filter(|h| {
        !clean_header(h).is_empty() && Some(*h) != explicit_text && Some(*h) != explicit_label
    });

    let text_key = match explicit_text {
        Some(h) => h.clone(),
        None => fallback.next().cloned().ok_or_else(|| missing(headers))?,
    };
    let label_key = match explicit_label {
        Some(h) => h.clone(),
        None => fallback.next().cloned().ok_or_else(|| missing(headers))?,
    };

    let inferred = explicit_text.is_none() || explicit_label.is_none();
    if inferred {
        warn!(
            "No 'text'/'label' header found; using '{}' as text and '{}' as label",
            text_key, label_key
        );
    }

    Ok(ColumnKeys {
        text_key,
        label_key,
        inferred,
    })
}

fn missing(headers: &[String]) -> PipelineError {
    PipelineError::MissingColumns(format!(
        "need two non-empty headers, found {:?}",
        headers
    ))
}

/// Strict binary label coercion.
///
/// Accepts the numbers 0 and 1, or text that trims to exactly `"0"` or
/// `"1"`. Everything else, including a missing value, fails.
pub fn coerce_label(value: Option<&RawValue>) -> Option<u8> {
    match value? {
        RawValue::Number(n) if *n == 0.0 => Some(0),
        RawValue::Number(n) if *n == 1.0 => Some(1),
        RawValue::Text(s) => match s.trim() {
            "0" => Some(0),
            "1" => Some(1),
            _ => None,
        },
        _ => None,
    }
}

/// Normalize one row, or `None` if it must be dropped.
pub fn normalize_row(row: &RawRow, keys: &ColumnKeys) -> Option<NormalizedRow> {
    let text = row
        .get(&keys.text_key)
        .and_then(RawValue::as_text)
        .map(str::trim)
        .filter(|t| !t.is_empty())?;
    let label = coerce_label(row.get(&keys.label_key))?;
    Some(NormalizedRow {
        text: text.to_string(),
        label,
    })
}

/// Surviving rows of one role and how many were dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTable {
    pub rows: Vec<NormalizedRow>,
    pub dropped: usize,
}

impl NormalizedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Normalize every row of a table with the same keys.
pub fn normalize_table(table: &RawTable, keys: &ColumnKeys) -> NormalizedTable {
    let rows: Vec<NormalizedRow> = table
        .rows
        .iter()
        .filter_map(|row| normalize_row(row, keys))
        .collect();
    let dropped = table.len() - rows.len();
    NormalizedTable { rows, dropped }
}

/// Applies one pair of [`ColumnKeys`] to every role.
#[derive(Debug, Clone)]
pub struct RowNormalizer {
    keys: ColumnKeys,
}

impl RowNormalizer {
    pub fn new(keys: ColumnKeys) -> Self {
        Self { keys }
    }

    /// Infer the keys from the training header.
    pub fn from_training(training: &RawTable) -> Result<Self> {
        Ok(Self::new(infer_columns(&training.headers)?))
    }

    pub fn keys(&self) -> &ColumnKeys {
        &self.keys
    }

    /// Normalize all three roles.
    ///
    /// Dropped rows are never an error, but a role left with no rows at all
    /// is: every such role is reported in one
    /// [`PipelineError::EmptyDataset`].
    pub fn normalize_all(&self, tables: &PerRole<RawTable>) -> Result<PerRole<NormalizedTable>> {
        let normalized = tables.map(|role, table| {
            let out = normalize_table(table, &self.keys);
            debug!(
                "Normalized {} dataset: kept {}, dropped {}",
                role,
                out.len(),
                out.dropped
            );
            out
        });

        let empty: Vec<DatasetRole> = normalized
            .iter()
            .filter(|(_, t)| t.is_empty())
            .map(|(role, _)| role)
            .collect();
        if !empty.is_empty() {
            return Err(PipelineError::EmptyDataset { roles: empty });
        }

        Ok(normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn row(text: RawValue, label: RawValue) -> RawRow {
        RawRow::new(vec![
            ("text".to_string(), text),
            ("label".to_string(), label),
        ])
    }

    fn keys() -> ColumnKeys {
        ColumnKeys {
            text_key: "text".to_string(),
            label_key: "label".to_string(),
            inferred: false,
        }
    }

    #[test]
    fn test_infer_exact_headers() {
        let k = infer_columns(&headers(&["id", "label", "text"])).unwrap();
        assert_eq!(k.text_key, "text");
        assert_eq!(k.label_key, "label");
        assert!(!k.inferred);
    }

    #[test]
    fn test_infer_ignores_case_quotes_and_spaces() {
        let k = infer_columns(&headers(&[" \"Text\" ", "'LABEL'"])).unwrap();
        assert_eq!(k.text_key, " \"Text\" ");
        assert_eq!(k.label_key, "'LABEL'");
        assert!(!k.inferred);
    }

    #[test]
    fn test_infer_positional_fallback() {
        let k = infer_columns(&headers(&["", "review", "sentiment", "extra"])).unwrap();
        assert_eq!(k.text_key, "review");
        assert_eq!(k.label_key, "sentiment");
        assert!(k.inferred);
    }

    #[test]
    fn test_infer_fallback_skips_taken_key() {
        let k = infer_columns(&headers(&["label", "body"])).unwrap();
        assert_eq!(k.text_key, "body");
        assert_eq!(k.label_key, "label");
        assert!(k.inferred);
    }

    #[test]
    fn test_infer_single_column_fails() {
        let err = infer_columns(&headers(&["only"])).unwrap_err();
        assert_eq!(err.error_code(), "MISSING_COLUMNS");
    }

    #[test]
    fn test_string_and_numeric_labels_agree() {
        let a = normalize_row(&row("hi".into(), "1".into()), &keys()).unwrap();
        let b = normalize_row(&row("hi".into(), 1_i64.into()), &keys()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.label, 1);
    }

    #[test]
    fn test_label_coercion() {
        assert_eq!(coerce_label(Some(&" 0 ".into())), Some(0));
        assert_eq!(coerce_label(Some(&RawValue::Number(0.0))), Some(0));
        assert_eq!(coerce_label(Some(&"yes".into())), None);
        assert_eq!(coerce_label(Some(&"1.0".into())), None);
        assert_eq!(coerce_label(Some(&RawValue::Number(2.0))), None);
        assert_eq!(coerce_label(Some(&RawValue::Number(0.5))), None);
        assert_eq!(coerce_label(Some(&RawValue::Null)), None);
        assert_eq!(coerce_label(None), None);
    }

    #[test]
    fn test_text_is_trimmed() {
        let r = normalize_row(&row("  spaced out \t".into(), "0".into()), &keys()).unwrap();
        assert_eq!(r.text, "spaced out");
    }

    #[test]
    fn test_blank_or_non_text_is_dropped() {
        assert!(normalize_row(&row("   ".into(), "1".into()), &keys()).is_none());
        assert!(normalize_row(&row(RawValue::Null, "1".into()), &keys()).is_none());
        assert!(normalize_row(&row(RawValue::Number(3.0), "1".into()), &keys()).is_none());
        assert!(normalize_row(&row("ok".into(), "yes".into()), &keys()).is_none());
    }

    #[test]
    fn test_drop_count_matches() {
        let table = RawTable {
            headers: headers(&["text", "label"]),
            rows: vec![
                row("good".into(), "1".into()),
                row("".into(), "1".into()),
                row("bad label".into(), "maybe".into()),
                row("fine".into(), 0_i64.into()),
            ],
        };
        let out = normalize_table(&table, &keys());
        assert_eq!(out.len(), 2);
        assert_eq!(out.dropped, table.len() - out.len());
    }

    #[test]
    fn test_zero_survivors_is_empty_dataset() {
        let good = RawTable {
            headers: headers(&["text", "label"]),
            rows: vec![row("good".into(), "1".into())],
        };
        let bad = RawTable {
            headers: headers(&["text", "label"]),
            rows: vec![row("".into(), "1".into())],
        };
        let tables = PerRole {
            training: good.clone(),
            testing: bad,
            validation: good,
        };
        let normalizer = RowNormalizer::from_training(&tables.training).unwrap();
        match normalizer.normalize_all(&tables).unwrap_err() {
            PipelineError::EmptyDataset { roles } => assert_eq!(roles, vec![DatasetRole::Testing]),
            other => panic!("unexpected error: {other}"),
        }
    }
}
