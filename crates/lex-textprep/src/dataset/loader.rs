//! Tabular loading of the three dataset files.
//!
//! Parsing is delegated to a [`TabularParser`]; the default one reads CSV
//! with Polars. The loader runs the three parses on scoped threads, joins
//! them, and only then decides whether the stage succeeded.

use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::io::Cursor;
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info, warn};

use crate::error::{PipelineError, Result, ResultExt};
use crate::types::{DatasetFile, DatasetRole, PerRole, RawRow, RawTable, RawValue};

/// Options passed to the parser for every file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// First record names the fields.
    pub has_header: bool,
    /// Drop lines that hold nothing but whitespace, outside quoted fields.
    pub skip_empty_lines: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            has_header: true,
            skip_empty_lines: true,
        }
    }
}

/// External tabular-parsing collaborator.
///
/// An `Err` means the file could not be parsed at all. A file that parses
/// but has no records must return an empty table, not an error.
pub trait TabularParser: Send + Sync {
    fn parse(&self, file: &DatasetFile, options: &ParseOptions) -> Result<RawTable>;
}

/// CSV parser backed by Polars.
///
/// Every column is read as text. Whether a cell is a usable label or text
/// is decided per row by the normalizer, not by column type inference.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolarsCsvParser;

impl PolarsCsvParser {
    /// Parse CSV text that is already in memory.
    pub fn parse_str(&self, content: &str, options: &ParseOptions) -> Result<RawTable> {
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);
        let cleaned = if options.skip_empty_lines {
            drop_blank_lines(content)
        } else {
            content.to_string()
        };

        if cleaned.trim().is_empty() {
            return Ok(RawTable::default());
        }

        // A zero-row inference window reads every column as String.
        let df = CsvReadOptions::default()
            .with_has_header(options.has_header)
            .with_infer_schema_length(Some(0))
            .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
            .into_reader_with_file_handle(Cursor::new(cleaned))
            .finish()?;

        table_from_frame(&df)
    }
}

impl TabularParser for PolarsCsvParser {
    fn parse(&self, file: &DatasetFile, options: &ParseOptions) -> Result<RawTable> {
        let content = std::fs::read_to_string(&file.path)
            .context(format!("Reading '{}'", file.path.display()))?;
        self.parse_str(&content, options)
    }
}

/// Remove whitespace-only lines that start outside a quoted field.
///
/// Quote state carries across lines so a blank line inside a multi-line
/// quoted value is kept. Escaped quotes (`""`) leave the state unchanged.
fn drop_blank_lines(content: &str) -> String {
    let mut in_quotes = false;
    let mut kept = Vec::new();
    for line in content.lines() {
        if !in_quotes && line.trim().is_empty() {
            continue;
        }
        if line.bytes().filter(|&b| b == b'"').count() % 2 == 1 {
            in_quotes = !in_quotes;
        }
        kept.push(line);
    }
    kept.join("\n")
}

fn table_from_frame(df: &DataFrame) -> Result<RawTable> {
    let headers: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    let series: Vec<&Series> = df
        .get_columns()
        .iter()
        .map(|c| c.as_materialized_series())
        .collect();

    let mut rows = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let mut fields = Vec::with_capacity(headers.len());
        for (name, column) in headers.iter().zip(&series) {
            fields.push((name.clone(), raw_value(column.get(idx)?)));
        }
        rows.push(RawRow::new(fields));
    }

    Ok(RawTable { headers, rows })
}

/// Map a Polars cell to the three scalar kinds the pipeline understands.
fn raw_value(value: AnyValue) -> RawValue {
    match value {
        AnyValue::Null => RawValue::Null,
        AnyValue::Int8(i) => RawValue::Number(i as f64),
        AnyValue::Int16(i) => RawValue::Number(i as f64),
        AnyValue::Int32(i) => RawValue::Number(i as f64),
        AnyValue::Int64(i) => RawValue::Number(i as f64),
        AnyValue::UInt8(u) => RawValue::Number(u as f64),
        AnyValue::UInt16(u) => RawValue::Number(u as f64),
        AnyValue::UInt32(u) => RawValue::Number(u as f64),
        AnyValue::UInt64(u) => RawValue::Number(u as f64),
        AnyValue::Float32(f) => RawValue::Number(f as f64),
        AnyValue::Float64(f) => RawValue::Number(f),
        AnyValue::String(s) => RawValue::Text(s.to_string()),
        AnyValue::StringOwned(s) => RawValue::Text(s.to_string()),
        other => RawValue::Text(format!("{}", other)),
    }
}

/// Loads every role's file through a [`TabularParser`].
#[derive(Clone)]
pub struct TabularLoader {
    parser: Arc<dyn TabularParser>,
    options: ParseOptions,
}

impl std::fmt::Debug for TabularLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TabularLoader")
            .field("parser", &"<parser>")
            .field("options", &self.options)
            .finish()
    }
}

impl TabularLoader {
    pub fn new(parser: Arc<dyn TabularParser>, options: ParseOptions) -> Self {
        Self { parser, options }
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Parse all three files.
    ///
    /// Structural errors win over empty tables: if any parse failed, that
    /// error is returned (the first in role order, with the failure count as
    /// context when several failed). Otherwise every role that produced zero
    /// rows is reported together in one [`PipelineError::EmptyDataset`].
    pub fn load_all(&self, files: &PerRole<DatasetFile>) -> Result<PerRole<RawTable>> {
        let parser = self.parser.as_ref();
        let options = &self.options;

        let outcomes: PerRole<Result<RawTable>> = thread::scope(|scope| {
            let handles = files.map(|_, file| scope.spawn(move || parser.parse(file, options)));
            handles.into_map(|role, handle| {
                handle.join().unwrap_or_else(|_| {
                    Err(PipelineError::Internal(format!(
                        "parser thread for {} dataset panicked",
                        role
                    )))
                })
            })
        });

        let mut failures = Vec::new();
        let mut tables = PerRole::<RawTable>::default();
        for (role, outcome) in outcomes {
            match outcome {
                Ok(table) => {
                    debug!(
                        "Parsed {} dataset: {} rows, columns {:?}",
                        role,
                        table.len(),
                        table.headers
                    );
                    *tables.get_mut(role) = table;
                }
                Err(e) => {
                    let file = files.get(role);
                    error!("Failed to parse {} dataset '{}': {}", role, file.name, e);
                    failures.push(PipelineError::ParseStructural {
                        role,
                        file: file.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let failed = failures.len();
        if let Some(first) = failures.into_iter().next() {
            return Err(if failed > 1 {
                first.with_context(format!("{} of 3 datasets failed to parse", failed))
            } else {
                first
            });
        }

        let empty: Vec<DatasetRole> = tables
            .iter()
            .filter(|(_, table)| table.is_empty())
            .map(|(role, _)| role)
            .collect();
        if !empty.is_empty() {
            warn!("Datasets with zero rows: {:?}", empty);
            return Err(PipelineError::EmptyDataset { roles: empty });
        }

        info!(
            "Parsed datasets: training={}, testing={}, validation={}",
            tables.training.len(),
            tables.testing.len(),
            tables.validation.len()
        );
        Ok(tables)
    }
}
