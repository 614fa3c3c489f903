//! Dataset admission, loading and normalization.

pub mod loader;
pub mod normalizer;
pub mod validator;

pub use loader::{ParseOptions, PolarsCsvParser, TabularLoader, TabularParser};
pub use normalizer::{
    NormalizedTable, RowNormalizer, clean_header, coerce_label, infer_columns, normalize_row,
    normalize_table,
};
pub use validator::DatasetFileValidator;
