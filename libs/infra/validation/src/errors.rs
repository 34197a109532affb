//! Pre-validation error taxonomy (SPEC_FULL.md §7 `PrevalidationError`).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PreValidationError {
    #[error("zip error: {0}")]
    Zip(String),

    #[error("zip must contain exactly one entry whose stem matches the zip stem {zip_stem:?}, found {found:?}")]
    ZipStemMismatch { zip_stem: String, found: Vec<String> },

    #[error("filename {stem:?} does not match the required convention: {reason}")]
    FilenameConvention { stem: String, reason: String },

    #[error("row {row}: missing required column {column:?}")]
    MissingColumn { row: u64, column: &'static str },

    #[error("row {row}, column {column:?}: value {value:?} does not match the expected pattern")]
    PatternMismatch {
        row: u64,
        column: &'static str,
        value: String,
    },

    #[error("row {row}: change_type must be one of add|remove|update, got {value:?}")]
    InvalidChangeType { row: u64, value: String },

    #[error("header is missing required columns: {0:?}")]
    MissingHeaderColumns(Vec<&'static str>),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}
